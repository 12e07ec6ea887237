//! # Ports
//!
//! Every external dependency of the services is one of these traits.
//! Adapters (Supabase, in-memory, Gemini) implement them; with the
//! `testing` feature mockall generates a `MockXxx` for each.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::errors::BackendError;
use crate::models::*;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Reads and writes of the `profiles` table.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_id_by_username(&self, username: &str) -> BackendResult<Option<UserId>>;
    async fn insert(&self, profile: &NewProfile) -> BackendResult<()>;
    async fn get(&self, id: UserId) -> BackendResult<Option<Profile>>;
}

/// Privileged (service-role) operations on auth users, plus password sign-in.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuthAdmin: Send + Sync {
    /// Creates a confirmed user. `Ok(None)` means the service answered
    /// without returning the new user's id.
    async fn create_user(&self, user: &NewAuthUser) -> BackendResult<Option<UserId>>;
    async fn delete_user(&self, id: UserId) -> BackendResult<()>;
    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session>;
    async fn update_password(&self, id: UserId, password: &str) -> BackendResult<()>;
}

/// Turns a bearer access token into the caller's identity.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> BackendResult<Identity>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Newest first, at most `limit`, skipping posts by `exclude_authors`.
    async fn list_feed(&self, limit: usize, exclude_authors: &[UserId]) -> BackendResult<Vec<FeedEntry>>;
    async fn get(&self, id: PostId) -> BackendResult<Option<Post>>;
    async fn insert(&self, post: &NewPost) -> BackendResult<Post>;
    async fn update(&self, id: PostId, changes: &PostChanges) -> BackendResult<()>;
    async fn delete(&self, id: PostId) -> BackendResult<()>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LikeRepository: Send + Sync {
    async fn is_liked(&self, like: PostLike) -> BackendResult<bool>;
    async fn insert(&self, like: PostLike) -> BackendResult<()>;
    async fn delete(&self, like: PostLike) -> BackendResult<()>;
    async fn count(&self, post_id: PostId) -> BackendResult<usize>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Oldest first.
    async fn list_for_post(&self, post_id: PostId) -> BackendResult<Vec<CommentEntry>>;
    async fn insert(&self, comment: &NewComment) -> BackendResult<Comment>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BlockRepository: Send + Sync {
    async fn blocked_by(&self, blocker_id: UserId) -> BackendResult<Vec<UserId>>;
    async fn insert(&self, block: UserBlock) -> BackendResult<()>;
}

/// The `public_stats` counter row.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn total_users(&self) -> BackendResult<i64>;
}

/// Push notifications of `public_stats.total_users` changes.
///
/// The receiver closing means the subscription is gone; callers fall back to polling.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StatsSubscriber: Send + Sync {
    async fn subscribe(&self) -> BackendResult<mpsc::Receiver<i64>>;
}

/// Object storage for post media.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Stores a new object. Never overwrites an existing one.
    async fn upload(&self, bucket: Bucket, path: &str, content_type: &str, data: Bytes) -> BackendResult<()>;
    fn public_url(&self, bucket: Bucket, path: &str) -> String;
}

/// Reads stored media back, for backends whose public URLs point at this server.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, bucket: Bucket, path: &str) -> BackendResult<Option<StoredObject>>;
}

/// The `analysis_requests` table.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AnalysisRequestRepository: Send + Sync {
    async fn create(&self, request: &NewAnalysisRequest) -> BackendResult<AnalysisRequestId>;
    async fn finish(&self, id: AnalysisRequestId, outcome: &AnalysisOutcome) -> BackendResult<()>;
    async fn update_feedback(&self, id: AnalysisRequestId, update: &FeedbackUpdate) -> BackendResult<()>;
}

/// A hosted multimodal model: one prompt plus JPEG frames in, free text out.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AnalysisModel: Send + Sync {
    async fn generate(&self, prompt: &str, frames: &[Frame]) -> BackendResult<String>;
}
