//! # Domain Models
//!
//! These structs mirror the rows the backend stores for Kashaaf.
//! Field names follow the backend's column names so adapters can
//! (de)serialize them directly.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type PostId = Uuid;
pub type CommentId = Uuid;
pub type AnalysisRequestId = Uuid;

// ─── Accounts ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id:           UserId,
    pub full_name:    String,
    pub username:     String,
    pub phone_number: Option<String>,
    #[serde(default)]
    pub avatar_url:   Option<String>,
}

/// The row inserted into `profiles` right after the auth user is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id:           UserId,
    pub full_name:    String,
    pub phone_number: Option<String>,
    pub username:     String,
}

/// Metadata attached to the auth user at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    pub full_name:    String,
    pub username:     String,
    pub phone_number: Option<String>,
}

/// Admin request to create an already-confirmed auth user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuthUser {
    pub email:    String,
    pub password: String,
    pub metadata: UserMetadata,
}

/// A password-grant session as issued by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token:  String,
    pub refresh_token: Option<String>,
    pub expires_in:    i64,
    pub user_id:       UserId,
}

/// The caller, as established from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub email:   Option<String>,
}

/// Public author fields embedded next to posts and comments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub username:   Option<String>,
    pub full_name:  Option<String>,
    pub avatar_url: Option<String>,
}

impl AuthorSummary {
    /// Full name, else username, else "User".
    pub fn display_name(&self) -> String {
        [&self.full_name, &self.username]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_else(|| "User".to_string())
    }
}

// ─── Media ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Video,
}

impl AttachmentKind {
    /// `video/*` is a video; every other type is treated as an image.
    pub fn from_mime(mime: &mime::Mime) -> Self {
        if mime.type_() == mime::VIDEO {
            AttachmentKind::Video
        } else {
            AttachmentKind::Image
        }
    }

    pub fn bucket(self) -> Bucket {
        match self {
            AttachmentKind::Image => Bucket::Images,
            AttachmentKind::Video => Bucket::Videos,
        }
    }

    pub fn default_extension(self) -> &'static str {
        match self {
            AttachmentKind::Image => "jpg",
            AttachmentKind::Video => "mp4",
        }
    }
}

/// Object-storage buckets used by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Images,
    Videos,
}

impl Bucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Images => "images",
            Bucket::Videos => "videos",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "images" => Some(Bucket::Images),
            "videos" => Some(Bucket::Videos),
            _ => None,
        }
    }
}

/// An object as it sits in a bucket.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content_type: String,
    pub data:         Bytes,
}

/// A media item associated with a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub url:  String,
    /// Storage path inside the bucket; empty for legacy `media_url` posts.
    #[serde(default)]
    pub path: String,
}

/// An uploaded file on its way to object storage.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name:    Option<String>,
    pub content_type: mime::Mime,
    pub data:         Bytes,
}

impl MediaUpload {
    pub fn kind(&self) -> AttachmentKind {
        AttachmentKind::from_mime(&self.content_type)
    }
}

// ─── Feed ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id:          PostId,
    pub user_id:     UserId,
    pub content:     Option<String>,
    pub media_url:   Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub created_at:  DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub user_id:     UserId,
    pub content:     Option<String>,
    pub media_url:   Option<String>,
    pub attachments: Vec<Attachment>,
}

/// Columns an author may change when editing a post in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostChanges {
    pub content:     Option<String>,
    pub attachments: Vec<Attachment>,
    pub media_url:   Option<String>,
}

/// A post as read for the feed: the row plus the embedded relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub post:          Post,
    pub author:        AuthorSummary,
    pub liker_ids:     Vec<UserId>,
    pub comment_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostLike {
    pub post_id: PostId,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id:         CommentId,
    pub post_id:    PostId,
    pub user_id:    UserId,
    pub content:    String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub post_id: PostId,
    pub user_id: UserId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEntry {
    pub comment: Comment,
    pub author:  AuthorSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBlock {
    pub blocker_id: UserId,
    pub blocked_id: UserId,
}

// ─── AI analysis ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Analyzing,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAnalysisRequest {
    pub user_id:     UserId,
    pub status:      AnalysisStatus,
    pub frame_count: usize,
}

/// Terminal update for an analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub status: AnalysisStatus,
    pub report: Option<serde_json::Value>,
    pub error:  Option<String>,
}

/// Partial update applied by the feedback endpoint. `None` leaves a column untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackUpdate {
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "feedback_correct", skip_serializing_if = "Option::is_none")]
    pub correct:    Option<bool>,
    #[serde(rename = "feedback_helpful", skip_serializing_if = "Option::is_none")]
    pub helpful:    Option<u8>,
    #[serde(rename = "feedback_tags", skip_serializing_if = "Option::is_none")]
    pub tags:       Option<Vec<String>>,
}

/// A JPEG frame sampled from a gameplay clip, base64-encoded as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub base64_jpeg: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameplayMetrics {
    pub reaction_time_score: String,
    pub strategic_depth:     String,
    pub execution_accuracy:  String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyMoment {
    pub timestamp:   String,
    pub description: String,
}

/// The coaching report the model is asked to produce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisReport {
    pub gameplay_metrics:         GameplayMetrics,
    pub title:                    String,
    pub summary:                  String,
    pub tactical_insights:        Vec<String>,
    pub pro_suggestions:          Vec<String>,
    pub performance_optimization: String,
    pub key_moments:              Vec<KeyMoment>,
}
