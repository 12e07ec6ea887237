//! # In-memory backend
//!
//! One [`MemoryStore`] implements every table-shaped port plus object
//! storage and the user-count subscription. Constraint failures come back
//! with the same codes Postgres would use, so services see identical errors.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use domains::{
    AnalysisOutcome, AnalysisRequestId, AnalysisRequestRepository, AnalysisStatus, AuthorSummary,
    BackendError, BackendResult, BlockRepository, Bucket, Comment, CommentEntry, CommentId, CommentRepository,
    FeedEntry, FeedbackUpdate, LikeRepository, MediaSource, MediaStorage, NewAnalysisRequest, NewComment, NewPost,
    NewProfile, Post, PostChanges, PostId, PostLike, PostRepository, Profile, ProfileRepository,
    StatsRepository, StatsSubscriber, StoredObject, UserBlock, UserId,
};
use tokio::sync::mpsc;
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// A stored `analysis_requests` row.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRecord {
    pub id:               AnalysisRequestId,
    pub user_id:          UserId,
    pub status:           AnalysisStatus,
    pub frame_count:      usize,
    pub report:           Option<serde_json::Value>,
    pub error:            Option<String>,
    pub feedback_correct: Option<bool>,
    pub feedback_helpful: Option<u8>,
    pub feedback_tags:    Option<Vec<String>>,
    pub created_at:       DateTime<Utc>,
    pub updated_at:       DateTime<Utc>,
}

pub struct MemoryStore {
    public_base: String,
    profiles:    DashMap<UserId, Profile>,
    posts:       DashMap<PostId, Post>,
    likes:       DashSet<(PostId, UserId)>,
    comments:    DashMap<CommentId, Comment>,
    blocks:      DashSet<(UserId, UserId)>,
    analyses:    DashMap<AnalysisRequestId, AnalysisRecord>,
    objects:     DashMap<(Bucket, String), StoredObject>,
    total_users: AtomicI64,
    watchers:    Mutex<Vec<mpsc::Sender<i64>>>,
}

impl MemoryStore {
    /// `public_base` prefixes media URLs, e.g. `http://localhost:8080/media`.
    pub fn new(public_base: impl Into<String>) -> Self {
        Self {
            public_base: public_base.into().trim_end_matches('/').to_string(),
            profiles:    DashMap::new(),
            posts:       DashMap::new(),
            likes:       DashSet::new(),
            comments:    DashMap::new(),
            blocks:      DashSet::new(),
            analyses:    DashMap::new(),
            objects:     DashMap::new(),
            total_users: AtomicI64::new(0),
            watchers:    Mutex::new(Vec::new()),
        }
    }

    pub fn analysis_request(&self, id: AnalysisRequestId) -> Option<AnalysisRecord> {
        self.analyses.get(&id).map(|r| r.clone())
    }

    /// Every analysis request `user_id` started, oldest first.
    pub fn analysis_requests_for(&self, user_id: UserId) -> Vec<AnalysisRecord> {
        let mut records: Vec<AnalysisRecord> =
            self.analyses.iter().filter(|r| r.user_id == user_id).map(|r| r.clone()).collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    pub fn object(&self, bucket: Bucket, path: &str) -> Option<StoredObject> {
        self.objects.get(&(bucket, path.to_string())).map(|o| o.clone())
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn author(&self, user_id: UserId) -> AuthorSummary {
        self.profiles
            .get(&user_id)
            .map(|p| AuthorSummary {
                username:   Some(p.username.clone()),
                full_name:  Some(p.full_name.clone()),
                avatar_url: p.avatar_url.clone(),
            })
            .unwrap_or_default()
    }

    /// Mirrors the `public_stats` trigger: bump the count and notify subscribers.
    fn bump_total_users(&self) {
        let total = self.total_users.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers.retain(|tx| match tx.try_send(total) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
        }
    }

    fn require_post(&self, id: PostId) -> BackendResult<()> {
        if self.posts.contains_key(&id) {
            Ok(())
        } else {
            Err(BackendError::with_code(
                "insert or update violates foreign key constraint on \"posts\"",
                FOREIGN_KEY_VIOLATION,
            ))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory://media")
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn find_id_by_username(&self, username: &str) -> BackendResult<Option<UserId>> {
        Ok(self.profiles.iter().find(|p| p.username == username).map(|p| p.id))
    }

    async fn insert(&self, profile: &NewProfile) -> BackendResult<()> {
        if self.profiles.iter().any(|p| p.username == profile.username) {
            return Err(BackendError::with_code(
                "duplicate key value violates unique constraint \"profiles_username_key\"",
                UNIQUE_VIOLATION,
            ));
        }
        if self.profiles.contains_key(&profile.id) {
            return Err(BackendError::with_code(
                "duplicate key value violates unique constraint \"profiles_pkey\"",
                UNIQUE_VIOLATION,
            ));
        }
        self.profiles.insert(
            profile.id,
            Profile {
                id:           profile.id,
                full_name:    profile.full_name.clone(),
                username:     profile.username.clone(),
                phone_number: profile.phone_number.clone(),
                avatar_url:   None,
            },
        );
        self.bump_total_users();
        Ok(())
    }

    async fn get(&self, id: UserId) -> BackendResult<Option<Profile>> {
        Ok(self.profiles.get(&id).map(|p| p.clone()))
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn list_feed(&self, limit: usize, exclude_authors: &[UserId]) -> BackendResult<Vec<FeedEntry>> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| !exclude_authors.contains(&p.user_id))
            .map(|p| p.clone())
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts.truncate(limit);

        Ok(posts
            .into_iter()
            .map(|post| FeedEntry {
                author:        self.author(post.user_id),
                liker_ids:     self.likes.iter().filter(|k| k.0 == post.id).map(|k| k.1).collect(),
                comment_count: self.comments.iter().filter(|c| c.post_id == post.id).count(),
                post,
            })
            .collect())
    }

    async fn get(&self, id: PostId) -> BackendResult<Option<Post>> {
        Ok(self.posts.get(&id).map(|p| p.clone()))
    }

    async fn insert(&self, post: &NewPost) -> BackendResult<Post> {
        let row = Post {
            id:          Uuid::new_v4(),
            user_id:     post.user_id,
            content:     post.content.clone(),
            media_url:   post.media_url.clone(),
            attachments: post.attachments.clone(),
            created_at:  Utc::now(),
        };
        self.posts.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update(&self, id: PostId, changes: &PostChanges) -> BackendResult<()> {
        if let Some(mut post) = self.posts.get_mut(&id) {
            post.content = changes.content.clone();
            post.attachments = changes.attachments.clone();
            post.media_url = changes.media_url.clone();
        }
        Ok(())
    }

    /// Likes and comments go with the post, like an `on delete cascade`.
    async fn delete(&self, id: PostId) -> BackendResult<()> {
        self.posts.remove(&id);
        self.likes.retain(|k| k.0 != id);
        self.comments.retain(|_, c| c.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl LikeRepository for MemoryStore {
    async fn is_liked(&self, like: PostLike) -> BackendResult<bool> {
        Ok(self.likes.contains(&(like.post_id, like.user_id)))
    }

    async fn insert(&self, like: PostLike) -> BackendResult<()> {
        self.require_post(like.post_id)?;
        if !self.likes.insert((like.post_id, like.user_id)) {
            return Err(BackendError::with_code(
                "duplicate key value violates unique constraint \"post_likes_pkey\"",
                UNIQUE_VIOLATION,
            ));
        }
        Ok(())
    }

    async fn delete(&self, like: PostLike) -> BackendResult<()> {
        self.likes.remove(&(like.post_id, like.user_id));
        Ok(())
    }

    async fn count(&self, post_id: PostId) -> BackendResult<usize> {
        Ok(self.likes.iter().filter(|k| k.0 == post_id).count())
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn list_for_post(&self, post_id: PostId) -> BackendResult<Vec<CommentEntry>> {
        let mut comments: Vec<Comment> =
            self.comments.iter().filter(|c| c.post_id == post_id).map(|c| c.clone()).collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments
            .into_iter()
            .map(|comment| CommentEntry { author: self.author(comment.user_id), comment })
            .collect())
    }

    async fn insert(&self, comment: &NewComment) -> BackendResult<Comment> {
        self.require_post(comment.post_id)?;
        let row = Comment {
            id:         Uuid::new_v4(),
            post_id:    comment.post_id,
            user_id:    comment.user_id,
            content:    comment.content.clone(),
            created_at: Utc::now(),
        };
        self.comments.insert(row.id, row.clone());
        Ok(row)
    }
}

#[async_trait]
impl BlockRepository for MemoryStore {
    async fn blocked_by(&self, blocker_id: UserId) -> BackendResult<Vec<UserId>> {
        Ok(self.blocks.iter().filter(|k| k.0 == blocker_id).map(|k| k.1).collect())
    }

    async fn insert(&self, block: UserBlock) -> BackendResult<()> {
        if !self.blocks.insert((block.blocker_id, block.blocked_id)) {
            return Err(BackendError::with_code(
                "duplicate key value violates unique constraint \"user_blocks_pkey\"",
                UNIQUE_VIOLATION,
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StatsRepository for MemoryStore {
    async fn total_users(&self) -> BackendResult<i64> {
        Ok(self.total_users.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl StatsSubscriber for MemoryStore {
    async fn subscribe(&self) -> BackendResult<mpsc::Receiver<i64>> {
        let (tx, rx) = mpsc::channel(16);
        self.watchers
            .lock()
            .map_err(|_| BackendError::new("stats subscription registry poisoned"))?
            .push(tx);
        Ok(rx)
    }
}

#[async_trait]
impl MediaStorage for MemoryStore {
    async fn upload(&self, bucket: Bucket, path: &str, content_type: &str, data: Bytes) -> BackendResult<()> {
        let key = (bucket, path.to_string());
        if self.objects.contains_key(&key) {
            return Err(BackendError::with_code("The resource already exists", "409"));
        }
        self.objects.insert(key, StoredObject { content_type: content_type.to_string(), data });
        Ok(())
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> String {
        format!("{}/{}/{}", self.public_base, bucket.as_str(), path)
    }
}

#[async_trait]
impl MediaSource for MemoryStore {
    async fn fetch(&self, bucket: Bucket, path: &str) -> BackendResult<Option<StoredObject>> {
        Ok(self.object(bucket, path))
    }
}

#[async_trait]
impl AnalysisRequestRepository for MemoryStore {
    async fn create(&self, request: &NewAnalysisRequest) -> BackendResult<AnalysisRequestId> {
        let now = Utc::now();
        let record = AnalysisRecord {
            id:               Uuid::new_v4(),
            user_id:          request.user_id,
            status:           request.status,
            frame_count:      request.frame_count,
            report:           None,
            error:            None,
            feedback_correct: None,
            feedback_helpful: None,
            feedback_tags:    None,
            created_at:       now,
            updated_at:       now,
        };
        let id = record.id;
        self.analyses.insert(id, record);
        Ok(id)
    }

    async fn finish(&self, id: AnalysisRequestId, outcome: &AnalysisOutcome) -> BackendResult<()> {
        if let Some(mut record) = self.analyses.get_mut(&id) {
            record.status = outcome.status;
            record.report = outcome.report.clone();
            record.error = outcome.error.clone();
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    /// Like a filtered `UPDATE`, an unknown id matches no row and is not an error.
    async fn update_feedback(&self, id: AnalysisRequestId, update: &FeedbackUpdate) -> BackendResult<()> {
        if let Some(mut record) = self.analyses.get_mut(&id) {
            record.updated_at = update.updated_at;
            if let Some(correct) = update.correct {
                record.feedback_correct = Some(correct);
            }
            if let Some(helpful) = update.helpful {
                record.feedback_helpful = Some(helpful);
            }
            if let Some(tags) = &update.tags {
                record.feedback_tags = Some(tags.clone());
            }
        }
        Ok(())
    }
}
