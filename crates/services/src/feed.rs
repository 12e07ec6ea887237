//! # Feed
//!
//! Posts, likes, comments, blocking and in-place editing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::{
    Attachment, AuthorSummary, BlockRepository, CommentEntry, CommentRepository, DomainError, DomainResult,
    FeedEntry, Identity, LikeRepository, MediaUpload, NewComment, NewPost, Post, PostChanges, PostId,
    PostLike, PostRepository, UserBlock, UserId,
};
use serde::Serialize;

use crate::media::{display_attachments, editable_attachments, MediaService};

#[derive(Debug, Clone, Serialize)]
pub struct FeedPostView {
    pub id:            PostId,
    pub user_id:       UserId,
    pub author:        AuthorSummary,
    pub display_name:  String,
    pub content:       Option<String>,
    pub attachments:   Vec<Attachment>,
    pub created_at:    DateTime<Utc>,
    pub like_count:    usize,
    pub comment_count: usize,
    pub liked_by_me:   bool,
    pub is_mine:       bool,
}

impl FeedPostView {
    fn from_entry(entry: FeedEntry, viewer: UserId) -> Self {
        let attachments = display_attachments(&entry.post);
        let FeedEntry { post, author, liker_ids, comment_count } = entry;
        Self {
            id: post.id,
            user_id: post.user_id,
            display_name: author.display_name(),
            author,
            content: post.content,
            attachments,
            created_at: post.created_at,
            like_count: liker_ids.len(),
            comment_count,
            liked_by_me: liker_ids.contains(&viewer),
            is_mine: post.user_id == viewer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeState {
    pub liked:      bool,
    pub like_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id:           domains::CommentId,
    pub post_id:      PostId,
    pub user_id:      UserId,
    pub author:       AuthorSummary,
    pub display_name: String,
    pub content:      String,
    pub created_at:   DateTime<Utc>,
}

impl From<CommentEntry> for CommentView {
    fn from(entry: CommentEntry) -> Self {
        let CommentEntry { comment, author } = entry;
        Self {
            id: comment.id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            display_name: author.display_name(),
            author,
            content: comment.content,
            created_at: comment.created_at,
        }
    }
}

/// An in-place edit: new text, which existing attachments survive, and new files.
#[derive(Debug, Clone, Default)]
pub struct PostEdit {
    pub content: String,
    /// URLs of existing attachments to keep; anything else is dropped.
    pub keep:    Vec<String>,
    pub files:   Vec<MediaUpload>,
}

#[derive(Clone)]
pub struct FeedService {
    posts:     Arc<dyn PostRepository>,
    likes:     Arc<dyn LikeRepository>,
    comments:  Arc<dyn CommentRepository>,
    blocks:    Arc<dyn BlockRepository>,
    media:     MediaService,
    page_size: usize,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        likes: Arc<dyn LikeRepository>,
        comments: Arc<dyn CommentRepository>,
        blocks: Arc<dyn BlockRepository>,
        media: MediaService,
        page_size: usize,
    ) -> Self {
        Self { posts, likes, comments, blocks, media, page_size }
    }

    /// Newest posts, minus anything written by users the viewer blocked.
    pub async fn list_feed(&self, viewer: &Identity) -> DomainResult<Vec<FeedPostView>> {
        let blocked = self.blocks.blocked_by(viewer.user_id).await?;
        let entries = self.posts.list_feed(self.page_size, &blocked).await?;
        Ok(entries
            .into_iter()
            .filter(|e| !blocked.contains(&e.post.user_id))
            .map(|e| FeedPostView::from_entry(e, viewer.user_id))
            .collect())
    }

    pub async fn create_post(&self, viewer: &Identity, text: &str, files: Vec<MediaUpload>) -> DomainResult<Post> {
        let text = text.trim();
        if text.is_empty() && files.is_empty() {
            return Err(DomainError::Validation("Write something or pick media.".into()));
        }
        self.media.stage(&[], &files)?;

        let attachments = self.media.upload_all(viewer.user_id, files).await?;
        let post = NewPost {
            user_id: viewer.user_id,
            content: (!text.is_empty()).then(|| text.to_string()),
            media_url: attachments.first().map(|a| a.url.clone()),
            attachments,
        };

        let created = self.posts.insert(&post).await.map_err(DomainError::rejected)?;
        tracing::info!(post_id = %created.id, user_id = %viewer.user_id, attachments = created.attachments.len(), "post created");
        Ok(created)
    }

    /// Likes the post if the viewer has not, unlikes it otherwise.
    pub async fn toggle_like(&self, viewer: &Identity, post_id: PostId) -> DomainResult<LikeState> {
        self.require_post(post_id).await?;
        let like = PostLike { post_id, user_id: viewer.user_id };

        let liked = if self.likes.is_liked(like).await? {
            self.likes.delete(like).await.map_err(DomainError::rejected)?;
            false
        } else {
            self.likes.insert(like).await.map_err(DomainError::rejected)?;
            true
        };

        let like_count = self.likes.count(post_id).await?;
        Ok(LikeState { liked, like_count })
    }

    pub async fn list_comments(&self, post_id: PostId) -> DomainResult<Vec<CommentView>> {
        let entries = self.comments.list_for_post(post_id).await?;
        Ok(entries.into_iter().map(CommentView::from).collect())
    }

    pub async fn add_comment(&self, viewer: &Identity, post_id: PostId, content: &str) -> DomainResult<domains::Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(DomainError::Validation("Comment cannot be empty.".into()));
        }
        self.require_post(post_id).await?;

        self.comments
            .insert(&NewComment { post_id, user_id: viewer.user_id, content: content.to_string() })
            .await
            .map_err(DomainError::rejected)
    }

    /// Replaces text and attachments of the viewer's own post.
    pub async fn edit_post(&self, viewer: &Identity, post_id: PostId, edit: PostEdit) -> DomainResult<PostChanges> {
        let post = self.require_own_post(viewer, post_id).await?;

        let kept: Vec<Attachment> = editable_attachments(&post)
            .into_iter()
            .filter(|a| edit.keep.contains(&a.url))
            .collect();
        self.media.stage(&kept, &edit.files)?;

        let uploaded = self.media.upload_all(viewer.user_id, edit.files).await?;
        let attachments: Vec<Attachment> = kept.into_iter().chain(uploaded).collect();
        let changes = PostChanges {
            content: Some(edit.content),
            media_url: attachments.first().map(|a| a.url.clone()),
            attachments,
        };

        self.posts.update(post_id, &changes).await.map_err(DomainError::rejected)?;
        tracing::info!(%post_id, attachments = changes.attachments.len(), "post edited");
        Ok(changes)
    }

    pub async fn delete_post(&self, viewer: &Identity, post_id: PostId) -> DomainResult<()> {
        self.require_own_post(viewer, post_id).await?;
        self.posts.delete(post_id).await.map_err(DomainError::rejected)?;
        tracing::info!(%post_id, "post deleted");
        Ok(())
    }

    pub async fn block_user(&self, viewer: &Identity, target: UserId) -> DomainResult<()> {
        if target == viewer.user_id {
            return Err(DomainError::Validation("You cannot block yourself.".into()));
        }
        self.blocks
            .insert(UserBlock { blocker_id: viewer.user_id, blocked_id: target })
            .await
            .map_err(DomainError::rejected)
    }

    async fn require_post(&self, post_id: PostId) -> DomainResult<Post> {
        self.posts
            .get(post_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Post not found.".into()))
    }

    async fn require_own_post(&self, viewer: &Identity, post_id: PostId) -> DomainResult<Post> {
        let post = self.require_post(post_id).await?;
        if post.user_id != viewer.user_id {
            return Err(DomainError::Forbidden("Only the author can change this post.".into()));
        }
        Ok(post)
    }
}
