//! # Post media
//!
//! Attachment limits, object naming, the legacy single-`media_url` fallback
//! and the upload loop into object storage.

use std::sync::Arc;

use domains::{Attachment, AttachmentKind, DomainError, DomainResult, MediaStorage, MediaUpload, Post, UserId};
use thiserror::Error;
use uuid::Uuid;

/// How many attachments a single post may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentPolicy {
    pub max_items:  usize,
    pub max_videos: usize,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self { max_items: 4, max_videos: 2 }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitReached {
    #[error("Limit reached: Max {0} videos.")]
    Videos(usize),
    #[error("Limit reached: Max {0} items.")]
    Items(usize),
}

impl From<LimitReached> for DomainError {
    fn from(err: LimitReached) -> Self {
        DomainError::Validation(err.to_string())
    }
}

/// Running count of what a post already holds plus what has been staged for it.
#[derive(Debug, Clone)]
pub struct AttachmentStaging {
    policy: AttachmentPolicy,
    images: usize,
    videos: usize,
}

impl AttachmentStaging {
    pub fn new(policy: AttachmentPolicy) -> Self {
        Self { policy, images: 0, videos: 0 }
    }

    /// Starts from attachments the post keeps; they count against the limits too.
    pub fn with_existing(policy: AttachmentPolicy, existing: &[Attachment]) -> Self {
        let mut staging = Self::new(policy);
        for a in existing {
            match a.kind {
                AttachmentKind::Image => staging.images += 1,
                AttachmentKind::Video => staging.videos += 1,
            }
        }
        staging
    }

    pub fn total(&self) -> usize {
        self.images + self.videos
    }

    pub fn videos(&self) -> usize {
        self.videos
    }

    /// Accepts one more item of `kind` or reports which limit stops it.
    ///
    /// A refused video always reports the video limit, even when it is the
    /// item limit that stopped it.
    pub fn stage(&mut self, kind: AttachmentKind) -> Result<(), LimitReached> {
        let full = self.total() >= self.policy.max_items;
        match kind {
            AttachmentKind::Video if full || self.videos >= self.policy.max_videos => {
                Err(LimitReached::Videos(self.policy.max_videos))
            }
            AttachmentKind::Image if full => Err(LimitReached::Items(self.policy.max_items)),
            AttachmentKind::Video => {
                self.videos += 1;
                Ok(())
            }
            AttachmentKind::Image => {
                self.images += 1;
                Ok(())
            }
        }
    }
}

/// The attachments to show for a post.
///
/// Posts written before multi-attachment support only have `media_url`; those
/// get one synthetic attachment, a video iff the URL mentions `.mp4`.
pub fn display_attachments(post: &Post) -> Vec<Attachment> {
    legacy_fallback(post, |url| url.contains(".mp4"))
}

/// Like [`display_attachments`], but the editor also treats any URL from the
/// `videos` bucket as a video.
pub fn editable_attachments(post: &Post) -> Vec<Attachment> {
    legacy_fallback(post, |url| url.contains(".mp4") || url.contains("video"))
}

fn legacy_fallback(post: &Post, is_video: impl Fn(&str) -> bool) -> Vec<Attachment> {
    if !post.attachments.is_empty() {
        return post.attachments.clone();
    }
    match post.media_url.as_deref() {
        Some(url) if !url.is_empty() => vec![Attachment {
            kind: if is_video(url) { AttachmentKind::Video } else { AttachmentKind::Image },
            url:  url.to_string(),
            path: String::new(),
        }],
        _ => Vec::new(),
    }
}

/// `{owner}/{uuid}.{ext}`, with `ext` taken from the file name when it has a sane one.
pub fn object_path(owner: UserId, file_name: Option<&str>, kind: AttachmentKind) -> String {
    let ext = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| kind.default_extension().to_string());
    format!("{owner}/{}.{ext}", Uuid::new_v4())
}

/// Only images and videos may be attached.
pub fn check_media_type(upload: &MediaUpload) -> DomainResult<()> {
    let ty = upload.content_type.type_();
    if ty == mime::IMAGE || ty == mime::VIDEO {
        Ok(())
    } else {
        Err(DomainError::Validation(format!(
            "Unsupported media type: {}",
            upload.content_type.essence_str()
        )))
    }
}

/// Stages and uploads a batch of post media.
#[derive(Clone)]
pub struct MediaService {
    storage: Arc<dyn MediaStorage>,
    policy:  AttachmentPolicy,
}

impl MediaService {
    pub fn new(storage: Arc<dyn MediaStorage>, policy: AttachmentPolicy) -> Self {
        Self { storage, policy }
    }

    pub fn policy(&self) -> AttachmentPolicy {
        self.policy
    }

    /// Checks every upload against the limits, given what the post keeps,
    /// before anything is sent to storage.
    pub fn stage(&self, existing: &[Attachment], uploads: &[MediaUpload]) -> DomainResult<()> {
        let mut staging = AttachmentStaging::with_existing(self.policy, existing);
        for upload in uploads {
            check_media_type(upload)?;
            staging.stage(upload.kind())?;
        }
        Ok(())
    }

    /// Uploads in order and returns one attachment per file.
    ///
    /// Objects already stored stay in place if a later upload fails.
    pub async fn upload_all(&self, owner: UserId, uploads: Vec<MediaUpload>) -> DomainResult<Vec<Attachment>> {
        let mut attachments = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let kind = upload.kind();
            let bucket = kind.bucket();
            let path = object_path(owner, upload.file_name.as_deref(), kind);

            self.storage
                .upload(bucket, &path, upload.content_type.essence_str(), upload.data)
                .await
                .map_err(|e| {
                    tracing::warn!(bucket = bucket.as_str(), %path, error = %e, "media upload failed");
                    DomainError::rejected(e)
                })?;

            attachments.push(Attachment { kind, url: self.storage.public_url(bucket, &path), path });
        }
        Ok(attachments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;
    use domains::{Bucket, MockMediaStorage};

    fn upload(name: &str, ty: &str) -> MediaUpload {
        MediaUpload {
            file_name:    Some(name.to_string()),
            content_type: ty.parse().unwrap(),
            data:         Bytes::from_static(b"data"),
        }
    }

    fn post(media_url: Option<&str>, attachments: Vec<Attachment>) -> Post {
        Post {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content: None,
            media_url: media_url.map(str::to_string),
            attachments,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn third_video_is_rejected_when_two_are_staged() {
        let mut staging = AttachmentStaging::new(AttachmentPolicy::default());
        staging.stage(AttachmentKind::Video).unwrap();
        staging.stage(AttachmentKind::Video).unwrap();

        let err = staging.stage(AttachmentKind::Video).unwrap_err();
        assert_eq!(err, LimitReached::Videos(2));
        assert_eq!(err.to_string(), "Limit reached: Max 2 videos.");
        assert_eq!(staging.videos(), 2);
    }

    #[test]
    fn fifth_item_is_rejected() {
        let mut staging = AttachmentStaging::new(AttachmentPolicy::default());
        for _ in 0..4 {
            staging.stage(AttachmentKind::Image).unwrap();
        }
        assert_eq!(staging.stage(AttachmentKind::Image), Err(LimitReached::Items(4)));
        assert_eq!(staging.total(), 4);
    }

    #[test]
    fn video_refused_by_the_item_cap_names_the_video_limit() {
        let mut staging = AttachmentStaging::new(AttachmentPolicy::default());
        for _ in 0..4 {
            staging.stage(AttachmentKind::Image).unwrap();
        }
        let err = staging.stage(AttachmentKind::Video).unwrap_err();
        assert_eq!(err, LimitReached::Videos(2));
        assert_eq!(DomainError::from(err), DomainError::Validation("Limit reached: Max 2 videos.".into()));
        assert_eq!(staging.videos(), 0);
    }

    #[test]
    fn kept_attachments_count_against_the_limits() {
        let kept = vec![
            Attachment { kind: AttachmentKind::Video, url: "v1".into(), path: "p1".into() },
            Attachment { kind: AttachmentKind::Image, url: "i1".into(), path: "p2".into() },
        ];
        let mut staging = AttachmentStaging::with_existing(AttachmentPolicy::default(), &kept);
        staging.stage(AttachmentKind::Video).unwrap();
        assert_eq!(staging.stage(AttachmentKind::Video), Err(LimitReached::Videos(2)));
        staging.stage(AttachmentKind::Image).unwrap();
        assert_eq!(staging.stage(AttachmentKind::Image), Err(LimitReached::Items(4)));
    }

    #[test]
    fn legacy_media_url_becomes_one_attachment() {
        let video = display_attachments(&post(Some("https://cdn/videos/u/clip.mp4"), vec![]));
        assert_eq!(video.len(), 1);
        assert_eq!(video[0].kind, AttachmentKind::Video);
        assert!(video[0].path.is_empty());

        let image = display_attachments(&post(Some("https://cdn/images/u/pic.png"), vec![]));
        assert_eq!(image[0].kind, AttachmentKind::Image);

        assert!(display_attachments(&post(None, vec![])).is_empty());
    }

    #[test]
    fn editor_also_recognises_video_bucket_urls() {
        let p = post(Some("https://cdn/storage/v1/object/public/videos/u/clip.webm"), vec![]);
        assert_eq!(display_attachments(&p)[0].kind, AttachmentKind::Image);
        assert_eq!(editable_attachments(&p)[0].kind, AttachmentKind::Video);
    }

    #[test]
    fn real_attachments_win_over_media_url() {
        let att = Attachment { kind: AttachmentKind::Image, url: "i".into(), path: "p".into() };
        let p = post(Some("https://cdn/old.mp4"), vec![att.clone()]);
        assert_eq!(display_attachments(&p), vec![att]);
    }

    #[test]
    fn object_paths() {
        let owner = Uuid::new_v4();
        let path = object_path(owner, Some("Clip.MP4"), AttachmentKind::Video);
        assert!(path.starts_with(&format!("{owner}/")));
        assert!(path.ends_with(".mp4"));

        assert!(object_path(owner, Some("noext"), AttachmentKind::Image).ends_with(".jpg"));
        assert!(object_path(owner, None, AttachmentKind::Video).ends_with(".mp4"));
        assert!(object_path(owner, Some("weird.p/ng"), AttachmentKind::Image).ends_with(".jpg"));
    }

    #[test]
    fn stage_rejects_non_media() {
        let media = MediaService::new(Arc::new(MockMediaStorage::new()), AttachmentPolicy::default());
        let err = media.stage(&[], &[upload("notes.pdf", "application/pdf")]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(m) if m.contains("application/pdf")));
    }

    #[tokio::test]
    async fn uploads_go_to_the_bucket_matching_their_kind() {
        let mut storage = MockMediaStorage::new();
        storage
            .expect_upload()
            .withf(|bucket, path, ty, _| *bucket == Bucket::Videos && path.ends_with(".mp4") && ty == "video/mp4")
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        storage
            .expect_upload()
            .withf(|bucket, _, ty, _| *bucket == Bucket::Images && ty == "image/png")
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        storage
            .expect_public_url()
            .returning(|bucket, path| format!("https://cdn/{}/{}", bucket.as_str(), path));

        let media = MediaService::new(Arc::new(storage), AttachmentPolicy::default());
        let owner = Uuid::new_v4();
        let attachments = media
            .upload_all(owner, vec![upload("clip.mp4", "video/mp4"), upload("shot.png", "image/png")])
            .await
            .unwrap();

        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].kind, AttachmentKind::Video);
        assert!(attachments[0].url.starts_with("https://cdn/videos/"));
        assert!(attachments[1].url.starts_with("https://cdn/images/"));
        assert!(attachments[1].path.starts_with(&owner.to_string()));
    }
}
