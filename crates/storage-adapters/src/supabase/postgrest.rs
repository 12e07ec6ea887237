//! Table access through PostgREST (`/rest/v1/<table>`).
//!
//! Filters use PostgREST's `column=op.value` query syntax. Every request
//! runs with the service-role key, so row-level security does not apply
//! and ownership is checked by the services.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    AnalysisOutcome, AnalysisRequestId, AnalysisRequestRepository, AnalysisStatus, Attachment, AuthorSummary, BackendError,
    BackendResult, BlockRepository, Comment, CommentEntry, CommentId, CommentRepository, FeedEntry,
    FeedbackUpdate, LikeRepository, NewAnalysisRequest, NewComment, NewPost, NewProfile, Post, PostChanges,
    PostId, PostLike, PostRepository, Profile, ProfileRepository, StatsRepository, UserBlock, UserId,
};
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};

use super::SupabaseClient;

const POST_COLUMNS: &str = "id,user_id,content,media_url,attachments,created_at";
const FEED_SELECT: &str = "id,user_id,content,media_url,attachments,created_at,\
profiles(username,full_name,avatar_url),post_likes(user_id),post_comments(id)";
const COMMENT_SELECT: &str = "id,post_id,user_id,content,created_at,profiles(username,full_name,avatar_url)";

/// PostgREST-backed implementation of the table ports and, in
/// [`super::storage`], of `MediaStorage`.
#[derive(Clone)]
pub struct SupabaseStore {
    pub(crate) client: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    fn table(&self, method: Method, table: &str) -> RequestBuilder {
        self.client.service(method, &format!("/rest/v1/{table}"))
    }

    fn insert_returning(&self, table: &str) -> RequestBuilder {
        self.table(Method::POST, table).header("Prefer", "return=representation")
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

fn first<T>(rows: Vec<T>, what: &str) -> BackendResult<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| BackendError::new(format!("{what}: no row returned")))
}

#[derive(Deserialize)]
struct IdRow<T> {
    id: T,
}

#[derive(Deserialize)]
struct UserIdRow {
    user_id: UserId,
}

/// `attachments` is nullable in the table.
#[derive(Deserialize)]
struct PostRow {
    id:          PostId,
    user_id:     UserId,
    content:     Option<String>,
    media_url:   Option<String>,
    attachments: Option<Vec<Attachment>>,
    created_at:  DateTime<Utc>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id:          row.id,
            user_id:     row.user_id,
            content:     row.content,
            media_url:   row.media_url,
            attachments: row.attachments.unwrap_or_default(),
            created_at:  row.created_at,
        }
    }
}

#[derive(Deserialize)]
struct FeedRow {
    #[serde(flatten)]
    post:          PostRow,
    profiles:      Option<AuthorSummary>,
    #[serde(default)]
    post_likes:    Vec<UserIdRow>,
    #[serde(default)]
    post_comments: Vec<IdRow<CommentId>>,
}

impl From<FeedRow> for FeedEntry {
    fn from(row: FeedRow) -> Self {
        FeedEntry {
            post:          row.post.into(),
            author:        row.profiles.unwrap_or_default(),
            liker_ids:     row.post_likes.into_iter().map(|l| l.user_id).collect(),
            comment_count: row.post_comments.len(),
        }
    }
}

#[derive(Deserialize)]
struct CommentRow {
    #[serde(flatten)]
    comment:  Comment,
    profiles: Option<AuthorSummary>,
}

/// `analysis_requests` holds the job state; frame counts are not stored.
#[derive(Serialize)]
struct NewRequestRow {
    user_id: UserId,
    status:  AnalysisStatus,
}

impl From<&NewAnalysisRequest> for NewRequestRow {
    fn from(request: &NewAnalysisRequest) -> Self {
        Self { user_id: request.user_id, status: request.status }
    }
}

#[derive(Serialize)]
struct RequestStatusRow<'a> {
    status:     AnalysisStatus,
    error:      Option<&'a str>,
    updated_at: DateTime<Utc>,
}

/// One `analysis_reports` row per request, keyed by `request_id`.
#[derive(Serialize)]
struct ReportRow<'a> {
    request_id: AnalysisRequestId,
    summary:    Option<&'a str>,
    metrics:    &'a serde_json::Value,
}

impl<'a> ReportRow<'a> {
    fn new(request_id: AnalysisRequestId, report: &'a serde_json::Value) -> Self {
        Self { request_id, summary: report.get("summary").and_then(serde_json::Value::as_str), metrics: report }
    }
}

#[derive(Deserialize)]
struct StatsRow {
    total_users: i64,
}

#[async_trait]
impl ProfileRepository for SupabaseStore {
    async fn find_id_by_username(&self, username: &str) -> BackendResult<Option<UserId>> {
        let rows: Vec<IdRow<UserId>> = self
            .client
            .send_json(self.table(Method::GET, "profiles").query(&[
                ("select", "id".to_string()),
                ("username", eq(username)),
                ("limit", "1".to_string()),
            ]))
            .await?;
        Ok(rows.into_iter().next().map(|r| r.id))
    }

    async fn insert(&self, profile: &NewProfile) -> BackendResult<()> {
        self.client.send_empty(self.table(Method::POST, "profiles").json(profile)).await
    }

    async fn get(&self, id: UserId) -> BackendResult<Option<Profile>> {
        let rows: Vec<Profile> = self
            .client
            .send_json(self.table(Method::GET, "profiles").query(&[
                ("select", "id,full_name,username,phone_number,avatar_url".to_string()),
                ("id", eq(id)),
            ]))
            .await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl PostRepository for SupabaseStore {
    async fn list_feed(&self, limit: usize, exclude_authors: &[UserId]) -> BackendResult<Vec<FeedEntry>> {
        let mut query = vec![
            ("select", FEED_SELECT.to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        if !exclude_authors.is_empty() {
            let ids: Vec<String> = exclude_authors.iter().map(UserId::to_string).collect();
            query.push(("user_id", format!("not.in.({})", ids.join(","))));
        }

        let rows: Vec<FeedRow> = self.client.send_json(self.table(Method::GET, "posts").query(&query)).await?;
        Ok(rows.into_iter().map(FeedEntry::from).collect())
    }

    async fn get(&self, id: PostId) -> BackendResult<Option<Post>> {
        let rows: Vec<PostRow> = self
            .client
            .send_json(
                self.table(Method::GET, "posts")
                    .query(&[("select", POST_COLUMNS.to_string()), ("id", eq(id))]),
            )
            .await?;
        Ok(rows.into_iter().next().map(Post::from))
    }

    async fn insert(&self, post: &NewPost) -> BackendResult<Post> {
        let rows: Vec<PostRow> = self
            .client
            .send_json(self.insert_returning("posts").query(&[("select", POST_COLUMNS)]).json(post))
            .await?;
        first(rows, "posts insert").map(Post::from)
    }

    async fn update(&self, id: PostId, changes: &PostChanges) -> BackendResult<()> {
        self.client
            .send_empty(self.table(Method::PATCH, "posts").query(&[("id", eq(id))]).json(changes))
            .await
    }

    async fn delete(&self, id: PostId) -> BackendResult<()> {
        self.client
            .send_empty(self.table(Method::DELETE, "posts").query(&[("id", eq(id))]))
            .await
    }
}

#[async_trait]
impl LikeRepository for SupabaseStore {
    async fn is_liked(&self, like: PostLike) -> BackendResult<bool> {
        let rows: Vec<UserIdRow> = self
            .client
            .send_json(self.table(Method::GET, "post_likes").query(&[
                ("select", "user_id".to_string()),
                ("post_id", eq(like.post_id)),
                ("user_id", eq(like.user_id)),
                ("limit", "1".to_string()),
            ]))
            .await?;
        Ok(!rows.is_empty())
    }

    async fn insert(&self, like: PostLike) -> BackendResult<()> {
        self.client.send_empty(self.table(Method::POST, "post_likes").json(&like)).await
    }

    async fn delete(&self, like: PostLike) -> BackendResult<()> {
        self.client
            .send_empty(
                self.table(Method::DELETE, "post_likes")
                    .query(&[("post_id", eq(like.post_id)), ("user_id", eq(like.user_id))]),
            )
            .await
    }

    /// Asks PostgREST for an exact count and reads it from `Content-Range`.
    async fn count(&self, post_id: PostId) -> BackendResult<usize> {
        let response = self
            .client
            .send(
                self.table(Method::HEAD, "post_likes")
                    .query(&[("select", "user_id".to_string()), ("post_id", eq(post_id))])
                    .header("Prefer", "count=exact"),
            )
            .await?;

        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| BackendError::new("post_likes count: missing Content-Range total"))
    }
}

/// `0-24/3573` or `*/0` → the part after the slash.
fn parse_content_range_total(header: &str) -> Option<usize> {
    header.rsplit_once('/').and_then(|(_, total)| total.parse().ok())
}

#[async_trait]
impl CommentRepository for SupabaseStore {
    async fn list_for_post(&self, post_id: PostId) -> BackendResult<Vec<CommentEntry>> {
        let rows: Vec<CommentRow> = self
            .client
            .send_json(self.table(Method::GET, "post_comments").query(&[
                ("select", COMMENT_SELECT.to_string()),
                ("post_id", eq(post_id)),
                ("order", "created_at.asc".to_string()),
            ]))
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| CommentEntry { comment: r.comment, author: r.profiles.unwrap_or_default() })
            .collect())
    }

    async fn insert(&self, comment: &NewComment) -> BackendResult<Comment> {
        let rows: Vec<Comment> = self.client.send_json(self.insert_returning("post_comments").json(comment)).await?;
        first(rows, "post_comments insert")
    }
}

#[async_trait]
impl BlockRepository for SupabaseStore {
    async fn blocked_by(&self, blocker_id: UserId) -> BackendResult<Vec<UserId>> {
        #[derive(Deserialize)]
        struct Row {
            blocked_id: UserId,
        }
        let rows: Vec<Row> = self
            .client
            .send_json(
                self.table(Method::GET, "user_blocks")
                    .query(&[("select", "blocked_id".to_string()), ("blocker_id", eq(blocker_id))]),
            )
            .await?;
        Ok(rows.into_iter().map(|r| r.blocked_id).collect())
    }

    async fn insert(&self, block: UserBlock) -> BackendResult<()> {
        self.client.send_empty(self.table(Method::POST, "user_blocks").json(&block)).await
    }
}

#[async_trait]
impl StatsRepository for SupabaseStore {
    async fn total_users(&self) -> BackendResult<i64> {
        let rows: Vec<StatsRow> = self
            .client
            .send_json(
                self.table(Method::GET, "public_stats")
                    .query(&[("select", "total_users"), ("id", "eq.1")]),
            )
            .await?;
        first(rows, "public_stats").map(|r| r.total_users)
    }
}

#[async_trait]
impl AnalysisRequestRepository for SupabaseStore {
    async fn create(&self, request: &NewAnalysisRequest) -> BackendResult<AnalysisRequestId> {
        let rows: Vec<IdRow<AnalysisRequestId>> = self
            .client
            .send_json(
                self.insert_returning("analysis_requests")
                    .query(&[("select", "id")])
                    .json(&NewRequestRow::from(request)),
            )
            .await?;
        first(rows, "analysis_requests insert").map(|r| r.id)
    }

    /// Writes the report first so a `done` request always has one.
    async fn finish(&self, id: AnalysisRequestId, outcome: &AnalysisOutcome) -> BackendResult<()> {
        if let Some(report) = &outcome.report {
            self.client
                .send_empty(
                    self.table(Method::POST, "analysis_reports")
                        .query(&[("on_conflict", "request_id")])
                        .header("Prefer", "resolution=merge-duplicates")
                        .json(&ReportRow::new(id, report)),
                )
                .await?;
        }
        let status = RequestStatusRow { status: outcome.status, error: outcome.error.as_deref(), updated_at: Utc::now() };
        self.client
            .send_empty(self.table(Method::PATCH, "analysis_requests").query(&[("id", eq(id))]).json(&status))
            .await
    }

    async fn update_feedback(&self, id: AnalysisRequestId, update: &FeedbackUpdate) -> BackendResult<()> {
        self.client
            .send_empty(self.table(Method::PATCH, "analysis_requests").query(&[("id", eq(id))]).json(update))
            .await
    }
}
