use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Multipart, Path, State};
use axum::Json;
use domains::{PostId, UserId};
use serde::Deserialize;
use serde_json::{json, Value};
use services::PostEdit;

use crate::web::error::ApiResult;
use crate::web::extract::{AuthUser, PostForm};
use crate::web::state::AppState;

#[derive(Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub content: String,
}

pub async fn list_feed(State(state): State<AppState>, AuthUser(viewer): AuthUser) -> ApiResult<Json<Value>> {
    let posts = state.feed.list_feed(&viewer).await?;
    Ok(Json(json!({ "ok": true, "posts": posts })))
}

pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Value>> {
    let form = PostForm::read(multipart?).await?;
    let post = state.feed.create_post(&viewer, &form.content, form.files).await?;
    Ok(Json(json!({ "ok": true, "post": post })))
}

pub async fn edit_post(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    id: Result<Path<PostId>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    let form = PostForm::read(multipart?).await?;
    let edit = PostEdit { content: form.content, keep: form.keep, files: form.files };
    let changes = state.feed.edit_post(&viewer, id, edit).await?;
    Ok(Json(json!({ "ok": true, "post": changes })))
}

pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    id: Result<Path<PostId>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    state.feed.delete_post(&viewer, id).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    id: Result<Path<PostId>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    let like = state.feed.toggle_like(&viewer, id).await?;
    Ok(Json(json!({ "ok": true, "liked": like.liked, "like_count": like.like_count })))
}

pub async fn list_comments(
    State(state): State<AppState>,
    AuthUser(_viewer): AuthUser,
    id: Result<Path<PostId>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    let comments = state.feed.list_comments(id).await?;
    Ok(Json(json!({ "ok": true, "comments": comments })))
}

pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    id: Result<Path<PostId>, PathRejection>,
    payload: Result<Json<CommentForm>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    let Json(form) = payload?;
    let comment = state.feed.add_comment(&viewer, id, &form.content).await?;
    Ok(Json(json!({ "ok": true, "comment": comment })))
}

pub async fn block_user(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    id: Result<Path<UserId>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(target) = id?;
    state.feed.block_user(&viewer, target).await?;
    Ok(Json(json!({ "ok": true })))
}
