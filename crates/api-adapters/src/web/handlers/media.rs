//! Serves uploaded media when the storage backend has no public host of its own.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use domains::{Bucket, DomainError};

use crate::web::error::{ApiError, ApiResult};
use crate::web::state::AppState;

pub async fn serve(
    State(state): State<AppState>,
    params: Result<Path<(String, String)>, PathRejection>,
) -> ApiResult<Response> {
    let Path((bucket, path)) = params?;
    let not_found = || ApiError(DomainError::NotFound("Media not found.".into()));

    let source = state.media.as_ref().ok_or_else(not_found)?;
    let bucket = Bucket::from_name(&bucket).ok_or_else(not_found)?;
    let object = source
        .fetch(bucket, &path)
        .await
        .map_err(DomainError::from)?
        .ok_or_else(not_found)?;

    Ok(([(header::CONTENT_TYPE, object.content_type)], object.data).into_response())
}
