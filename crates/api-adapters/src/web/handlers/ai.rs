use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use services::FeedbackInput;

use crate::web::error::ApiResult;
use crate::web::extract::AuthUser;
use crate::web::state::AppState;

#[derive(Deserialize)]
pub struct AnalyzeForm {
    #[serde(default)]
    pub frames: Vec<String>,
}

pub async fn analyze(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    payload: Result<Json<AnalyzeForm>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(form) = payload?;
    let result = state.analysis.analyze(&viewer, form.frames).await;
    state.metrics.record_analysis(result.is_ok());
    let response = result?;
    Ok(Json(json!({ "ok": true, "requestId": response.request_id, "report": response.report })))
}

pub async fn feedback(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    state.analysis.record_feedback(&input).await?;
    Ok(Json(json!({ "ok": true })))
}
