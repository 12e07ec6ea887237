use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::web::state::AppState;

pub async fn user_count(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.counter.current();
    Json(json!({ "ok": true, "total_users": snapshot.total_users, "error": snapshot.error }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "application/openmetrics-text; version=1.0.0; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
