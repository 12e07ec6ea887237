use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use services::{ChangePasswordInput, SignupInput};

use crate::web::error::ApiResult;
use crate::web::extract::AuthUser;
use crate::web::state::AppState;

#[derive(Deserialize)]
pub struct UsernameCheck {
    #[serde(default)]
    pub username: String,
}

#[derive(Deserialize)]
pub struct SignInForm {
    pub email:    String,
    pub password: String,
}

pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    let result = state.accounts.signup(input).await;
    state.metrics.record_signup(result.is_ok());
    result?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn username_check(
    State(state): State<AppState>,
    payload: Result<Json<UsernameCheck>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let available = state.accounts.check_username(&body.username).await?;
    Ok(Json(json!({ "ok": true, "available": available })))
}

pub async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<SignInForm>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(form) = payload?;
    let session = state.accounts.sign_in(&form.email, &form.password).await?;
    Ok(Json(json!({
        "ok": true,
        "access_token": session.access_token,
        "refresh_token": session.refresh_token,
        "expires_in": session.expires_in,
        "user_id": session.user_id,
    })))
}

pub async fn profile(State(state): State<AppState>, AuthUser(viewer): AuthUser) -> ApiResult<Json<Value>> {
    let profile = state.accounts.profile(&viewer).await?;
    Ok(Json(json!({ "ok": true, "email": viewer.email, "profile": profile })))
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    payload: Result<Json<ChangePasswordInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    state.accounts.change_password(&viewer, input).await?;
    Ok(Json(json!({ "ok": true })))
}
