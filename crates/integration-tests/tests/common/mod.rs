//! Shared harness: the real router over in-memory adapters.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use api_adapters::web::{self, AppState};
use api_adapters::Metrics;
use async_trait::async_trait;
use auth_adapters::{JwtIssuer, JwtVerifier, MemoryAuth};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use domains::{AnalysisModel, BackendError, BackendResult, Frame, UserId};
use serde_json::{json, Value};
use services::{AccountService, AnalysisService, AttachmentPolicy, FeedService, LiveCounter, MediaService};
use storage_adapters::MemoryStore;
use tower::ServiceExt;

pub const SECRET: &[u8] = b"integration-test-secret-0123456789";
pub const BOUNDARY: &str = "kashaaf-test-boundary";

pub const COACH_REPLY: &str = "```json\n{\"title\":\"Aggressive Push Analysis\",\"summary\":\"Good tempo.\",\
\"gameplayMetrics\":{\"reactionTimeScore\":\"9/10\"},\"keyMoments\":[{\"timestamp\":\"0:05\",\"description\":\"Entry\"}]}\n```";

/// A model that always answers with the same text, or always fails.
pub struct CannedModel(pub Result<String, String>);

#[async_trait]
impl AnalysisModel for CannedModel {
    async fn generate(&self, _prompt: &str, _frames: &[Frame]) -> BackendResult<String> {
        self.0.clone().map_err(BackendError::new)
    }
}

pub struct TestApp {
    pub router: Router,
    pub store:  Arc<MemoryStore>,
    pub auth:   Arc<MemoryAuth>,
}

pub fn app() -> TestApp {
    app_with_model(Some(Arc::new(CannedModel(Ok(COACH_REPLY.to_string())))))
}

pub fn app_with_model(model: Option<Arc<dyn AnalysisModel>>) -> TestApp {
    build(model, 64 * 1024 * 1024)
}

/// The default app with request bodies capped at `body_limit` bytes.
pub fn app_with_limit(body_limit: usize) -> TestApp {
    build(Some(Arc::new(CannedModel(Ok(COACH_REPLY.to_string())))), body_limit)
}

fn build(model: Option<Arc<dyn AnalysisModel>>, body_limit: usize) -> TestApp {
    let store = Arc::new(MemoryStore::new("http://media.test/media"));
    let auth = Arc::new(MemoryAuth::new(JwtIssuer::new(SECRET, 3600)));
    let media = MediaService::new(store.clone(), AttachmentPolicy::default());

    let state = AppState {
        accounts: AccountService::new(store.clone(), auth.clone()),
        feed:     FeedService::new(store.clone(), store.clone(), store.clone(), store.clone(), media, 50),
        analysis: AnalysisService::new(store.clone(), model, 16),
        counter:  Arc::new(LiveCounter::spawn(store.clone(), Some(store.clone()), Duration::from_secs(15))),
        tokens:   Arc::new(JwtVerifier::new(SECRET)),
        metrics:  Arc::new(Metrics::new()),
        media:    Some(store.clone()),
    };
    TestApp { router: web::router(state, body_limit), store, auth }
}

/// One part of a multipart body.
pub enum Part<'a> {
    Text { name: &'a str, value: &'a str },
    File { name: &'a str, file_name: &'a str, content_type: &'a str, data: &'a [u8] },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text { name, value } => {
                body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
                body.extend_from_slice(value.as_bytes());
            }
            Part::File { name, file_name, content_type, data } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn video(file_name: &str) -> Part<'_> {
    Part::File { name: "files", file_name, content_type: "video/mp4", data: b"\x00\x00\x00\x18ftypmp42" }
}

pub fn image(file_name: &str) -> Part<'_> {
    Part::File { name: "files", file_name, content_type: "image/png", data: b"\x89PNG\r\n\x1a\n" }
}

/// Base64 of the smallest prefix that sniffs as JPEG.
pub fn jpeg_frame() -> String {
    STANDARD.encode([0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'])
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    pub async fn send_raw(&self, request: Request<Body>) -> (StatusCode, String) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Plain GET; returns the status, the content type and the raw body.
    pub async fn download(&self, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type =
            response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, bytes.to_vec())
    }

    pub async fn json(&self, method: Method, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(req.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    pub async fn multipart(&self, method: Method, uri: &str, token: &str, parts: &[Part<'_>]) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(req).await
    }

    pub async fn signup(&self, username: &str, email: &str) -> (StatusCode, Value) {
        self.json(
            Method::POST,
            "/api/signup",
            None,
            json!({
                "full_name": format!("{username} Player"),
                "username": username,
                "email": email,
                "password": "correct-horse-battery",
            }),
        )
        .await
    }

    /// Signs up `username` and returns its id and an access token.
    pub async fn register(&self, username: &str) -> (UserId, String) {
        let email = format!("{username}@kashaaf.test");
        let (status, body) = self.signup(username, &email).await;
        assert_eq!(status, StatusCode::OK, "signup failed: {body}");

        let (status, session) = self
            .json(
                Method::POST,
                "/api/auth/signin",
                None,
                json!({ "email": email, "password": "correct-horse-battery" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "sign-in failed: {session}");
        let user_id = session["user_id"].as_str().unwrap().parse().unwrap();
        (user_id, session["access_token"].as_str().unwrap().to_string())
    }

    pub async fn create_post(&self, token: &str, text: &str) -> String {
        let (status, body) = self
            .multipart(Method::POST, "/api/posts", token, &[Part::Text { name: "content", value: text }])
            .await;
        assert_eq!(status, StatusCode::OK, "create post failed: {body}");
        body["post"]["id"].as_str().unwrap().to_string()
    }
}
