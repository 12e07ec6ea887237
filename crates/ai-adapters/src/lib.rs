//! # ai-adapters
//!
//! [`GeminiClient`] implements `AnalysisModel` on top of the Gemini
//! `generateContent` REST endpoint: one text part with the prompt, then one
//! inline JPEG part per frame.

use std::time::Duration;

use async_trait::async_trait;
use domains::{AnalysisModel, BackendError, BackendResult, Frame};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-flash-latest";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'static str,
    data:      &'a str,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct GenerateResponse {
    candidates:      Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status:  Option<String>,
}

fn build_request<'a>(prompt: &'a str, frames: &'a [Frame]) -> GenerateRequest<'a> {
    let mut parts = Vec::with_capacity(frames.len() + 1);
    parts.push(Part::Text { text: prompt });
    parts.extend(frames.iter().map(|f| Part::Inline {
        inline_data: InlineData { mime_type: "image/jpeg", data: &f.base64_jpeg },
    }));
    GenerateRequest { contents: vec![Content { parts }] }
}

/// Concatenated text parts of the first candidate.
fn reply_text(response: GenerateResponse) -> BackendResult<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(BackendError::with_code(format!("Request blocked by the model: {reason}"), reason));
    }
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(BackendError::new("The model returned an empty response."));
    }
    Ok(text)
}

fn error_from_body(status: u16, body: &str) -> BackendError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => BackendError { message: envelope.error.message, code: envelope.error.status },
        Err(_) => BackendError::with_code(format!("Gemini request failed with HTTP {status}"), status.to_string()),
    }
}

pub struct GeminiClient {
    http:     reqwest::Client,
    api_key:  SecretString,
    model:    String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: SecretString, timeout: Duration) -> BackendResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::new(format!("http client: {e}")))?;
        Ok(Self { http, api_key, model: DEFAULT_MODEL.to_string(), base_url: DEFAULT_BASE_URL.to_string() })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl AnalysisModel for GeminiClient {
    async fn generate(&self, prompt: &str, frames: &[Frame]) -> BackendResult<String> {
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&build_request(prompt, frames))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(model = %self.model, error = %e, "gemini request failed");
                BackendError::new(format!("Gemini request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = error_from_body(status.as_u16(), &body);
            tracing::warn!(model = %self.model, status = status.as_u16(), error = %err, "gemini error response");
            return Err(err);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::new(format!("Unexpected Gemini response: {e}")))?;
        let text = reply_text(body)?;
        tracing::debug!(model = %self.model, frames = frames.len(), chars = text.len(), "gemini reply received");
        Ok(text)
    }
}
