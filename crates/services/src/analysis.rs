//! # Gameplay analysis
//!
//! Sends sampled JPEG frames to the hosted model with a fixed coaching
//! prompt, parses the reply into an [`AnalysisReport`] and keeps a row per
//! request in `analysis_requests` so users can rate the result later.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use domains::{
    AnalysisModel, AnalysisOutcome, AnalysisReport, AnalysisRequestId, AnalysisRequestRepository,
    AnalysisStatus, DomainError, DomainResult, FeedbackUpdate, Frame, Identity, NewAnalysisRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const COACHING_PROMPT: &str = r#"
You are an expert esports coach and gameplay analyst. Analyze the following video frames from a gaming session.

Provide a detailed coaching report in the following JSON format:
{
  "gameplayMetrics": {
    "reactionTimeScore": "A rating like 9/10 or 'Elite'",
    "strategicDepth": "A rating or description like 'High'",
    "executionAccuracy": "A rating like '95%'"
  },
  "title": "A catchy title for the analysis session like 'Aggressive Push Analysis'",
  "summary": "A comprehensive summary of the gameplay shown.",
  "tacticalInsights": ["Insight 1", "Insight 2", "Insight 3"],
  "proSuggestions": ["Tip 1", "Tip 2"],
  "performanceOptimization": "Advice on hardware, settings, or mental state.",
  "keyMoments": [
    { "timestamp": "0:05", "description": "Key event description" },
    { "timestamp": "0:12", "description": "Key event description" }
  ]
}

Ensure the response is valid JSON and strictly follows this schema. Do not include markdown code blocks.
"#;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub request_id: AnalysisRequestId,
    pub report:     AnalysisReport,
}

/// Body of the feedback endpoint. Fields stay loosely typed; anything of the
/// wrong shape is ignored rather than rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackInput {
    #[serde(default)]
    pub request_id: Option<Value>,
    #[serde(default)]
    pub correct:    Option<Value>,
    #[serde(default)]
    pub helpful:    Option<Value>,
    #[serde(default)]
    pub tags:       Option<Value>,
}

impl FeedbackInput {
    /// Builds the column update; only well-typed fields are applied.
    pub fn to_update(&self) -> FeedbackUpdate {
        FeedbackUpdate {
            updated_at: Utc::now(),
            correct:    self.correct.as_ref().and_then(Value::as_bool),
            helpful:    self.helpful.as_ref().and_then(helpful_score),
            tags:       self.tags.as_ref().and_then(Value::as_array).map(|tags| {
                tags.iter().filter_map(Value::as_str).map(str::to_string).collect()
            }),
        }
    }

    fn request_id(&self) -> DomainResult<AnalysisRequestId> {
        let raw = match &self.request_id {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(v) => Some(v),
        }
        .ok_or_else(|| DomainError::Validation("Missing requestId".into()))?;

        raw.as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| DomainError::Validation("Invalid requestId".into()))
    }
}

/// A whole number from 1 to 5; JSON `4` and `4.0` are the same score.
fn helpful_score(value: &Value) -> Option<u8> {
    let score = value.as_f64()?;
    if score.fract() != 0.0 || !(1.0..=5.0).contains(&score) {
        return None;
    }
    Some(score as u8)
}

/// Strips ```json / ``` fences and parses what is left.
pub fn parse_report(raw: &str) -> Result<AnalysisReport, serde_json::Error> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    serde_json::from_str(cleaned.trim())
}

/// Accepts a bare base64 JPEG or a `data:image/jpeg;base64,` URL.
pub fn decode_frame(raw: &str) -> DomainResult<Frame> {
    let payload = match raw.split_once(',') {
        Some((head, rest)) if head.starts_with("data:") => rest,
        _ => raw,
    }
    .trim();

    let bytes = STANDARD
        .decode(payload)
        .map_err(|_| DomainError::Validation("Frame is not valid base64.".into()))?;
    match image::guess_format(&bytes) {
        Ok(image::ImageFormat::Jpeg) => Ok(Frame { base64_jpeg: payload.to_string() }),
        _ => Err(DomainError::Validation("Frame is not a JPEG image.".into())),
    }
}

#[derive(Clone)]
pub struct AnalysisService {
    requests:   Arc<dyn AnalysisRequestRepository>,
    model:      Option<Arc<dyn AnalysisModel>>,
    max_frames: usize,
}

impl AnalysisService {
    /// `model` is `None` when no API key is configured; `analyze` then fails.
    pub fn new(
        requests: Arc<dyn AnalysisRequestRepository>,
        model: Option<Arc<dyn AnalysisModel>>,
        max_frames: usize,
    ) -> Self {
        Self { requests, model, max_frames }
    }

    pub async fn analyze(&self, viewer: &Identity, frames: Vec<String>) -> DomainResult<AnalysisResponse> {
        if frames.is_empty() {
            return Err(DomainError::Validation("At least one frame is required.".into()));
        }
        if frames.len() > self.max_frames {
            return Err(DomainError::Validation(format!("At most {} frames are allowed.", self.max_frames)));
        }
        let frames = frames.iter().map(|f| decode_frame(f)).collect::<DomainResult<Vec<_>>>()?;
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| DomainError::Internal("API Key is missing.".into()))?;

        let request_id = self
            .requests
            .create(&NewAnalysisRequest {
                user_id:     viewer.user_id,
                status:      AnalysisStatus::Analyzing,
                frame_count: frames.len(),
            })
            .await
            .map_err(|e| {
                tracing::error!(user_id = %viewer.user_id, error = %e, "could not record analysis request");
                DomainError::from(e)
            })?;

        let result = match model.generate(COACHING_PROMPT, &frames).await {
            Ok(text) => parse_report(&text).map_err(|e| format!("Model reply is not valid JSON: {e}")),
            Err(e) => Err(e.message),
        };

        let outcome = match &result {
            Ok(report) => AnalysisOutcome {
                status: AnalysisStatus::Done,
                report: serde_json::to_value(report).ok(),
                error:  None,
            },
            Err(message) => AnalysisOutcome { status: AnalysisStatus::Failed, report: None, error: Some(message.clone()) },
        };
        if let Err(e) = self.requests.finish(request_id, &outcome).await {
            tracing::warn!(%request_id, error = %e, "could not record analysis outcome");
        }

        match result {
            Ok(report) => {
                tracing::info!(%request_id, frames = frames.len(), "analysis done");
                Ok(AnalysisResponse { request_id, report })
            }
            Err(message) => {
                tracing::error!(%request_id, error = %message, "analysis failed");
                Err(DomainError::Internal(message))
            }
        }
    }

    pub async fn record_feedback(&self, input: &FeedbackInput) -> DomainResult<()> {
        let id = input.request_id()?;
        self.requests.update_feedback(id, &input.to_update()).await.map_err(|e| {
            tracing::error!(request_id = %id, error = %e, "feedback update failed");
            DomainError::Internal("Failed to save feedback".into())
        })
    }
}
