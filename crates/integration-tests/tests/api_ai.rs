mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{app, app_with_model, jpeg_frame, CannedModel};
use domains::AnalysisStatus;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn analysis_returns_the_report_and_stores_a_done_request() {
    let app = app();
    let (user_id, token) = app.register("analyst").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/ai/analyze",
            Some(&token),
            json!({ "frames": [jpeg_frame(), format!("data:image/jpeg;base64,{}", jpeg_frame())] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ok"], true);
    assert_eq!(body["report"]["title"], "Aggressive Push Analysis");
    assert_eq!(body["report"]["gameplayMetrics"]["reactionTimeScore"], "9/10");
    assert_eq!(body["report"]["keyMoments"][0]["timestamp"], "0:05");

    let request_id: Uuid = body["requestId"].as_str().unwrap().parse().unwrap();
    let record = app.store.analysis_request(request_id).expect("request row");
    assert_eq!(record.user_id, user_id);
    assert_eq!(record.status, AnalysisStatus::Done);
    assert_eq!(record.frame_count, 2);
    assert_eq!(record.report.as_ref().unwrap()["title"], "Aggressive Push Analysis");
    assert!(record.error.is_none());
}

#[tokio::test]
async fn feedback_updates_the_request_row() {
    let app = app();
    let (_, token) = app.register("grader").await;
    let (_, body) = app
        .json(Method::POST, "/api/ai/analyze", Some(&token), json!({ "frames": [jpeg_frame()] }))
        .await;
    let request_id = body["requestId"].as_str().unwrap().to_string();

    let (status, body) = app
        .json(
            Method::POST,
            "/api/ai/feedback",
            None,
            json!({ "requestId": request_id, "correct": true, "helpful": 4, "tags": ["accurate", 7, "clear"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let record = app.store.analysis_request(request_id.parse().unwrap()).unwrap();
    assert_eq!(record.feedback_correct, Some(true));
    assert_eq!(record.feedback_helpful, Some(4));
    assert_eq!(record.feedback_tags, Some(vec!["accurate".to_string(), "clear".to_string()]));

    // Badly typed fields are dropped, earlier values stay.
    let (status, _) = app
        .json(
            Method::POST,
            "/api/ai/feedback",
            None,
            json!({ "requestId": request_id, "correct": "yes", "helpful": 9 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let record = app.store.analysis_request(request_id.parse().unwrap()).unwrap();
    assert_eq!(record.feedback_correct, Some(true));
    assert_eq!(record.feedback_helpful, Some(4));
}

#[tokio::test]
async fn feedback_needs_a_valid_request_id() {
    let app = app();

    let (status, body) = app.json(Method::POST, "/api/ai/feedback", None, json!({ "correct": true })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing requestId");

    let (status, body) = app.json(Method::POST, "/api/ai/feedback", None, json!({ "requestId": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing requestId");

    let (status, body) = app.json(Method::POST, "/api/ai/feedback", None, json!({ "requestId": "abc" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid requestId");
}

#[tokio::test]
async fn analysis_rejects_bad_frames_before_calling_the_model() {
    let app = app();
    let (_, token) = app.register("framer").await;

    let png = base64_of(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR");
    for frames in [json!([]), json!(["%%%"]), json!([png])] {
        let (status, body) = app
            .json(Method::POST, "/api/ai/analyze", Some(&token), json!({ "frames": frames }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {frames}: {body}");
    }

    let too_many: Vec<String> = (0..17).map(|_| jpeg_frame()).collect();
    let (status, _) = app
        .json(Method::POST, "/api/ai/analyze", Some(&token), json!({ "frames": too_many }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn analysis_requires_sign_in() {
    let app = app();
    let (status, _) = app.json(Method::POST, "/api/ai/analyze", None, json!({ "frames": [jpeg_frame()] })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn model_failure_marks_the_request_failed() {
    let app = app_with_model(Some(Arc::new(CannedModel(Err("quota exceeded".to_string())))));
    let (user_id, token) = app.register("unlucky").await;

    let (status, body) = app
        .json(Method::POST, "/api/ai/analyze", Some(&token), json!({ "frames": [jpeg_frame()] }))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["ok"], false);
    assert_eq!(body["message"], "quota exceeded");

    let record = app
        .store
        .analysis_requests_for(user_id)
        .into_iter()
        .next()
        .expect("request row");
    assert_eq!(record.status, AnalysisStatus::Failed);
    assert_eq!(record.error.as_deref(), Some("quota exceeded"));
}

#[tokio::test]
async fn unparseable_reply_is_a_failure() {
    let app = app_with_model(Some(Arc::new(CannedModel(Ok("I think you played well!".to_string())))));
    let (user_id, token) = app.register("verbose").await;

    let (status, _) = app
        .json(Method::POST, "/api/ai/analyze", Some(&token), json!({ "frames": [jpeg_frame()] }))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let record = app.store.analysis_requests_for(user_id).into_iter().next().unwrap();
    assert_eq!(record.status, AnalysisStatus::Failed);
}

#[tokio::test]
async fn missing_model_is_a_server_error_without_a_request_row() {
    let app = app_with_model(None);
    let (user_id, token) = app.register("keyless").await;

    let (status, body) = app
        .json(Method::POST, "/api/ai/analyze", Some(&token), json!({ "frames": [jpeg_frame()] }))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "API Key is missing.");
    assert!(app.store.analysis_requests_for(user_id).is_empty());
}

#[tokio::test]
async fn metrics_count_requests_signups_and_analyses() {
    let app = app();
    let (_, token) = app.register("measured").await;
    app.signup("measured", "again@kashaaf.test").await;
    app.json(Method::POST, "/api/ai/analyze", Some(&token), json!({ "frames": [jpeg_frame()] })).await;

    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let (status, text) = app.send_raw(req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains(r#"kashaaf_signups_total{outcome="Success"} 1"#), "{text}");
    assert!(text.contains(r#"kashaaf_signups_total{outcome="Failure"} 1"#), "{text}");
    assert!(text.contains(r#"kashaaf_analyses_total{outcome="Success"} 1"#), "{text}");
    assert!(text.contains(r#"route="/api/ai/analyze",status="200"} 1"#), "{text}");
    assert!(text.contains(r#"route="/api/signup",status="409"} 1"#), "{text}");
}

fn base64_of(bytes: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
