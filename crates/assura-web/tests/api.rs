//! HTTP surface tests through the full router, in-memory gateway, canned
//! extraction backend, inline scheduler.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use assura_analysis::AnalyzerRegistry;
use assura_llm::{IncidentExtractor, LlmBackend, LlmError, LlmRequest, LlmResponse};
use assura_pipeline::{
    ConfidenceFloorPolicy, CoveredTypeList, EscalationPolicy, IncidentPipeline, InlineScheduler,
};
use assura_security::EncryptionGate;
use assura_store::MemoryStore;
use assura_web::router::build_router;
use assura_web::state::AppState;

const BOUNDARY: &str = "X-ASSURA-TEST-BOUNDARY";

struct CannedBackend;

#[async_trait]
impl LlmBackend for CannedBackend {
    async fn complete(&self, _req: LlmRequest) -> Result<LlmResponse, LlmError> {
        Ok(LlmResponse {
            content: r#"{
                "incident_type": "car_accident",
                "severity": "medium",
                "date": "2024-01-15",
                "location": "123 Main Street",
                "people_involved": [],
                "documents_detected": [],
                "confidence": 0.85,
                "needs_human": false
            }"#
            .to_string(),
            model: "canned".to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
        })
    }

    fn model_id(&self) -> &str {
        "canned"
    }

    fn is_local(&self) -> bool {
        true
    }
}

fn test_app() -> Router {
    let store = Arc::new(MemoryStore::new());
    let extractor = Arc::new(IncidentExtractor::new(
        Arc::new(CannedBackend),
        Duration::from_secs(1),
    ));
    let registry = Arc::new(AnalyzerRegistry::resolve(true, false, false));
    let gate = EncryptionGate::disabled();
    let pipeline = Arc::new(IncidentPipeline::new(
        store.clone(),
        extractor,
        registry,
        gate.clone(),
        EscalationPolicy::default(),
        Arc::new(CoveredTypeList::new(vec!["car_accident".to_string()])),
        Arc::new(ConfidenceFloorPolicy::default()),
    ));
    let scheduler = Arc::new(InlineScheduler::new(pipeline.clone()));

    build_router(AppState {
        pipeline,
        scheduler,
        store,
        gate,
        default_owner: "test-user-123".to_string(),
    })
}

fn multipart_body(story: &str, file: Option<(&str, &str, &[u8])>) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"story_text\"\r\n\r\n{story}\r\n"
        )
        .as_bytes(),
    );
    if let Some((filename, content_type, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (
        format!("multipart/form-data; boundary={BOUNDARY}"),
        body,
    )
}

async fn post_incident(app: &Router, story: &str, file: Option<(&str, &str, &[u8])>) -> (StatusCode, serde_json::Value) {
    let (content_type, body) = multipart_body(story, file);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/incident")
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn get_json(app: &Router, uri: &str, bearer: Option<&str>) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, json) = get_json(&app, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "operational");
}

#[tokio::test]
async fn test_create_incident_returns_populated_extraction() {
    let app = test_app();
    let (status, json) = post_incident(&app, "My car was hit in a parking lot", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(json["incident_id"].is_string());
    assert_eq!(json["status"], "pending");
    assert_eq!(json["extracted_data"]["incident_type"], "car_accident");
    assert_eq!(json["extracted_data"]["confidence"], 0.85);
}

#[tokio::test]
async fn test_create_incident_empty_story_is_rejected() {
    let app = test_app();
    let (status, json) = post_incident(&app, "", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("story_text"));
}

#[tokio::test]
async fn test_create_with_unsupported_attachment_still_succeeds() {
    let app = test_app();
    let (status, json) = post_incident(
        &app,
        "Crash with a photo attached",
        Some(("crash.jpg", "image/jpeg", &[0xff, 0xd8, 0xff, 0xe0])),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let id = json["incident_id"].as_str().unwrap().to_string();
    let (status, incident) = get_json(&app, &format!("/incident/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(incident["attachments"][0]["analysis"]["outcome"], "unavailable");
}

#[tokio::test]
async fn test_get_incident_includes_timeline_after_processing() {
    let app = test_app();
    let (_, created) = post_incident(&app, "My car was hit on January 15th at 123 Main Street", None).await;
    let id = created["incident_id"].as_str().unwrap().to_string();

    // inline scheduler has already processed by the time POST returned
    let (status, incident) = get_json(&app, &format!("/incident/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(incident["status"], "verified");

    let kinds: Vec<&str> = incident["timeline"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "incident_created",
            "processing_started",
            "coverage_verified",
            "processing_completed"
        ]
    );
}

#[tokio::test]
async fn test_get_unknown_incident_is_404() {
    let app = test_app();
    let (status, _) = get_json(&app, &format!("/incident/{}", uuid::Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_foreign_owner_sees_404() {
    let app = test_app();
    let (_, created) = post_incident(&app, "A private story", None).await;
    let id = created["incident_id"].as_str().unwrap().to_string();

    let (status, _) = get_json(&app, &format!("/incident/{id}"), Some("someone-else")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_close_and_delete() {
    let app = test_app();
    let (_, created) = post_incident(&app, "Verified then closed", None).await;
    let id = created["incident_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/incident/{id}/close"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, incident) = get_json(&app, &format!("/incident/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(incident["status"], "closed");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/incident/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = get_json(&app, &format!("/incident/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
