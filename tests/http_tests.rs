// Integration tests for the HTTP API
//
// Requests go straight through the router; sessions use the scripted
// collaborators.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use speakloop::speech::{ScriptedGenerator, ScriptedRecognizer, ScriptedSynthesizer};
use speakloop::{create_router, AppState, Collaborators, SessionConfig};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> Router {
    test_app_with(ScriptedRecognizer::new(vec![]))
}

/// Router whose sessions all share `recognizer`
fn test_app_with(recognizer: ScriptedRecognizer) -> Router {
    let state = AppState::new(
        SessionConfig::default(),
        Arc::new(move |_conversation_id: &str| Collaborators {
            recognizer: Box::new(recognizer.clone()),
            generator: Arc::new(ScriptedGenerator::new(vec![Ok("Hola".to_string())])),
            synthesizer: Arc::new(ScriptedSynthesizer::new()),
            audio: None,
        }),
    );
    create_router(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_shadow_score() {
    let app = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/shadow/score",
        Some(json!({
            "target": "the quick brown fox",
            "spoken": "The quick brown cat"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accuracy"], json!(0.75));
}

#[tokio::test(start_paused = true)]
async fn test_conversation_lifecycle() {
    let app = test_app();

    let (status, body) = send(
        &app,
        "POST",
        "/conversations/start",
        Some(json!({ "conversation_id": "c1", "level": "B1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conversation_id"], "c1");
    assert_eq!(body["state"], "processing");

    let (status, _) = send(
        &app,
        "POST",
        "/conversations/start",
        Some(json!({ "conversation_id": "c1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, "GET", "/conversations/c1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conversation_id"], "c1");
    assert!(body["metrics"]["words_per_minute"].is_number());

    // Let the tutor's opening line be generated
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;

    let (status, body) = send(&app, "GET", "/conversations/c1/history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["role"], "assistant");
    assert_eq!(body[0]["text"], "Hola");

    let (status, body) = send(&app, "POST", "/conversations/end/c1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");
    assert_eq!(body["history_len"], 1);

    let (status, _) = send(&app, "GET", "/conversations/c1/status", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_status_reports_recognition_failure() {
    let recognizer = ScriptedRecognizer::new(vec![]);
    recognizer.fail_next_starts(3).await;
    let app = test_app_with(recognizer.clone());

    let (status, _) = send(
        &app,
        "POST",
        "/conversations/start",
        Some(json!({ "conversation_id": "c1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/conversations/c1/status", None).await;
    assert!(body["last_error"].is_null());

    tokio::time::sleep(std::time::Duration::from_secs(10)).await;

    let (status, body) = send(&app, "GET", "/conversations/c1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "listening");
    assert!(body["last_error"]
        .as_str()
        .unwrap()
        .contains("recognizer unavailable"));
    assert_eq!(recognizer.starts().await, 4);
}

#[tokio::test(start_paused = true)]
async fn test_stop_listening_keeps_conversation_open() {
    let recognizer = ScriptedRecognizer::new(vec![]);
    let app = test_app_with(recognizer.clone());

    send(
        &app,
        "POST",
        "/conversations/start",
        Some(json!({ "conversation_id": "c1" })),
    )
    .await;
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;

    let (status, body) = send(&app, "POST", "/conversations/c1/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");
    assert_eq!(recognizer.stops().await, 1);

    let (status, body) = send(&app, "GET", "/conversations/c1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");

    let (status, body) = send(&app, "POST", "/conversations/c1/listen", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "listening");
}

#[tokio::test]
async fn test_unknown_conversation() {
    let app = test_app();

    let (status, body) = send(&app, "POST", "/conversations/missing/listen", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));

    let (status, _) = send(&app, "POST", "/conversations/end/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/conversations/missing/stop", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
