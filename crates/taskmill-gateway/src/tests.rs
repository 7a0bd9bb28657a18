// HTTP surface tests: the real router over an in-memory store, driven with
// tower's oneshot so no listener is needed.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use rusqlite::Connection;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::app::{build_router, AppState};
use taskmill_store::TaskStore;

fn test_app() -> (Router, Arc<AppState>) {
    let store = TaskStore::new(Connection::open_in_memory().unwrap()).unwrap();
    let state = Arc::new(AppState::new(store));
    (build_router(Arc::clone(&state)), state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_schedule(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/schedule")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let (router, _) = test_app();
    let response = router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn schedule_then_status_round_trip() {
    let (router, _) = test_app();

    let request = post_schedule(&json!({
        "command": "pwd",
        "scheduled_at": Utc::now(),
    }));
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["command"], "pwd");
    let task_id = body["task_id"].as_str().unwrap().to_string();
    assert!(!task_id.is_empty());

    let response = router
        .oneshot(get(&format!("/status?task_id={task_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status = body_json(response).await;
    assert_eq!(status["task_id"], task_id.as_str());
    assert_eq!(status["state"], "scheduled");
    assert!(status.get("scheduled_at").is_some());
    // Unset timestamps are omitted, not serialised as sentinels.
    assert!(status.get("picked_at").is_none());
    assert!(status.get("completed_at").is_none());
    assert!(status.get("failed_at").is_none());
}

#[tokio::test]
async fn schedule_rejects_empty_command() {
    let (router, _) = test_app();
    let request = post_schedule(&json!({"command": "  ", "scheduled_at": Utc::now()}));
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn schedule_rejects_missing_command() {
    let (router, _) = test_app();
    let request = post_schedule(&json!({"scheduled_at": Utc::now()}));
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn schedule_rejects_unparseable_timestamp() {
    let (router, _) = test_app();
    let request = post_schedule(&json!({"command": "pwd", "scheduled_at": "tomorrow-ish"}));
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn schedule_rejects_malformed_json() {
    let (router, _) = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/schedule")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_requires_task_id() {
    let (router, _) = test_app();
    let response = router.oneshot(get("/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_rejects_malformed_id() {
    let (router, _) = test_app();
    let response = router.oneshot(get("/status?task_id=not-a-uuid")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_unknown_id_is_404() {
    let (router, _) = test_app();
    let response = router
        .oneshot(get("/status?task_id=00000000-0000-0000-0000-000000000001"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_shows_terminal_state_with_reason() {
    let (router, state) = test_app();

    // Drive a task to Failed through the store, then read it back over HTTP.
    let now = Utc::now();
    let task = state.store.insert("exit 1", now).unwrap();
    state.store.try_claim(&task.id, "worker-test", now).unwrap();
    state.store.record_started(&task.id, now).unwrap();
    state.store.record_failed(&task.id, now, "exit status: 1").unwrap();

    let response = router
        .oneshot(get(&format!("/status?task_id={}", task.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status = body_json(response).await;
    assert_eq!(status["state"], "failed");
    assert!(status.get("failed_at").is_some());
    assert!(status.get("completed_at").is_none());
    assert_eq!(status["error"], "exit status: 1");
}

#[tokio::test]
async fn schedule_only_accepts_post() {
    let (router, _) = test_app();
    let response = router.oneshot(get("/schedule")).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
