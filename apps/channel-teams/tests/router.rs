mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tb_channel_teams::{AppState, ChannelConfig, router};
use tower::ServiceExt;

use support::{BOT_ID, Failure, RecordingAdapter, bot_added, default_harness, harness};

fn post(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn inbound_activity_is_accepted_and_published() {
    let h = default_harness();
    let app = router(AppState::new(h.registry.clone()));

    let activity = json!({
        "type": "message",
        "serviceUrl": "https://smba.trafficmanager.net/emea/",
        "from": { "id": "29:user" },
        "recipient": { "id": "28:bot" },
        "conversation": { "id": "a:thread-1" },
        "text": "hello"
    });
    let response = app
        .oneshot(post(&format!("/api/teams/{BOT_ID}/messages"), activity.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.bus.len().await, 1);
}

#[tokio::test]
async fn unknown_bot_is_not_found() {
    let h = default_harness();
    let app = router(AppState::new(h.registry.clone()));

    let response = app
        .oneshot(post("/api/teams/missing/messages", json!({ "type": "message" }).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_activity_is_bad_request() {
    let h = default_harness();
    let app = router(AppState::new(h.registry.clone()));

    let response = app
        .oneshot(post(&format!("/api/teams/{BOT_ID}/messages"), "{\"text\": 5".into()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.bus.len().await, 0);
}

#[tokio::test]
async fn healthz_reports_ok() {
    let h = default_harness();
    let app = router(AppState::new(h.registry.clone()));

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn failed_welcome_delivery_is_bad_gateway() {
    let mut config = ChannelConfig::new(BOT_ID);
    config.proactive_messages = [("en".to_string(), "Hello!".to_string())].into();
    let h = harness(config, RecordingAdapter::failing(Failure::Timeout));
    let app = router(AppState::new(h.registry.clone()));

    let body = serde_json::to_string(&bot_added("en-US")).unwrap();
    let response = app
        .oneshot(post(&format!("/api/teams/{BOT_ID}/messages"), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(h.bus.len().await, 0);
}
