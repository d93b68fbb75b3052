//! Integration tests for the HTTP endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. Peer addresses are injected as
//! `ConnectInfo` extensions, which is what the real listener does.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use gsi_core::{Pipeline, TokenPolicy};
use gsi_server::router::build_router;
use gsi_server::state::AppState;
use serde_json::{Value, json};
use tower::ServiceExt;

fn make_state(tokens: TokenPolicy) -> Arc<AppState> {
    let pipeline = Pipeline::from_parts(tokens, ["player", "hero", "map", "provider"]);
    Arc::new(AppState::new(Arc::new(pipeline)))
}

fn post_snapshot(peer: &str, body: &Value) -> Request<Body> {
    let addr: SocketAddr = peer.parse().unwrap();
    Request::post("/")
        .header("content-type", "application/json")
        .extension(ConnectInfo(addr))
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_ingest_creates_client() {
    let state = make_state(TokenPolicy::Open);
    let router = build_router(Arc::clone(&state));

    let response = router
        .oneshot(post_snapshot(
            "127.0.0.1:50000",
            &json!({"hero": {"level": 1, "name": "abc"}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["new_client"], true);
    assert_eq!(json["changes"], 0);

    let session = state.pipeline.registry().get("127.0.0.1").unwrap();
    assert_eq!(session.get("hero:name"), Some(json!("abc")));
}

#[tokio::test]
async fn test_ingest_reports_changes_and_reuses_session_across_ports() {
    let state = make_state(TokenPolicy::Open);
    let router = build_router(Arc::clone(&state));

    let levels = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&levels);
    state.pipeline.on_new_client(move |client| {
        let counter = Arc::clone(&counter);
        client.on("hero:level", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    });

    let first = router
        .clone()
        .oneshot(post_snapshot(
            "127.0.0.1:50000",
            &json!({"hero": {"level": 1}}),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = router
        .oneshot(post_snapshot(
            "127.0.0.1:50001",
            &json!({"hero": {"level": 2}, "previously": {"hero": {"level": 1}}}),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let json = body_to_json(second.into_body()).await;
    assert_eq!(json["new_client"], false);
    assert_eq!(json["changes"], 1);

    assert_eq!(state.pipeline.registry().len(), 1);
    assert_eq!(levels.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ingest_rejects_bad_token() {
    let state = make_state(TokenPolicy::Single("secret".to_owned()));
    let router = build_router(Arc::clone(&state));

    let response = router
        .oneshot(post_snapshot(
            "127.0.0.1:50000",
            &json!({"auth": {"token": "wrong"}, "hero": {"level": 1}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 401);
    assert!(state.pipeline.registry().is_empty());
}

#[tokio::test]
async fn test_ingest_accepts_good_token() {
    let state = make_state(TokenPolicy::Single("secret".to_owned()));
    let router = build_router(state);

    let response = router
        .oneshot(post_snapshot(
            "127.0.0.1:50000",
            &json!({"auth": {"token": "secret"}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_ingest_rejects_non_object_body() {
    let state = make_state(TokenPolicy::Open);
    let router = build_router(Arc::clone(&state));

    let response = router
        .oneshot(post_snapshot("127.0.0.1:50000", &json!([1, 2, 3])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(state.pipeline.registry().is_empty());
}

#[tokio::test]
async fn test_ingest_rejects_invalid_json() {
    let state = make_state(TokenPolicy::Open);
    let router = build_router(state);

    let addr: SocketAddr = "127.0.0.1:50000".parse().unwrap();
    let request = Request::post("/")
        .extension(ConnectInfo(addr))
        .body(Body::from("{not json"))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ingest_without_peer_info_uses_unknown_address() {
    let state = make_state(TokenPolicy::Open);
    let router = build_router(Arc::clone(&state));

    let request = Request::post("/")
        .body(Body::from(r#"{"provider": {"appid": 570}}"#))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.pipeline.registry().get("unknown").is_some());
}

#[tokio::test]
async fn test_list_clients() {
    let state = make_state(TokenPolicy::Open);
    state
        .pipeline
        .ingest("10.0.0.1", json!({"provider": {"appid": 570}}))
        .unwrap();
    state
        .pipeline
        .ingest("10.0.0.2", json!({"map": {"name": "start"}}))
        .unwrap();

    let router = build_router(state);
    let response = router
        .oneshot(Request::get("/api/clients").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["clients"][0]["address"], "10.0.0.1");
    assert_eq!(json["clients"][1]["address"], "10.0.0.2");
    assert_eq!(json["clients"][0]["snapshots"], 1);
}

#[tokio::test]
async fn test_get_client_by_address() {
    let state = make_state(TokenPolicy::Open);
    state
        .pipeline
        .ingest("10.0.0.1", json!({"hero": {"level": 4}}))
        .unwrap();

    let router = build_router(state);
    let response = router
        .oneshot(
            Request::get("/api/clients/10.0.0.1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["client"]["address"], "10.0.0.1");
    assert_eq!(json["state"]["hero"]["level"], 4);
}

#[tokio::test]
async fn test_get_client_omits_auth_token() {
    let state = make_state(TokenPolicy::Single("secret".to_owned()));
    let router = build_router(Arc::clone(&state));

    let ingest = router
        .clone()
        .oneshot(post_snapshot(
            "10.0.0.1:41000",
            &json!({"auth": {"token": "secret"}, "hero": {"level": 3}}),
        ))
        .await
        .unwrap();
    assert_eq!(ingest.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(
            Request::get("/api/clients/10.0.0.1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!text.contains("secret"));

    let json: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["state"]["hero"]["level"], 3);
    assert!(json["state"].get("auth").is_none());

    let listing = router
        .oneshot(Request::get("/api/clients").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_to_json(listing.into_body()).await;
    assert_eq!(json["clients"][0]["sections"], json!(["hero"]));
}

#[tokio::test]
async fn test_get_client_not_found() {
    let state = make_state(TokenPolicy::Open);
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::get("/api/clients/10.9.9.9")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_health() {
    let state = make_state(TokenPolicy::Open);
    state.pipeline.ingest("10.0.0.1", json!({})).unwrap();

    let router = build_router(state);
    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["clients"], 1);
}

#[tokio::test]
async fn test_index_returns_html() {
    let state = make_state(TokenPolicy::Open);
    state.pipeline.ingest("10.0.0.1", json!({})).unwrap();

    let router = build_router(state);
    let response = router
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    assert!(content_type.contains("text/html"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("10.0.0.1"));
}
