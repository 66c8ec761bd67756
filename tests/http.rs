//! HTTP surface tests
//!
//! Exercises the JSON API against the assembled router without binding a
//! port.

use std::path::PathBuf;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::util::ServiceExt;

use livecast::{RelayServer, ServerConfig};

async fn test_server() -> (RelayServer, PathBuf) {
    let dir = std::env::temp_dir().join(format!(
        "livecast-http-{}-{:x}",
        std::process::id(),
        rand::random::<u32>()
    ));
    let config = ServerConfig::default()
        .recordings_dir(&dir)
        .session_ttl(Duration::from_secs(60));
    let server = RelayServer::new(config).await.unwrap();
    (server, dir)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn create_returns_session_identity() {
    let (server, dir) = test_server().await;
    let app = server.router();

    let response = app.oneshot(post("/api/session/create")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let sid = body["sessionId"].as_str().unwrap();
    let token = body["token"].as_str().unwrap();
    assert_eq!(sid.len(), 8);
    assert_eq!(token.len(), 32);
    assert_eq!(
        body["listenUrl"],
        format!("/listener.html?sid={}&t={}", sid, token)
    );
    assert!(body["expiresAt"].as_u64().unwrap() > 0);

    assert_eq!(server.store().session_count().await, 1);

    server.store().shutdown_all().await;
    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn stop_tears_down_and_names_recording() {
    let (server, dir) = test_server().await;

    let session = server.store().create().await.unwrap();
    let sid = session.id().to_string();
    let recording = session.recording_file_name();

    let response = server
        .router()
        .oneshot(post(&format!("/api/session/{}/stop", sid)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["recording"], recording);
    assert_eq!(server.store().session_count().await, 0);

    // Stopped without a broadcaster: the file exists, closed and empty
    let contents = tokio::fs::read(dir.join(&recording)).await.unwrap();
    assert!(contents.is_empty());

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn stop_unknown_session_is_404() {
    let (server, dir) = test_server().await;

    let response = server
        .router()
        .oneshot(post("/api/session/deadbeef/stop"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn recording_download_streams_bytes() {
    let (server, dir) = test_server().await;

    let name = "broadcast-a1b2c3d4-1700000000000.webm";
    tokio::fs::write(dir.join(name), b"opus-bytes").await.unwrap();

    let response = server
        .router()
        .oneshot(get(&format!("/api/recording/{}", name)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "video/webm"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), b"opus-bytes");

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn recording_download_rejects_traversal_and_missing() {
    let (server, dir) = test_server().await;

    let response = server
        .router()
        .oneshot(get("/api/recording/..%2F..%2Fetc%2Fpasswd"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = server
        .router()
        .oneshot(get("/api/recording/nope.webm"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn status_reports_session_count() {
    let (server, dir) = test_server().await;
    server.store().create().await.unwrap();

    let response = server.router().oneshot(get("/api/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["sessions"], 1);

    server.store().shutdown_all().await;
    let _ = tokio::fs::remove_dir_all(&dir).await;
}
