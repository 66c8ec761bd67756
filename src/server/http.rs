//! HTTP API surface
//!
//! Session CRUD and recording download. The create endpoint is the only way
//! a session comes into existence; the stop endpoint is one of the four
//! teardown triggers. Recording downloads accept a bare basename only.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tokio_util::io::ReaderStream;

use crate::registry::SessionStore;
use crate::session::TeardownReason;

/// `POST /api/session/create`
pub async fn create_session(State(store): State<Arc<SessionStore>>) -> Response {
    match store.create().await {
        Ok(session) => Json(json!({
            "sessionId": session.id(),
            "token": session.token(),
            "listenUrl": format!("/listener.html?sid={}&t={}", session.id(), session.token()),
            "expiresAt": session.expires_at_ms(),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "session creation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "session creation failed"})),
            )
                .into_response()
        }
    }
}

/// `POST /api/session/:id/stop`
pub async fn stop_session(
    State(store): State<Arc<SessionStore>>,
    Path(id): Path<String>,
) -> Response {
    let Some(session) = store.get(&id).await else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let recording = session.recording_file_name();
    store
        .end_session(&id, TeardownReason::StoppedByBroadcaster)
        .await;

    Json(json!({"ok": true, "recording": recording})).into_response()
}

/// `GET /api/recording/:file`
pub async fn download_recording(
    State(store): State<Arc<SessionStore>>,
    Path(file): Path<String>,
) -> Response {
    if !is_plain_basename(&file) {
        tracing::warn!(file, "rejected recording path");
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = store.config().recordings_dir.join(&file);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return StatusCode::NOT_FOUND.into_response(),
    }

    match tokio::fs::File::open(&path).await {
        Ok(file) => {
            let body = Body::from_stream(ReaderStream::new(file));
            ([(header::CONTENT_TYPE, "video/webm")], body).into_response()
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// `GET /api/status`
pub async fn status(State(store): State<Arc<SessionStore>>) -> Json<serde_json::Value> {
    Json(json!({"sessions": store.session_count().await}))
}

fn is_plain_basename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}
