//! WebSocket upgrade gate
//!
//! Sole admission control for the relay. Peers connect to
//! `ws://host/?sid=<id>&role=<broadcaster|listener>[&t=<token>]`; anything
//! that fails admission is refused with an empty response before the upgrade
//! completes, so a probing client learns nothing about session existence.

use std::sync::Arc;

use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::registry::SessionStore;

use super::{broadcaster, listener};

/// Query parameters of an upgrade request
#[derive(Debug, Deserialize)]
pub struct UpgradeParams {
    sid: Option<String>,
    role: Option<String>,
    t: Option<String>,
}

/// Handle `GET /` upgrade requests
pub async fn upgrade(
    State(store): State<Arc<SessionStore>>,
    Query(params): Query<UpgradeParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let (Some(sid), Some(role)) = (params.sid, params.role) else {
        return refuse(StatusCode::BAD_REQUEST, "missing sid or role");
    };

    let Some(session) = store.get(&sid).await else {
        return refuse(StatusCode::FORBIDDEN, "unknown session");
    };
    if !session.is_active() {
        return refuse(StatusCode::FORBIDDEN, "session not live");
    }

    let ws = ws.max_message_size(store.config().max_frame_bytes);

    match role.as_str() {
        "broadcaster" => ws.on_upgrade(move |socket| broadcaster::serve(socket, store, session)),
        "listener" => {
            if params.t.as_deref() != Some(session.token()) {
                return refuse(StatusCode::FORBIDDEN, "bad token");
            }
            // Pre-check; the authoritative capacity check re-runs inside
            // attach_listener under the session lock
            if session.listener_count().await >= store.config().max_listeners {
                return refuse(StatusCode::FORBIDDEN, "listener capacity reached");
            }
            ws.on_upgrade(move |socket| listener::serve(socket, store, session))
        }
        _ => refuse(StatusCode::BAD_REQUEST, "unknown role"),
    }
}

fn refuse(status: StatusCode, reason: &'static str) -> Response {
    tracing::debug!(reason, "upgrade refused");
    status.into_response()
}
