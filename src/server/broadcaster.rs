//! Broadcaster socket task
//!
//! Reads binary chunks off the broadcaster's WebSocket and feeds them to the
//! session, while relaying control messages (`listener-count`,
//! `backpressure`, `drain`) back out. The socket closing, erroring, or idling
//! past the configured timeout tears the whole session down.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::SessionStore;
use crate::session::{Session, TeardownReason};

pub(crate) async fn serve(socket: WebSocket, store: Arc<SessionStore>, session: Arc<Session>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (ctl_tx, mut ctl_rx) = mpsc::unbounded_channel();

    if let Err(err) = session.attach_broadcaster(ctl_tx).await {
        tracing::debug!(session = %session.id(), %err, "broadcaster rejected");
        let frame = ServerMessage::Error {
            message: err.to_string(),
        };
        let _ = ws_tx.send(Message::Text(frame.to_json())).await;
        let _ = ws_tx.close().await;
        return;
    }

    let idle_timeout = store.config().broadcaster_idle_timeout;

    loop {
        tokio::select! {
            biased;

            ctl = ctl_rx.recv() => match ctl {
                Some(msg) => {
                    if ws_tx.send(Message::Text(msg.to_json())).await.is_err() {
                        break;
                    }
                }
                // Teardown dropped our handle; the session is already ending
                None => {
                    let _ = ws_tx.close().await;
                    return;
                }
            },

            incoming = tokio::time::timeout(idle_timeout, ws_rx.next()) => match incoming {
                Err(_) => {
                    tracing::info!(session = %session.id(), "broadcaster idle timeout");
                    break;
                }
                Ok(Some(Ok(Message::Binary(chunk)))) => {
                    session.forward(Bytes::from(chunk)).await;
                }
                Ok(Some(Ok(Message::Text(text)))) => {
                    match ClientMessage::parse(&text) {
                        Some(msg) => {
                            tracing::debug!(session = %session.id(), kind = %msg.kind, "ignoring control message")
                        }
                        None => {
                            tracing::debug!(session = %session.id(), "ignoring malformed text frame")
                        }
                    }
                }
                Ok(Some(Ok(Message::Ping(data)))) => {
                    let _ = ws_tx.send(Message::Pong(data)).await;
                }
                Ok(Some(Ok(Message::Pong(_)))) => {}
                Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                    tracing::info!(session = %session.id(), "broadcaster disconnected");
                    break;
                }
                Ok(Some(Err(e))) => {
                    tracing::debug!(session = %session.id(), error = %e, "broadcaster socket error");
                    break;
                }
            },
        }
    }

    store
        .end_session(session.id(), TeardownReason::BroadcasterDisconnected)
        .await;
}
