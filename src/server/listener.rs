//! Listener socket task
//!
//! Bootstraps a joining listener with its welcome messages and the cached
//! init segment, then pumps live frames from the session's fan-out channel
//! into the socket. A listener that repeatedly overflows its queue is
//! disconnected as a slow consumer; everyone else is unaffected.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};

use crate::protocol::{ServerMessage, SLOW_CONSUMER_CLOSE_REASON};
use crate::registry::SessionStore;
use crate::relay::RelayFrame;
use crate::session::Session;

pub(crate) async fn serve(socket: WebSocket, store: Arc<SessionStore>, session: Arc<Session>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (ctl_tx, mut ctl_rx) = mpsc::unbounded_channel();

    let attachment = match session.attach_listener(ctl_tx).await {
        Ok(attachment) => attachment,
        Err(err) => {
            tracing::debug!(session = %session.id(), %err, "listener rejected");
            let _ = ws_tx.close().await;
            return;
        }
    };
    let id = attachment.id;
    let mut frames = attachment.frames;

    // Bootstrap: welcome messages, then the init segment, before any live
    // chunk from the fan-out channel
    for msg in attachment.welcome {
        if ws_tx.send(Message::Text(msg.to_json())).await.is_err() {
            session.detach_listener(id).await;
            return;
        }
    }
    if let Some(init) = attachment.init_segment {
        if send_init_segment(&mut ws_tx, &init).await.is_err() {
            session.detach_listener(id).await;
            return;
        }
    }

    let strike_limit = store.config().slow_consumer_strikes;
    let strike_window = store.config().slow_consumer_window;
    let mut strikes = 0u32;
    let mut last_overflow: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;

            ctl = ctl_rx.recv() => match ctl {
                Some(msg @ ServerMessage::SessionEnded { .. }) => {
                    // Final message; the socket closes right after
                    let _ = ws_tx.send(Message::Text(msg.to_json())).await;
                    let _ = ws_tx.close().await;
                    return;
                }
                Some(msg) => {
                    if ws_tx.send(Message::Text(msg.to_json())).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = ws_tx.close().await;
                    return;
                }
            },

            frame = frames.recv() => match frame {
                Ok(RelayFrame::Init(chunk)) => {
                    if send_init_segment(&mut ws_tx, &chunk).await.is_err() {
                        break;
                    }
                }
                Ok(RelayFrame::Chunk(chunk)) => {
                    if ws_tx.send(Message::Binary(chunk.to_vec())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    session.hub().record_dropped(missed).await;

                    let now = Instant::now();
                    strikes = next_strike_count(strikes, last_overflow, now, strike_window);
                    last_overflow = Some(now);

                    tracing::debug!(
                        session = %session.id(),
                        listener = id,
                        missed,
                        strikes,
                        "listener lagged; oldest frames dropped"
                    );

                    if strikes >= strike_limit {
                        tracing::warn!(
                            session = %session.id(),
                            listener = id,
                            "disconnecting slow consumer"
                        );
                        let _ = ws_tx
                            .send(Message::Close(Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: SLOW_CONSUMER_CLOSE_REASON.into(),
                            })))
                            .await;
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Ping(data))) => {
                    let _ = ws_tx.send(Message::Pong(data)).await;
                }
                Some(Err(_)) => break,
                // Listeners have nothing to say; ignore text/binary
                Some(Ok(_)) => {}
            },
        }
    }

    session.detach_listener(id).await;
}

async fn send_init_segment(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    chunk: &Bytes,
) -> Result<(), axum::Error> {
    let announce = ServerMessage::InitSegment { size: chunk.len() };
    ws_tx.send(Message::Text(announce.to_json())).await?;
    ws_tx.send(Message::Binary(chunk.to_vec())).await
}

/// Overflows inside the sliding window count up; an isolated overflow resets
/// the streak to one
fn next_strike_count(
    strikes: u32,
    last_overflow: Option<Instant>,
    now: Instant,
    window: std::time::Duration,
) -> u32 {
    match last_overflow {
        Some(at) if now.duration_since(at) <= window => strikes + 1,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_strikes_accumulate_within_window() {
        let window = Duration::from_secs(4);
        let start = Instant::now();

        let first = next_strike_count(0, None, start, window);
        assert_eq!(first, 1);

        let second = next_strike_count(first, Some(start), start + Duration::from_secs(1), window);
        assert_eq!(second, 2);
    }

    #[test]
    fn test_isolated_overflow_resets_streak() {
        let window = Duration::from_secs(4);
        let start = Instant::now();

        let strikes = next_strike_count(2, Some(start), start + Duration::from_secs(10), window);
        assert_eq!(strikes, 1);
    }
}
