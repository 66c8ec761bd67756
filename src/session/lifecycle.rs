//! Session teardown
//!
//! State machine:
//!
//! ```text
//!   CREATED ──(broadcaster attach)──► LIVE ──(any teardown trigger)──► ENDED
//!      │                                                                ▲
//!      └──(stop / expiry with no broadcaster / shutdown)────────────────┘
//! ```
//!
//! Teardown is single-shot and best-effort: once the guard flips, no new
//! attaches or forwards take effect, and per-socket notification failures
//! never prevent the recording flush or store removal.

use serde::Serialize;

use crate::protocol::ServerMessage;

use super::state::Session;

/// Why a session ended; serialised into the `session-ended` frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TeardownReason {
    /// The broadcaster socket closed, errored, or idled out
    BroadcasterDisconnected,
    /// The stop endpoint was called
    StoppedByBroadcaster,
    /// The session reached its expiry instant
    Expired,
    /// The process is shutting down
    Shutdown,
}

impl std::fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TeardownReason::BroadcasterDisconnected => "broadcaster-disconnected",
            TeardownReason::StoppedByBroadcaster => "stopped-by-broadcaster",
            TeardownReason::Expired => "expired",
            TeardownReason::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

impl Session {
    /// End the session: notify and release every peer, flush the recording
    ///
    /// Idempotent; concurrent callers race on the single-shot guard and all
    /// but one return immediately. Removal from the store is the caller's
    /// concern ([`crate::registry::SessionStore::end_session`]).
    pub async fn teardown(&self, reason: TeardownReason) {
        if self.begin_teardown() {
            return;
        }

        let (broadcaster, listeners, expiry_task) = self.strip_peers().await;

        if let Some(task) = expiry_task {
            task.abort();
        }

        self.hub().set_broadcaster_ctl(None).await;
        // Dropping the handle closes the control channel; the broadcaster's
        // socket task exits and closes the socket
        drop(broadcaster);

        for ctl in listeners.into_values() {
            let _ = ctl.send(ServerMessage::SessionEnded { reason });
        }

        self.hub().close().await;

        let stats = self.hub().stats().await;
        tracing::info!(
            session = %self.id(),
            %reason,
            chunks = stats.chunks_received,
            bytes = stats.bytes_received,
            dropped = stats.frames_dropped,
            peak_listeners = stats.peak_listeners,
            "session ended"
        );
    }
}
