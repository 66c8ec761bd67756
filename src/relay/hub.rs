//! The relay hot path
//!
//! For every chunk from the broadcaster the hub: caches the first chunk as
//! the session's init segment, tees the chunk to the recording sink, fans it
//! out to listeners over the broadcast channel, and latches a backpressure
//! signal toward the broadcaster while the sink is congested.
//!
//! The hub mutex serialises init-segment capture against `subscribe`, so a
//! joining listener sees the cached snapshot or receives the `Init` frame
//! from the channel — exactly one of the two.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, Mutex};

use crate::protocol::ServerMessage;
use crate::recording::RecordingSink;
use crate::session::ControlSender;
use crate::stats::SessionStats;

use super::frame::RelayFrame;

struct HubState {
    init_segment: Option<Bytes>,
    draining: bool,
    broadcaster_ctl: Option<ControlSender>,
    stats: SessionStats,
}

/// Per-session fan-out hub
pub struct RelayHub {
    tx: broadcast::Sender<RelayFrame>,
    sink: RecordingSink,
    state: Mutex<HubState>,
}

impl RelayHub {
    /// Create a hub writing to `sink`, with a fan-out ring of `queue_depth`
    /// frames per listener
    pub fn new(queue_depth: usize, sink: RecordingSink) -> Self {
        let (tx, _) = broadcast::channel(queue_depth.max(1));

        Self {
            tx,
            sink,
            state: Mutex::new(HubState {
                init_segment: None,
                draining: false,
                broadcaster_ctl: None,
                stats: SessionStats::new(),
            }),
        }
    }

    /// Route one binary chunk from the broadcaster
    ///
    /// Never blocks on listeners; the recording tee is asynchronous and
    /// congestion surfaces as a `backpressure` message instead of a stall.
    pub async fn ingest(self: &Arc<Self>, chunk: Bytes) {
        let mut state = self.state.lock().await;

        let frame = if state.init_segment.is_none() {
            state.init_segment = Some(chunk.clone());
            tracing::debug!(size = chunk.len(), "init segment cached");
            RelayFrame::Init(chunk.clone())
        } else {
            RelayFrame::Chunk(chunk.clone())
        };

        state.stats.record_chunk(chunk.len());

        let accepted = self.sink.write(chunk);

        // send() errs only when no listener is subscribed
        let _ = self.tx.send(frame);

        if !accepted && !state.draining {
            state.draining = true;
            if let Some(ctl) = &state.broadcaster_ctl {
                let _ = ctl.send(ServerMessage::Backpressure);
            }
            tracing::debug!(pending = self.sink.pending_bytes(), "recording congested");

            let hub = Arc::clone(self);
            let mut congestion = self.sink.subscribe_congestion();
            tokio::spawn(async move {
                if congestion.wait_for(|congested| !congested).await.is_ok() {
                    hub.on_drained().await;
                }
            });
        }
    }

    /// Attach a listener: returns the init-segment snapshot (if already
    /// cached) and a receiver for subsequent frames
    pub async fn subscribe(&self) -> (Option<Bytes>, broadcast::Receiver<RelayFrame>) {
        let state = self.state.lock().await;
        (state.init_segment.clone(), self.tx.subscribe())
    }

    /// The cached init segment, if any chunk has arrived yet
    pub async fn init_segment(&self) -> Option<Bytes> {
        self.state.lock().await.init_segment.clone()
    }

    /// Bind or clear the broadcaster's control channel for flow signals
    pub async fn set_broadcaster_ctl(&self, ctl: Option<ControlSender>) {
        self.state.lock().await.broadcaster_ctl = ctl;
    }

    /// Record frames a lagging listener lost
    pub async fn record_dropped(&self, count: u64) {
        self.state.lock().await.stats.record_dropped(count);
    }

    /// Track the listener high-water mark
    pub async fn note_listeners(&self, current: usize) {
        self.state.lock().await.stats.note_listeners(current);
    }

    /// Snapshot of the session counters
    pub async fn stats(&self) -> SessionStats {
        self.state.lock().await.stats.clone()
    }

    /// Basename of the recording file
    pub fn recording_file_name(&self) -> String {
        self.sink.file_name()
    }

    /// Flush and close the recording sink
    pub async fn close(&self) {
        self.sink.close().await;
    }

    async fn on_drained(&self) {
        let mut state = self.state.lock().await;
        if state.draining {
            state.draining = false;
            if let Some(ctl) = &state.broadcaster_ctl {
                let _ = ctl.send(ServerMessage::Drain);
            }
            tracing::debug!("recording drained");
        }
    }
}
