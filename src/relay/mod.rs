//! Per-session fan-out of broadcast audio
//!
//! Each session owns one [`RelayHub`] that routes every binary chunk from the
//! broadcaster to the recording sink and to all attached listeners.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<RelayHub>
//!                ┌─────────────────────────┐
//!   broadcaster  │ init_segment: cached    │
//!   ingest() ───►│ tx: broadcast::Sender   │───► RecordingSink (tee)
//!                │ draining latch          │
//!                └───────────┬─────────────┘
//!                            │
//!            ┌───────────────┼───────────────┐
//!            ▼               ▼               ▼
//!       [Listener]      [Listener]      [Listener]
//!       rx.recv()       rx.recv()       rx.recv()
//! ```
//!
//! # Zero-Copy Design
//!
//! Frames wrap `bytes::Bytes`, so the broadcast channel clones only the
//! reference-counted handle; all listeners and the sink share one allocation
//! per chunk.
//!
//! # Bounded buffering
//!
//! The broadcast ring is sized to the per-listener queue depth. A listener
//! that falls behind loses the oldest queued frames (`RecvError::Lagged`)
//! rather than delaying anyone else; repeated overflow gets it disconnected
//! as a slow consumer by its socket task.

pub mod frame;
pub mod hub;

pub use frame::RelayFrame;
pub use hub::RelayHub;
