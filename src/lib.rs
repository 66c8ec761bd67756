//! livecast — live audio broadcast relay
//!
//! One authenticated broadcaster streams an opus/webm feed over a WebSocket;
//! up to N anonymous listeners receive the same binary stream in near
//! real-time while the server tees every chunk to an on-disk recording.
//!
//! # Architecture
//!
//! ```text
//!   broadcaster ──ws──► UpgradeGate ──► Session ──► RelayHub ──► listeners
//!                            │             │            │
//!   POST /api/session ──► SessionStore ◄───┘            └──► RecordingSink
//! ```
//!
//! - [`registry::SessionStore`]: process-wide id → session map.
//! - [`session::Session`]: one live broadcast — broadcaster slot, listener
//!   set, init-segment cache, expiry timer, one-shot teardown.
//! - [`relay::RelayHub`]: the hot path; fans each chunk out to every
//!   listener with bounded per-listener buffering and tees it to disk.
//! - [`recording::RecordingSink`]: append-only file writer whose congestion
//!   surfaces as a `backpressure`/`drain` signal to the broadcaster.
//! - [`server::RelayServer`]: axum assembly of the WebSocket gate and the
//!   HTTP API.
//!
//! # Quick start
//!
//! ```no_run
//! use livecast::{RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = RelayServer::new(ServerConfig::from_env()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod protocol;
pub mod recording;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
pub mod stats;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use protocol::ServerMessage;
pub use registry::{AdmissionError, SessionStore};
pub use relay::{RelayFrame, RelayHub};
pub use recording::RecordingSink;
pub use server::RelayServer;
pub use session::{Session, TeardownReason};
pub use stats::SessionStats;
