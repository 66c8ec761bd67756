//! Live-session registry
//!
//! The [`SessionStore`] is the process-wide map of session id → session,
//! shared by the HTTP handlers and the WebSocket gate. It owns session
//! creation (id/token allocation, recording sink, expiry scheduling) and the
//! lifecycle orchestration that pairs a session's teardown with its removal.

pub mod error;
pub mod store;

pub use error::AdmissionError;
pub use store::SessionStore;
