//! Broadcast session state and lifecycle
//!
//! A [`Session`] aggregates everything one live broadcast owns: the
//! broadcaster slot, the listener set, the relay hub with its cached init
//! segment, the recording sink, and the expiry timer. All membership
//! mutations are serialised on the session mutex; the teardown procedure in
//! [`lifecycle`] runs exactly once per session.

pub mod lifecycle;
pub mod state;

pub use lifecycle::TeardownReason;
pub use state::{ControlSender, ListenerAttachment, Session};
