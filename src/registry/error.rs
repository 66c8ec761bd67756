//! Admission error types
//!
//! Outcomes of the upgrade gate and session attach operations. Most are
//! surfaced as a silent socket refusal; only `BroadcasterAlreadyPresent`
//! produces a JSON `error` frame before the close.

/// Error type for peer admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    /// No live session with the requested id
    SessionNotFound,
    /// Session exists but teardown has begun
    SessionNotLive,
    /// Listener presented a token that does not match the session
    BadToken,
    /// The listener cap is reached
    CapacityExceeded,
    /// The broadcaster slot is already occupied
    BroadcasterAlreadyPresent,
}

impl std::fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdmissionError::SessionNotFound => write!(f, "session not found"),
            AdmissionError::SessionNotLive => write!(f, "session is no longer live"),
            AdmissionError::BadToken => write!(f, "invalid listener token"),
            AdmissionError::CapacityExceeded => write!(f, "listener capacity exceeded"),
            AdmissionError::BroadcasterAlreadyPresent => {
                write!(f, "a broadcaster is already connected")
            }
        }
    }
}

impl std::error::Error for AdmissionError {}
