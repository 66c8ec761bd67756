//! Top-level error types
//!
//! Errors surfaced by server startup and session creation.

use std::path::PathBuf;

/// Result alias for crate-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for server and store operations
#[derive(Debug)]
pub enum Error {
    /// Failed to bind the listen socket
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },
    /// Failed to create or open a recording file
    Recording {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Other I/O failure
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Bind { addr, source } => write!(f, "failed to bind {}: {}", addr, source),
            Error::Recording { path, source } => {
                write!(f, "failed to open recording {}: {}", path.display(), source)
            }
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Bind { source, .. } | Error::Recording { source, .. } => Some(source),
            Error::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
