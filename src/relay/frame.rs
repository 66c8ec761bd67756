//! Frames fanned out to listeners
//!
//! Designed to be cheap to clone: the payload is reference-counted `Bytes`.

use bytes::Bytes;

/// A binary chunk routed through the relay hub
#[derive(Debug, Clone)]
pub enum RelayFrame {
    /// The stream's first chunk. Decoders need it before any other chunk, so
    /// delivery is preceded by a JSON announcement.
    Init(Bytes),
    /// Any subsequent media chunk
    Chunk(Bytes),
}

impl RelayFrame {
    /// The chunk payload
    pub fn payload(&self) -> &Bytes {
        match self {
            RelayFrame::Init(b) | RelayFrame::Chunk(b) => b,
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload().len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload().is_empty()
    }
}
