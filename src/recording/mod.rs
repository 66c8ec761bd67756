//! On-disk recording of broadcast streams
//!
//! Every session tees its binary chunks to an append-only `.webm` file so the
//! broadcast can be downloaded after it ends. The sink never blocks the relay
//! hot path: chunks are queued to a dedicated writer task and congestion is
//! reported back as a backpressure signal instead of a stall.

pub mod sink;

pub use sink::RecordingSink;
