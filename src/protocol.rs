//! Wire control messages
//!
//! Binary WebSocket frames carry opaque opus/webm chunks; text frames carry
//! the JSON control messages defined here. Server→client messages are typed
//! and serialised with serde; client→server text frames are parsed leniently
//! and unknown types ignored.

use serde::{Deserialize, Serialize};

use crate::session::TeardownReason;

/// WebSocket close reason for a listener whose queue keeps overflowing
pub const SLOW_CONSUMER_CLOSE_REASON: &str = "slow-consumer";

/// Server→client JSON text frame
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Listener admission confirmation
    Ok {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    /// A broadcaster is attached to the session
    BroadcastStarted,
    /// Announces the binary init segment that immediately follows
    InitSegment { size: usize },
    /// Final message before the listener socket closes
    SessionEnded { reason: TeardownReason },
    /// Recording sink is congested; the broadcaster should pause
    Backpressure,
    /// Recording sink drained; the broadcaster may resume
    Drain,
    /// Current listener cardinality, sent to the broadcaster on changes
    ListenerCount { count: usize },
    /// Fatal admission error, followed by a socket close
    Error { message: String },
}

impl ServerMessage {
    /// Serialise to the JSON text frame body
    pub fn to_json(&self) -> String {
        // Serialisation of these variants cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Client→server JSON text frame
///
/// The relay accepts arbitrary control messages from the broadcaster and
/// currently acts on none of them.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ClientMessage {
    /// Parse a text frame; `None` for malformed JSON
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_shape() {
        let msg = ServerMessage::Ok {
            session_id: "a1b2c3d4".into(),
        };

        assert_eq!(msg.to_json(), r#"{"type":"ok","sessionId":"a1b2c3d4"}"#);
    }

    #[test]
    fn test_broadcast_started_shape() {
        assert_eq!(
            ServerMessage::BroadcastStarted.to_json(),
            r#"{"type":"broadcast-started"}"#
        );
    }

    #[test]
    fn test_init_segment_shape() {
        let msg = ServerMessage::InitSegment { size: 1234 };

        assert_eq!(msg.to_json(), r#"{"type":"init-segment","size":1234}"#);
    }

    #[test]
    fn test_session_ended_reasons() {
        let cases = [
            (TeardownReason::BroadcasterDisconnected, "broadcaster-disconnected"),
            (TeardownReason::StoppedByBroadcaster, "stopped-by-broadcaster"),
            (TeardownReason::Expired, "expired"),
            (TeardownReason::Shutdown, "shutdown"),
        ];

        for (reason, expected) in cases {
            let msg = ServerMessage::SessionEnded { reason };
            assert_eq!(
                msg.to_json(),
                format!(r#"{{"type":"session-ended","reason":"{}"}}"#, expected)
            );
        }
    }

    #[test]
    fn test_flow_control_shapes() {
        assert_eq!(ServerMessage::Backpressure.to_json(), r#"{"type":"backpressure"}"#);
        assert_eq!(ServerMessage::Drain.to_json(), r#"{"type":"drain"}"#);
        assert_eq!(
            ServerMessage::ListenerCount { count: 3 }.to_json(),
            r#"{"type":"listener-count","count":3}"#
        );
    }

    #[test]
    fn test_client_message_parse() {
        let msg = ClientMessage::parse(r#"{"type":"hello","extra":42}"#);
        assert_eq!(msg.map(|m| m.kind), Some("hello".to_string()));

        assert!(ClientMessage::parse("not json").is_none());
    }
}
