//! Wire shapes and connection states shared across the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Close code for an intentional, caller-initiated shutdown. A channel
/// closed with this code is never reconnected.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code reported when the transport dies without a close handshake
/// (connection refused, network drop, stream error).
pub const CLOSE_ABNORMAL: u16 = 1006;

/// One chat message.
///
/// The history endpoint's per-item entries and live inbound frames share
/// this exact shape, so callers render both uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub user: String,
    pub content: String,
    #[serde(default)]
    pub is_bot: bool,
    pub timestamp: DateTime<Utc>,
}

/// Outbound wire frame sent on the live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub message: String,
    pub user: String,
}

/// Body of `GET /history/{room}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<ChatMessage>,
}

/// Connection lifecycle of one client instance. Exactly one state is
/// active at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Not connected and not trying: only after `stop()`.
    Idle,
    /// A channel open is in flight.
    Connecting,
    Open,
    /// The channel closed. A reconnect timer may be pending; none is after
    /// a normal closure.
    Closed { code: u16, reason: String },
    /// Retry budget exhausted. Only a manual reconnect leaves this state.
    Failed,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_round_trips_history_field_names() {
        let json = r#"{"user":"amina","content":"table for four","is_bot":false,"timestamp":"2025-11-03T12:30:00Z"}"#;
        let msg: ChatMessage = serde_json::from_str(json).expect("decode");
        assert_eq!(msg.user, "amina");
        assert_eq!(msg.content, "table for four");
        assert!(!msg.is_bot);

        let back = serde_json::to_string(&msg).expect("encode");
        let again: ChatMessage = serde_json::from_str(&back).expect("re-decode");
        assert_eq!(again, msg);
    }

    #[test]
    fn missing_bot_flag_defaults_false() {
        let json = r#"{"user":"x","content":"y","timestamp":"2025-11-03T12:30:00Z"}"#;
        let msg: ChatMessage = serde_json::from_str(json).expect("decode");
        assert!(!msg.is_bot);
    }

    #[test]
    fn outbound_frame_shape() {
        let frame = OutboundFrame {
            message: "hi".into(),
            user: "amina".into(),
        };
        let json = serde_json::to_value(&frame).expect("encode");
        assert_eq!(json["message"], "hi");
        assert_eq!(json["user"], "amina");
    }
}
