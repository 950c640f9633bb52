//! Protocol Messages
//!
//! Wire format for the leaderboard read path over WebSocket.
//! Messages are JSON tagged by `type`. A leaderboard snapshot can also be
//! requested as a bincode binary frame.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::leaderboard::LeaderboardEntry;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request the ranked leaderboard.
    GetLeaderboard {
        /// Maximum entries; server default when absent.
        #[serde(default)]
        limit: Option<usize>,
        /// Reply encoding.
        #[serde(default)]
        encoding: Encoding,
    },

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

/// Reply encoding for a leaderboard request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// `leaderboard` text frame.
    #[default]
    Json,
    /// Bincode `LeaderboardSnapshot` in a binary frame.
    Bincode,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Ranked leaderboard.
    Leaderboard(LeaderboardSnapshot),

    /// Pong response.
    Pong {
        /// Client's timestamp, echoed.
        timestamp: u64,
        /// Server time in Unix milliseconds.
        server_time: u64,
    },

    /// Request could not be served.
    Error(ErrorInfo),

    /// Server is going away.
    Shutdown { reason: String },
}

/// A leaderboard as sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    /// Ranked entries, best first.
    pub entries: Vec<LeaderboardEntry>,
    /// Players on the full leaderboard, before the limit.
    pub total_players: usize,
    /// When this reply was produced.
    pub generated_at: DateTime<Utc>,
}

impl LeaderboardSnapshot {
    /// Snapshot of the first `limit` entries.
    pub fn new(mut entries: Vec<LeaderboardEntry>, limit: usize) -> Self {
        let total_players = entries.len();
        entries.truncate(limit);
        Self {
            entries,
            total_players,
            generated_at: Utc::now(),
        }
    }

    /// Bincode encoding, for binary frames.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decode a binary frame.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

/// Error details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed request.
    InvalidInput,
    /// Connection limit reached.
    ServerOverloaded,
    /// Failure inside the server.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Error reply.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorInfo {
            code,
            message: message.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Address;

    fn entries() -> Vec<LeaderboardEntry> {
        (1..=3)
            .map(|i| LeaderboardEntry {
                player: Address::new([i; 20]),
                score: 1000 - i as u32 * 100,
            })
            .collect()
    }

    #[test]
    fn test_client_message_wire_format() {
        let msg = ClientMessage::from_json(r#"{"type":"get_leaderboard","limit":10}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::GetLeaderboard {
                limit: Some(10),
                encoding: Encoding::Json,
            }
        );

        let msg = ClientMessage::from_json(r#"{"type":"get_leaderboard"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::GetLeaderboard {
                limit: None,
                encoding: Encoding::Json,
            }
        );

        let msg = ClientMessage::from_json(r#"{"type":"get_leaderboard","encoding":"bincode"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::GetLeaderboard { encoding: Encoding::Bincode, .. }));

        let ping = ClientMessage::Ping { timestamp: 42 }.to_json().unwrap();
        assert_eq!(ping, r#"{"type":"ping","timestamp":42}"#);

        assert!(ClientMessage::from_json(r#"{"type":"auth"}"#).is_err());
    }

    #[test]
    fn test_leaderboard_message_json() {
        let msg = ServerMessage::Leaderboard(LeaderboardSnapshot::new(entries(), 2));
        let json = msg.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["type"], "leaderboard");
        assert_eq!(value["total_players"], 3);
        assert_eq!(value["entries"].as_array().unwrap().len(), 2);
        assert_eq!(value["entries"][0]["player"], format!("0x{}", "01".repeat(20)));
        assert_eq!(value["entries"][0]["score"], 900);

        assert_eq!(ServerMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_error_and_shutdown_json() {
        let json = ServerMessage::error(ErrorCode::InvalidInput, "bad").to_json().unwrap();
        assert_eq!(json, r#"{"type":"error","code":"invalid_input","message":"bad"}"#);

        let json = ServerMessage::Shutdown { reason: "bye".to_string() }.to_json().unwrap();
        assert_eq!(json, r#"{"type":"shutdown","reason":"bye"}"#);
    }

    #[test]
    fn test_snapshot_binary() {
        // Tagged enums are not bincode-friendly; the snapshot struct is.
        let snapshot = LeaderboardSnapshot::new(entries(), 10);
        let bytes = snapshot.to_bytes().unwrap();

        assert_eq!(LeaderboardSnapshot::from_bytes(&bytes).unwrap(), snapshot);
    }
}
