//! Ledger Interfaces
//!
//! The external append-only log that sessions commit to and the leaderboard
//! is rebuilt from. Only three operations and two events matter here:
//!
//! ```text
//!   write:  create_game(commitment)                   -> GameCreated
//!           submit_score(session, commitment, score)  -> ScoreSubmitted
//!   read:   block_number()
//!           score_events(from, to)                    -> [ScoreSubmitted]
//! ```
//!
//! Signing is outside the crate. A `LedgerWriter` implementation submits on
//! behalf of the identity it is handed and returns once the write is final.

pub mod memory;
pub mod rpc;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::hash::Commitment;

pub use memory::{CallCounters, InMemoryLedger};
pub use rpc::JsonRpcLedger;

/// Ledger-assigned session (game) identifier.
pub type SessionId = u64;

/// Block height.
pub type BlockNumber = u64;

/// Transaction hashes share the 32-byte word representation.
pub type TxHash = Commitment;

// =============================================================================
// ADDRESS
// =============================================================================

/// 20-byte account identifier.
///
/// Parsing is case-insensitive; display is always lowercase `0x` hex, which
/// makes it the canonical form for comparing players.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Wrap raw bytes.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

/// Error parsing an address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// Not valid hex.
    #[error("invalid address hex: {0}")]
    InvalidHex(String),
    /// Wrong byte length.
    #[error("expected 20 address bytes, got {0}")]
    WrongLength(usize),
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let raw = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        if bytes.len() != 20 {
            return Err(AddressError::WrongLength(bytes.len()));
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// EVENTS & RECEIPTS
// =============================================================================

/// A final-score record as emitted by `submit_score`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Session the score belongs to.
    pub session_id: SessionId,
    /// Submitting player.
    pub player: Address,
    /// Commitment of the final board.
    pub final_commitment: Commitment,
    /// Final accumulated score.
    pub final_score: u32,
    /// Block the record landed in.
    pub block_number: BlockNumber,
}

/// Events the crate cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A session was created.
    GameCreated {
        /// Assigned session id.
        session_id: SessionId,
        /// Creating player.
        player: Address,
        /// Commitment of the initial board.
        board_commitment: Commitment,
    },
    /// A final score was recorded.
    ScoreSubmitted(ScoreRecord),
}

/// Receipt of a finalized write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Inclusion block.
    pub block_number: BlockNumber,
    /// Decoded event records, in emission order.
    pub logs: Vec<LedgerEvent>,
}

impl TxReceipt {
    /// Session id from the first `GameCreated` record, if any.
    pub fn created_session(&self) -> Option<SessionId> {
        self.logs.iter().find_map(|log| match log {
            LedgerEvent::GameCreated { session_id, .. } => Some(*session_id),
            _ => None,
        })
    }

    /// The first `ScoreSubmitted` record, if any.
    pub fn score_record(&self) -> Option<&ScoreRecord> {
        self.logs.iter().find_map(|log| match log {
            LedgerEvent::ScoreSubmitted(record) => Some(record),
            _ => None,
        })
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Ledger access errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Network or HTTP failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Node message.
        message: String,
    },

    /// Write was rejected by the ledger.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// Response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Block range query failed.
    #[error("range {from}..={to} unavailable: {reason}")]
    RangeUnavailable {
        /// First block of the range.
        from: BlockNumber,
        /// Last block of the range.
        to: BlockNumber,
        /// Failure detail.
        reason: String,
    },
}

// =============================================================================
// TRAITS
// =============================================================================

/// Write side: submits signed transactions and waits for finality.
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    /// Record a new session for `signer` with the initial board commitment.
    async fn create_game(
        &self,
        signer: &Address,
        board_commitment: Commitment,
    ) -> Result<TxReceipt, LedgerError>;

    /// Record the final board commitment and score for `session_id`.
    async fn submit_score(
        &self,
        signer: &Address,
        session_id: SessionId,
        final_commitment: Commitment,
        final_score: u32,
    ) -> Result<TxReceipt, LedgerError>;
}

/// Read side: chain head and historical score records.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Current chain head.
    async fn block_number(&self) -> Result<BlockNumber, LedgerError>;

    /// `ScoreSubmitted` records in `from..=to`, in increasing block order.
    async fn score_events(
        &self,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<ScoreRecord>, LedgerError>;
}

// =============================================================================
// TESTS
// =============================================================================
