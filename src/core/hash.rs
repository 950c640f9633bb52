//! Commitment Hashing
//!
//! Provides the 32-byte digests recorded on the ledger in place of full
//! board contents. A commitment is Keccak-256 over a canonical byte
//! serialization, the same digest the contract's other records use, so any
//! off-chain auditor holding the board can recompute it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

/// Hash output type (256 bits / 32 bytes)
pub type Hash32 = [u8; 32];

/// A 32-byte commitment as stored by the ledger (`bytes32`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Commitment(pub Hash32);

impl Commitment {
    /// Wrap raw digest bytes.
    pub const fn new(bytes: Hash32) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &Hash32 {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", self.to_hex())
    }
}

/// Error parsing a hex-encoded 32-byte value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexWordError {
    /// Not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    /// Wrong byte length.
    #[error("expected 32 bytes, got {0}")]
    WrongLength(usize),
}

/// Decode a `0x`-optional hex string into exactly 32 bytes.
pub fn decode_word(s: &str) -> Result<Hash32, HexWordError> {
    let raw = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let bytes = hex::decode(raw).map_err(|e| HexWordError::InvalidHex(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(HexWordError::WrongLength(bytes.len()));
    }
    let mut word = [0u8; 32];
    word.copy_from_slice(&bytes);
    Ok(word)
}

impl FromStr for Commitment {
    type Err = HexWordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_word(s).map(Self)
    }
}

impl Serialize for Commitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Commitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Keccak-256 of arbitrary data (the EVM's `keccak256`, not NIST SHA3-256).
pub fn hash_bytes(data: &[u8]) -> Hash32 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Commit to a canonical serialization.
pub fn commit(canonical: &[u8]) -> Commitment {
    Commitment(hash_bytes(canonical))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_bytes_known_vectors() {
        assert_eq!(
            hex::encode(hash_bytes(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(
            hex::encode(hash_bytes(b"abc")),
            "4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45"
        );
    }

    #[test]
    fn test_hash_bytes_matches_event_topic() {
        let topic = hash_bytes(b"ScoreSubmitted(uint256,address,bytes32,uint32)");
        assert_eq!(
            format!("0x{}", hex::encode(topic)),
            "0xd453b544bccb2a6f47c4fff5830beef742b9578850e0f6ff52282438e2236fff"
        );
    }

    #[test]
    fn test_commit_is_deterministic() {
        assert_eq!(commit(b"[[2,0],[0,0]]"), commit(b"[[2,0],[0,0]]"));
        assert_ne!(commit(b"[[2,0],[0,0]]"), commit(b"[[0,2],[0,0]]"));
    }

    #[test]
    fn test_commitment_hex_parsing() {
        let c = commit(b"board");
        let parsed: Commitment = c.to_hex().parse().unwrap();
        assert_eq!(parsed, c);

        let upper = c.to_hex().to_uppercase().replacen("0X", "0x", 1);
        assert_eq!(upper.parse::<Commitment>().unwrap(), c);

        assert_eq!("0x1234".parse::<Commitment>(), Err(HexWordError::WrongLength(2)));
        assert!(matches!("0xzz".parse::<Commitment>(), Err(HexWordError::InvalidHex(_))));
    }

    #[test]
    fn test_commitment_serde_as_hex_string() {
        let c = Commitment::new([0xab; 32]);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(32)));

        let back: Commitment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
