//! Core deterministic primitives.
//!
//! Randomness and hashing shared by the puzzle engine and the ledger layer.

pub mod rng;
pub mod hash;

// Re-export core types
pub use rng::DeterministicRng;
pub use hash::{Commitment, Hash32, commit, hash_bytes};
