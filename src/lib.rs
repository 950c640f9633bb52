//! # BA2048 Server
//!
//! Deterministic 2048 engine with ledger-committed sessions and an
//! aggregated, cached leaderboard.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       BA2048 SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  └── hash.rs     - Keccak-256 commitments                    │
//! │                                                              │
//! │  game/           - Puzzle engine (deterministic)             │
//! │  └── board.rs    - Board, moves, spawns, win/loss            │
//! │                                                              │
//! │  ledger/         - Append-only ledger access                 │
//! │  ├── memory.rs   - In-process ledger                         │
//! │  └── rpc.rs      - JSON-RPC log reader                       │
//! │                                                              │
//! │  session/        - Session open/close commitments            │
//! │                                                              │
//! │  leaderboard/    - Score aggregation                         │
//! │  ├── scan.rs     - Windowed historical log scan              │
//! │  └── cache.rs    - TTL snapshot cache                        │
//! │                                                              │
//! │  network/        - WebSocket read path                       │
//! │  ├── server.rs   - Leaderboard server                        │
//! │  └── protocol.rs - Message types                             │
//! │                                                              │
//! │  config.rs       - Environment configuration                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! `core/` and `game/` never read the clock or the OS. Given the same seed
//! and the same sequence of moves, a game reaches the same board, the same
//! score and the same commitments on every platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod leaderboard;
pub mod ledger;
pub mod network;
pub mod session;

// Re-export commonly used types
pub use config::AppConfig;
pub use core::hash::Commitment;
pub use core::rng::DeterministicRng;
pub use game::board::{Board, Direction, MoveOutcome};
pub use leaderboard::{LeaderboardAggregator, LeaderboardEntry};
pub use ledger::{Address, LedgerReader, LedgerWriter, ScoreRecord};
pub use session::{GameSession, SessionClient, SessionError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
