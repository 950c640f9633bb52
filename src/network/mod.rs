//! Network Layer
//!
//! WebSocket read path for the leaderboard.
//! Nothing here touches the puzzle engine or writes to the ledger.

pub mod protocol;
pub mod server;

pub use protocol::{
    ClientMessage, ServerMessage, LeaderboardSnapshot, Encoding, ErrorCode, ErrorInfo,
};
pub use server::{LeaderboardServer, ServerError};
