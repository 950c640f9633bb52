//! Puzzle Engine
//!
//! Pure 2048 state transitions. Deterministic given an injected RNG.

pub mod board;

pub use board::{
    board_commitment, collapse_line, Board, BoardError, Direction, MoveOutcome, BOARD_SIZE,
    MAX_TILE, WIN_TILE,
};
