//! Session Client
//!
//! Binds one play session to a ledger identity. Opening a session commits the
//! initial board; closing it commits the final board and score, at most once.
//!
//! ```text
//!   GameSession:  Open ──register──▶ Registered ──play──▶ Playing
//!                                        │                  │
//!                                        └─────finish───────┴──▶ Closed
//! ```
//!
//! Ledger writes are never retried. A write that does not finalize within the
//! configured timeout has an unknown outcome and is reported as such.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::core::hash::Commitment;
use crate::core::rng::DeterministicRng;
use crate::game::board::{Board, Direction};
use crate::ledger::{Address, BlockNumber, LedgerError, LedgerWriter, SessionId, TxHash, TxReceipt};

// =============================================================================
// ERRORS
// =============================================================================

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The ledger write could not be finalized.
    #[error("ledger submission failed: {0}")]
    LedgerSubmission(#[from] LedgerError),

    /// The write finalized but its receipt lacks the expected record.
    #[error("{operation} finalized without a {event} record")]
    EventNotFound {
        /// Ledger operation.
        operation: &'static str,
        /// Expected event name.
        event: &'static str,
    },

    /// Closing identity differs from the opening identity.
    #[error("session {session_id} was opened by {expected}, not {actual}")]
    IdentityMismatch {
        /// Session being closed.
        session_id: SessionId,
        /// Identity that opened it.
        expected: Address,
        /// Identity attempting to close it.
        actual: Address,
    },

    /// Session was not opened through this client.
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    /// Session already closed (or its close outcome is pending).
    #[error("session {0} already closed")]
    AlreadyClosed(SessionId),

    /// Write did not finalize in time; it may still land.
    #[error("{operation} outcome unknown after {timeout:?}")]
    OutcomeUnknown {
        /// Ledger operation.
        operation: &'static str,
        /// Timeout that expired.
        timeout: Duration,
    },

    /// Lifecycle transition not allowed from the current state.
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        /// Current state.
        from: SessionState,
        /// Attempted action.
        action: &'static str,
    },

    /// No legal moves remain.
    #[error("game over")]
    GameOver,
}

// =============================================================================
// GAME SESSION
// =============================================================================

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created locally, not on the ledger yet.
    Open,
    /// Initial board committed.
    Registered,
    /// At least one move played.
    Playing,
    /// Final score committed.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Open => "open",
            SessionState::Registered => "registered",
            SessionState::Playing => "playing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Result of `GameSession::play`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveReport {
    /// Whether the board changed.
    pub moved: bool,
    /// Points from this move.
    pub score_delta: u32,
    /// Accumulated score.
    pub score: u32,
    /// True only on the move that first produced 2048.
    pub newly_won: bool,
    /// No legal moves remain.
    pub game_over: bool,
}

/// One play attempt owned by a single identity.
#[derive(Debug, Clone)]
pub struct GameSession {
    identity: Address,
    session_id: Option<SessionId>,
    state: SessionState,
    board: Board,
    score: u32,
    moves: u32,
    won: bool,
}

impl GameSession {
    /// New session with a freshly initialized board.
    pub fn new(identity: Address, rng: &mut DeterministicRng) -> Self {
        Self::with_board(identity, Board::initialize(rng))
    }

    /// New session starting from `board`.
    pub fn with_board(identity: Address, board: Board) -> Self {
        Self {
            identity,
            session_id: None,
            state: SessionState::Open,
            board,
            score: 0,
            moves: 0,
            won: board.has_won(),
        }
    }

    /// Owner identity.
    pub fn identity(&self) -> Address {
        self.identity
    }

    /// Ledger id, once registered.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    /// Lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Accumulated score.
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Moves that changed the board.
    pub fn moves(&self) -> u32 {
        self.moves
    }

    /// Whether 2048 has been reached.
    pub fn won(&self) -> bool {
        self.won
    }

    /// No legal moves remain.
    pub fn is_over(&self) -> bool {
        !self.board.can_move()
    }

    /// Play one move.
    pub fn play(
        &mut self,
        direction: Direction,
        rng: &mut DeterministicRng,
    ) -> Result<MoveReport, SessionError> {
        match self.state {
            SessionState::Registered | SessionState::Playing => {}
            from => return Err(SessionError::InvalidTransition { from, action: "play" }),
        }
        if self.is_over() {
            return Err(SessionError::GameOver);
        }

        let outcome = self.board.apply_move(direction, rng);
        self.state = SessionState::Playing;

        if outcome.moved {
            self.board = outcome.board;
            self.score = self.score.saturating_add(outcome.score_delta);
            self.moves += 1;
        }

        let newly_won = !self.won && self.board.has_won();
        self.won |= newly_won;

        Ok(MoveReport {
            moved: outcome.moved,
            score_delta: outcome.score_delta,
            score: self.score,
            newly_won,
            game_over: self.is_over(),
        })
    }
}

// =============================================================================
// SESSION CLIENT
// =============================================================================

/// Receipt for a committed final score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreReceipt {
    /// Closed session.
    pub session_id: SessionId,
    /// Transaction hash of the submission.
    pub tx_hash: TxHash,
    /// Inclusion block.
    pub block_number: BlockNumber,
    /// Commitment of the final board.
    pub final_commitment: Commitment,
    /// Committed score.
    pub final_score: u32,
}

/// Commits session boundaries to the ledger.
pub struct SessionClient {
    ledger: Arc<dyn LedgerWriter>,
    config: SessionConfig,
    /// Session id to opening identity.
    owners: RwLock<BTreeMap<SessionId, Address>>,
    /// Sessions whose close has been submitted.
    closed: RwLock<BTreeSet<SessionId>>,
}

impl SessionClient {
    /// Create a client writing through `ledger`.
    pub fn new(ledger: Arc<dyn LedgerWriter>, config: SessionConfig) -> Self {
        Self {
            ledger,
            config,
            owners: RwLock::new(BTreeMap::new()),
            closed: RwLock::new(BTreeSet::new()),
        }
    }

    /// Commit `board` as the start of a new session owned by `identity`.
    pub async fn open_session(
        &self,
        identity: &Address,
        board: &Board,
    ) -> Result<SessionId, SessionError> {
        let commitment = board.commitment();
        let receipt = self
            .finalize("create_game", self.ledger.create_game(identity, commitment))
            .await?;

        let session_id = receipt
            .created_session()
            .ok_or(SessionError::EventNotFound {
                operation: "create_game",
                event: "GameCreated",
            })?;

        self.owners.write().await.insert(session_id, *identity);
        info!(
            "Session {} opened by {} in block {} ({})",
            session_id, identity, receipt.block_number, commitment
        );

        Ok(session_id)
    }

    /// Commit the final board and score of `session_id`.
    ///
    /// Fails before any ledger call when the session is unknown, was opened by
    /// another identity, or has already been closed.
    pub async fn close_session(
        &self,
        identity: &Address,
        session_id: SessionId,
        board: &Board,
        final_score: u32,
    ) -> Result<ScoreReceipt, SessionError> {
        let owner = self
            .owners
            .read()
            .await
            .get(&session_id)
            .copied()
            .ok_or(SessionError::UnknownSession(session_id))?;

        if owner != *identity {
            warn!("Session {} close attempted by {} (owner {})", session_id, identity, owner);
            return Err(SessionError::IdentityMismatch {
                session_id,
                expected: owner,
                actual: *identity,
            });
        }

        // Claim the close before submitting so concurrent calls cannot both write.
        if !self.closed.write().await.insert(session_id) {
            return Err(SessionError::AlreadyClosed(session_id));
        }

        let final_commitment = board.commitment();
        let result = self
            .finalize(
                "submit_score",
                self.ledger.submit_score(identity, session_id, final_commitment, final_score),
            )
            .await;

        let receipt = match result {
            Ok(receipt) => receipt,
            Err(SessionError::LedgerSubmission(e)) => {
                // Definitely not recorded; the close may be attempted again.
                self.closed.write().await.remove(&session_id);
                return Err(SessionError::LedgerSubmission(e));
            }
            Err(e) => return Err(e),
        };

        info!(
            "Session {} closed with score {} in block {}",
            session_id, final_score, receipt.block_number
        );

        Ok(ScoreReceipt {
            session_id,
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            final_commitment,
            final_score,
        })
    }

    /// Register `session` on the ledger.
    pub async fn register(&self, session: &mut GameSession) -> Result<SessionId, SessionError> {
        if session.state != SessionState::Open {
            return Err(SessionError::InvalidTransition {
                from: session.state,
                action: "register",
            });
        }

        let session_id = self.open_session(&session.identity, &session.board).await?;
        session.session_id = Some(session_id);
        session.state = SessionState::Registered;
        Ok(session_id)
    }

    /// Commit the final state of `session` and close it.
    ///
    /// A session that was never registered is registered first with its
    /// current board.
    pub async fn finish(&self, session: &mut GameSession) -> Result<ScoreReceipt, SessionError> {
        if session.state == SessionState::Open {
            self.register(session).await?;
        }

        let session_id = match (session.state, session.session_id) {
            (SessionState::Closed, Some(id)) => return Err(SessionError::AlreadyClosed(id)),
            (SessionState::Registered | SessionState::Playing, Some(id)) => id,
            (from, _) => return Err(SessionError::InvalidTransition { from, action: "finish" }),
        };

        let receipt = self
            .close_session(&session.identity, session_id, &session.board, session.score)
            .await?;
        session.state = SessionState::Closed;
        Ok(receipt)
    }

    /// Number of sessions opened through this client.
    pub async fn session_count(&self) -> usize {
        self.owners.read().await.len()
    }

    /// Whether a close has been submitted for `session_id`.
    pub async fn is_closed(&self, session_id: SessionId) -> bool {
        self.closed.read().await.contains(&session_id)
    }

    /// Await a ledger write under the finality timeout.
    async fn finalize<F>(&self, operation: &'static str, write: F) -> Result<TxReceipt, SessionError>
    where
        F: Future<Output = Result<TxReceipt, LedgerError>>,
    {
        let timeout = self.config.finality_timeout;
        match tokio::time::timeout(timeout, write).await {
            Ok(Ok(receipt)) => Ok(receipt),
            Ok(Err(e)) => {
                warn!("{} failed: {}", operation, e);
                Err(SessionError::LedgerSubmission(e))
            }
            Err(_) => {
                warn!("{} did not finalize within {:?}", operation, timeout);
                Err(SessionError::OutcomeUnknown { operation, timeout })
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
