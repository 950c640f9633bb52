//! In-Memory Ledger
//!
//! Implements both ledger traits with the contract's observable behaviour:
//! sequential session ids starting at 1, one block per transaction, and a
//! same-identity check on `submit_score`. A second submission for the same
//! session is accepted, as the contract does.
//!
//! Faults can be injected for tests and every trait call is counted.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::hash::{commit, Commitment};
use crate::ledger::{
    Address, BlockNumber, LedgerError, LedgerEvent, LedgerReader, LedgerWriter, ScoreRecord,
    SessionId, TxReceipt,
};

/// Number of trait calls observed, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounters {
    /// `create_game` calls.
    pub create_game: u64,
    /// `submit_score` calls.
    pub submit_score: u64,
    /// `block_number` calls.
    pub block_number: u64,
    /// `score_events` calls.
    pub score_events: u64,
}

impl CallCounters {
    /// Total write calls.
    pub fn writes(&self) -> u64 {
        self.create_game + self.submit_score
    }

    /// Total read calls.
    pub fn reads(&self) -> u64 {
        self.block_number + self.score_events
    }
}

#[derive(Debug, Clone, Copy)]
enum WriteKind {
    CreateGame,
    SubmitScore,
}

#[derive(Debug, Default)]
struct Faults {
    write_failure: Option<String>,
    drop_receipt_logs: bool,
    write_delay: Option<Duration>,
    head_failure: bool,
    failing_blocks: BTreeSet<BlockNumber>,
}

#[derive(Debug)]
struct GameRecord {
    player: Address,
    board_commitment: Commitment,
}

#[derive(Debug, Default)]
struct LedgerState {
    head: BlockNumber,
    tx_count: u64,
    next_session: SessionId,
    games: BTreeMap<SessionId, GameRecord>,
    scores: Vec<ScoreRecord>,
    faults: Faults,
    counters: CallCounters,
}

impl LedgerState {
    /// Mine one block holding a single transaction.
    fn mine(&mut self, logs: Vec<LedgerEvent>) -> TxReceipt {
        self.head += 1;
        self.tx_count += 1;

        let tx_hash = commit(format!("tx:{}:{}", self.tx_count, self.head).as_bytes());
        let logs = if self.faults.drop_receipt_logs { Vec::new() } else { logs };

        TxReceipt {
            tx_hash,
            block_number: self.head,
            logs,
        }
    }
}

/// Ledger held entirely in memory.
///
/// Cloning shares the same underlying ledger.
#[derive(Clone, Debug)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    /// Empty ledger at block 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Empty ledger whose head starts at `block`.
    pub fn starting_at(block: BlockNumber) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                head: block,
                next_session: 1,
                ..Default::default()
            })),
        }
    }

    /// Current head without counting a read.
    pub async fn head(&self) -> BlockNumber {
        self.state.lock().await.head
    }

    /// Mine `count` empty blocks.
    pub async fn advance_blocks(&self, count: u64) {
        self.state.lock().await.head += count;
    }

    /// Call counters so far.
    pub async fn counters(&self) -> CallCounters {
        self.state.lock().await.counters
    }

    /// Owner and initial commitment of a created game.
    pub async fn game(&self, session_id: SessionId) -> Option<(Address, Commitment)> {
        self.state
            .lock()
            .await
            .games
            .get(&session_id)
            .map(|game| (game.player, game.board_commitment))
    }

    /// All recorded score submissions.
    pub async fn score_history(&self) -> Vec<ScoreRecord> {
        self.state.lock().await.scores.clone()
    }

    /// Make every write fail with a transport error (`None` clears).
    pub async fn set_write_failure(&self, reason: Option<&str>) {
        self.state.lock().await.faults.write_failure = reason.map(str::to_string);
    }

    /// Finalize writes but return receipts without any records.
    pub async fn set_drop_receipt_logs(&self, drop: bool) {
        self.state.lock().await.faults.drop_receipt_logs = drop;
    }

    /// Delay every write by `delay` before it is applied.
    pub async fn set_write_delay(&self, delay: Option<Duration>) {
        self.state.lock().await.faults.write_delay = delay;
    }

    /// Make `block_number` fail.
    pub async fn set_head_failure(&self, fail: bool) {
        self.state.lock().await.faults.head_failure = fail;
    }

    /// Make any `score_events` query covering `block` fail.
    pub async fn fail_range_containing(&self, block: BlockNumber) {
        self.state.lock().await.faults.failing_blocks.insert(block);
    }

    /// Create a game and score it in one go. Counted as two writes.
    pub async fn record_game(
        &self,
        player: &Address,
        final_score: u32,
    ) -> Result<ScoreRecord, LedgerError> {
        let created = self.create_game(player, commit(b"[]")).await?;
        let session_id = created
            .created_session()
            .ok_or_else(|| LedgerError::Decode("missing GameCreated record".to_string()))?;

        let submitted = self
            .submit_score(player, session_id, commit(b"[]"), final_score)
            .await?;
        submitted
            .score_record()
            .cloned()
            .ok_or_else(|| LedgerError::Decode("missing ScoreSubmitted record".to_string()))
    }

    /// Count the call and return the configured delay or failure.
    async fn begin_write(&self, kind: WriteKind) -> Result<(), LedgerError> {
        let delay = {
            let mut state = self.state.lock().await;
            match kind {
                WriteKind::CreateGame => state.counters.create_game += 1,
                WriteKind::SubmitScore => state.counters.submit_score += 1,
            }
            if let Some(reason) = &state.faults.write_failure {
                return Err(LedgerError::Transport(reason.clone()));
            }
            state.faults.write_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerWriter for InMemoryLedger {
    async fn create_game(
        &self,
        signer: &Address,
        board_commitment: Commitment,
    ) -> Result<TxReceipt, LedgerError> {
        self.begin_write(WriteKind::CreateGame).await?;

        let mut state = self.state.lock().await;
        let session_id = state.next_session;
        state.next_session += 1;
        state.games.insert(session_id, GameRecord {
            player: *signer,
            board_commitment,
        });

        let receipt = state.mine(vec![LedgerEvent::GameCreated {
            session_id,
            player: *signer,
            board_commitment,
        }]);
        debug!("game {} created by {} in block {}", session_id, signer, receipt.block_number);
        Ok(receipt)
    }

    async fn submit_score(
        &self,
        signer: &Address,
        session_id: SessionId,
        final_commitment: Commitment,
        final_score: u32,
    ) -> Result<TxReceipt, LedgerError> {
        self.begin_write(WriteKind::SubmitScore).await?;

        let mut state = self.state.lock().await;
        let owner = state
            .games
            .get(&session_id)
            .map(|game| game.player)
            .ok_or_else(|| LedgerError::Rejected(format!("game {} does not exist", session_id)))?;

        if owner != *signer {
            return Err(LedgerError::Rejected(format!(
                "{} is not the player of game {}",
                signer, session_id
            )));
        }

        let block_number = state.head + 1;
        let record = ScoreRecord {
            session_id,
            player: *signer,
            final_commitment,
            final_score,
            block_number,
        };
        state.scores.push(record.clone());

        let receipt = state.mine(vec![LedgerEvent::ScoreSubmitted(record)]);
        debug!("score {} for game {} in block {}", final_score, session_id, receipt.block_number);
        Ok(receipt)
    }
}

#[async_trait]
impl LedgerReader for InMemoryLedger {
    async fn block_number(&self) -> Result<BlockNumber, LedgerError> {
        let mut state = self.state.lock().await;
        state.counters.block_number += 1;

        if state.faults.head_failure {
            return Err(LedgerError::Transport("head unavailable".to_string()));
        }
        Ok(state.head)
    }

    async fn score_events(
        &self,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<ScoreRecord>, LedgerError> {
        let mut state = self.state.lock().await;
        state.counters.score_events += 1;

        if from <= to && state.faults.failing_blocks.range(from..=to).next().is_some() {
            return Err(LedgerError::RangeUnavailable {
                from,
                to,
                reason: "injected failure".to_string(),
            });
        }

        Ok(state
            .scores
            .iter()
            .filter(|record| (from..=to).contains(&record.block_number))
            .cloned()
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
