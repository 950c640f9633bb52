//! Sub-Range Scanning
//!
//! Historical log queries are split into fixed-size block windows and issued
//! one after another with a pause in between, so the node sees a bounded
//! request rate. A window that fails is skipped and reported.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::config::LeaderboardConfig;
use crate::ledger::{BlockNumber, LedgerError, LedgerReader, ScoreRecord};

/// Scan errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    /// One sub-range could not be read and was skipped.
    #[error("partial scan: blocks {from}..={to} skipped: {source}")]
    PartialScan {
        /// First block of the window.
        from: BlockNumber,
        /// Last block of the window.
        to: BlockNumber,
        /// Underlying failure.
        source: LedgerError,
    },

    /// The chain head could not be read, so nothing was scanned.
    #[error("chain head unavailable: {0}")]
    HeadUnavailable(LedgerError),
}

/// Window size and pacing for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPolicy {
    /// Blocks per request.
    pub block_step: u64,
    /// Pause between consecutive requests.
    pub delay: Duration,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            block_step: 20_000,
            delay: Duration::from_millis(150),
        }
    }
}

impl From<&LeaderboardConfig> for ScanPolicy {
    fn from(config: &LeaderboardConfig) -> Self {
        Self {
            block_step: config.block_step,
            delay: config.scan_delay,
        }
    }
}

/// Consecutive inclusive windows `[from, to]` covering a block span.
#[derive(Debug, Clone)]
pub struct BlockRanges {
    next: BlockNumber,
    end: BlockNumber,
    step: u64,
    done: bool,
}

impl BlockRanges {
    /// Windows of `step` blocks covering `from..=to`. Empty when `from > to`.
    pub fn new(from: BlockNumber, to: BlockNumber, step: u64) -> Self {
        Self {
            next: from,
            end: to,
            step: step.max(1),
            done: from > to,
        }
    }
}

impl Iterator for BlockRanges {
    type Item = (BlockNumber, BlockNumber);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let from = self.next;
        let to = from.saturating_add(self.step - 1).min(self.end);
        if to >= self.end {
            self.done = true;
        } else {
            self.next = to + 1;
        }
        Some((from, to))
    }
}

/// Records gathered by one scan, plus the windows that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Records from every successful window, in block order.
    pub records: Vec<ScoreRecord>,
    /// Skipped windows.
    pub failures: Vec<ScanError>,
    /// Windows requested.
    pub windows: usize,
}

impl ScanOutcome {
    /// `(from, to)` of every skipped window.
    pub fn failed_ranges(&self) -> Vec<(BlockNumber, BlockNumber)> {
        self.failures
            .iter()
            .filter_map(|failure| match failure {
                ScanError::PartialScan { from, to, .. } => Some((*from, *to)),
                ScanError::HeadUnavailable(_) => None,
            })
            .collect()
    }
}

/// Read every `ScoreSubmitted` record in `from..=head`, window by window.
#[instrument(skip(reader))]
pub async fn scan_score_events(
    reader: &dyn LedgerReader,
    from: BlockNumber,
    head: BlockNumber,
    policy: ScanPolicy,
) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();

    for (i, (start, end)) in BlockRanges::new(from, head, policy.block_step).enumerate() {
        if i > 0 && !policy.delay.is_zero() {
            tokio::time::sleep(policy.delay).await;
        }
        outcome.windows += 1;

        match reader.score_events(start, end).await {
            Ok(records) => {
                debug!("blocks {}..={}: {} records", start, end, records.len());
                outcome.records.extend(records);
            }
            Err(source) => {
                let failure = ScanError::PartialScan { from: start, to: end, source };
                warn!("{}", failure);
                outcome.failures.push(failure);
            }
        }
    }

    outcome
}

// =============================================================================
// TESTS
// =============================================================================
