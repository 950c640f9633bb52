//! Leaderboard Aggregator
//!
//! Rebuilds the global leaderboard from `ScoreSubmitted` history and serves it
//! from a time-boxed cache.
//!
//! ```text
//!   get_leaderboard()
//!     ├── cache fresh? ───────────────────────────▶ cached entries
//!     └── refresh()
//!           ├── block_number()        (fails → stale cache or [])
//!           ├── scan deploy_block..=head in windows, skipping failures
//!           ├── max score per player, ranked
//!           └── cache.put()
//! ```
//!
//! Reads only. Never writes to the ledger.

pub mod cache;
pub mod scan;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::LeaderboardConfig;
use crate::ledger::{Address, BlockNumber, LedgerReader, ScoreRecord};

pub use cache::{CacheError, CacheRecord, FileCache, LeaderboardCache, MemoryCache};
pub use scan::{scan_score_events, BlockRanges, ScanError, ScanOutcome, ScanPolicy};

/// One ranked player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Player address, canonical lowercase form.
    pub player: Address,
    /// Best final score.
    pub score: u32,
}

/// Result of a forced rescan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Ranked entries.
    pub entries: Vec<LeaderboardEntry>,
    /// Windows that failed and were skipped.
    pub failed_ranges: Vec<(BlockNumber, BlockNumber)>,
    /// Score records read.
    pub events_seen: usize,
    /// Chain head the scan ran up to.
    pub head: BlockNumber,
}

/// Reduce score records to one entry per player, ranked by score.
///
/// Each player keeps their maximum score. Equal scores keep the order in
/// which the players were first seen.
pub fn aggregate(records: &[ScoreRecord]) -> Vec<LeaderboardEntry> {
    let mut index: BTreeMap<Address, usize> = BTreeMap::new();
    let mut entries: Vec<LeaderboardEntry> = Vec::new();

    for record in records {
        match index.get(&record.player) {
            Some(&i) => {
                let entry = &mut entries[i];
                entry.score = entry.score.max(record.final_score);
            }
            None => {
                index.insert(record.player, entries.len());
                entries.push(LeaderboardEntry {
                    player: record.player,
                    score: record.final_score,
                });
            }
        }
    }

    // Stable sort: ties stay in first-seen order.
    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries
}

/// Pull-based leaderboard over a ledger reader and a cache.
pub struct LeaderboardAggregator {
    reader: Arc<dyn LedgerReader>,
    cache: Arc<dyn LeaderboardCache>,
    deploy_block: BlockNumber,
    policy: ScanPolicy,
    ttl: Duration,
}

impl LeaderboardAggregator {
    /// Create an aggregator.
    pub fn new(
        reader: Arc<dyn LedgerReader>,
        cache: Arc<dyn LeaderboardCache>,
        config: &LeaderboardConfig,
    ) -> Self {
        Self {
            reader,
            cache,
            deploy_block: config.deploy_block,
            policy: ScanPolicy::from(config),
            ttl: config.cache_ttl,
        }
    }

    /// Cache time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Ranked leaderboard. Never fails.
    ///
    /// A fresh cached snapshot is returned without touching the ledger.
    /// Otherwise the ledger is rescanned; if even the chain head is
    /// unavailable, the last snapshot (however old) or an empty list is
    /// returned.
    // TODO: single-flight concurrent misses so only one scan runs at a time.
    pub async fn get_leaderboard(&self) -> Vec<LeaderboardEntry> {
        let cached = self.load_cached().await;

        if let Some(record) = &cached {
            if record.is_fresh(self.ttl, Utc::now()) {
                debug!("Leaderboard served from cache ({} entries)", record.entries.len());
                return record.entries.clone();
            }
        }

        match self.refresh().await {
            Ok(report) => report.entries,
            Err(e) => {
                warn!("Leaderboard refresh failed: {}", e);
                cached.map(|record| record.entries).unwrap_or_default()
            }
        }
    }

    /// Rescan the ledger, persist the result, and report what happened.
    ///
    /// Fails only when the chain head cannot be read; nothing is cached then.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<ScanReport, ScanError> {
        let head = self
            .reader
            .block_number()
            .await
            .map_err(ScanError::HeadUnavailable)?;

        let outcome =
            scan_score_events(self.reader.as_ref(), self.deploy_block, head, self.policy).await;
        let entries = aggregate(&outcome.records);

        let record = CacheRecord::new(entries.clone());
        if let Err(e) = self.cache.put(&record).await {
            warn!("Failed to write leaderboard cache: {}", e);
        }

        let report = ScanReport {
            entries,
            failed_ranges: outcome.failed_ranges(),
            events_seen: outcome.records.len(),
            head,
        };

        info!(
            "Leaderboard rebuilt to block {}: {} players from {} events, {} windows skipped",
            head,
            report.entries.len(),
            report.events_seen,
            report.failed_ranges.len()
        );

        Ok(report)
    }

    /// Cached snapshot regardless of age; errors count as a miss.
    async fn load_cached(&self) -> Option<CacheRecord> {
        match self.cache.get().await {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring leaderboard cache: {}", e);
                None
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::Commitment;
    use crate::ledger::InMemoryLedger;

    fn player(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn record(p: Address, score: u32, block: BlockNumber) -> ScoreRecord {
        ScoreRecord {
            session_id: block,
            player: p,
            final_commitment: Commitment::default(),
            final_score: score,
            block_number: block,
        }
    }

    fn test_config() -> LeaderboardConfig {
        LeaderboardConfig {
            deploy_block: 0,
            block_step: 10,
            scan_delay: Duration::ZERO,
            cache_ttl: Duration::from_secs(300),
            ..Default::default()
        }
    }

    fn aggregator(
        ledger: &InMemoryLedger,
        cache: Arc<dyn LeaderboardCache>,
        config: &LeaderboardConfig,
    ) -> LeaderboardAggregator {
        LeaderboardAggregator::new(Arc::new(ledger.clone()), cache, config)
    }

    #[test]
    fn test_aggregate_keeps_max_per_player() {
        let records = vec![
            record(player(1), 100, 1),
            record(player(1), 50, 2),
            record(player(2), 200, 3),
        ];

        assert_eq!(
            aggregate(&records),
            vec![
                LeaderboardEntry { player: player(2), score: 200 },
                LeaderboardEntry { player: player(1), score: 100 },
            ]
        );
    }

    #[test]
    fn test_aggregate_ties_keep_first_seen_order() {
        let records = vec![
            record(player(9), 64, 1),
            record(player(3), 128, 2),
            record(player(5), 64, 3),
            record(player(9), 32, 4),
        ];

        let players: Vec<_> = aggregate(&records).into_iter().map(|e| e.player).collect();
        assert_eq!(players, vec![player(3), player(9), player(5)]);
    }

    #[test]
    fn test_aggregate_normalizes_case() {
        let upper: Address = "0xABCDEF0123456789ABCDEF0123456789ABCDEF01".parse().unwrap();
        let lower: Address = "0xabcdef0123456789abcdef0123456789abcdef01".parse().unwrap();
        let records = vec![record(upper, 10, 1), record(lower, 30, 2)];

        let entries = aggregate(&records);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].score, 30);
    }

    #[tokio::test]
    async fn test_second_read_within_ttl_hits_cache() {
        let ledger = InMemoryLedger::new();
        ledger.record_game(&player(1), 100).await.unwrap();
        ledger.record_game(&player(1), 50).await.unwrap();
        ledger.record_game(&player(2), 200).await.unwrap();

        let agg = aggregator(&ledger, Arc::new(MemoryCache::new()), &test_config());

        let first = agg.get_leaderboard().await;
        let reads_after_first = ledger.counters().await.reads();
        let second = agg.get_leaderboard().await;

        assert_eq!(
            first,
            vec![
                LeaderboardEntry { player: player(2), score: 200 },
                LeaderboardEntry { player: player(1), score: 100 },
            ]
        );
        assert_eq!(first, second);
        assert_eq!(ledger.counters().await.reads(), reads_after_first);
    }

    #[tokio::test]
    async fn test_expired_record_triggers_rescan() {
        let ledger = InMemoryLedger::new();
        ledger.record_game(&player(1), 512).await.unwrap();

        let stale = CacheRecord {
            computed_at: Utc::now() - chrono::Duration::minutes(10),
            entries: vec![LeaderboardEntry { player: player(8), score: 8 }],
        };
        let cache = Arc::new(MemoryCache::with_record(stale));
        let agg = aggregator(&ledger, cache.clone(), &test_config());

        let entries = agg.get_leaderboard().await;

        assert_eq!(entries, vec![LeaderboardEntry { player: player(1), score: 512 }]);
        let stored = cache.get().await.unwrap().unwrap();
        assert_eq!(stored.entries, entries);
    }

    #[tokio::test]
    async fn test_corrupted_file_cache_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaderboard.json");
        std::fs::write(&path, b"not json").unwrap();

        let ledger = InMemoryLedger::new();
        ledger.record_game(&player(4), 1024).await.unwrap();
        let agg = aggregator(&ledger, Arc::new(FileCache::new(&path)), &test_config());

        let entries = agg.get_leaderboard().await;

        assert_eq!(entries, vec![LeaderboardEntry { player: player(4), score: 1024 }]);
        assert!(ledger.counters().await.score_events > 0);

        // The rescan replaced the corrupted file.
        let repaired = FileCache::new(&path).get().await.unwrap().unwrap();
        assert_eq!(repaired.entries, entries);
    }

    #[tokio::test]
    async fn test_failing_window_still_aggregates_rest() {
        let ledger = InMemoryLedger::new();
        ledger.record_game(&player(1), 100).await.unwrap(); // score in block 2
        ledger.record_game(&player(2), 200).await.unwrap(); // score in block 4
        ledger.fail_range_containing(2).await;

        let config = LeaderboardConfig { block_step: 2, ..test_config() };
        let agg = aggregator(&ledger, Arc::new(MemoryCache::new()), &config);

        let report = agg.refresh().await.unwrap();

        assert_eq!(report.head, 4);
        assert_eq!(report.failed_ranges, vec![(2, 3)]);
        assert_eq!(report.events_seen, 1);
        assert_eq!(report.entries, vec![LeaderboardEntry { player: player(2), score: 200 }]);
    }

    #[tokio::test]
    async fn test_head_failure_returns_stale_snapshot() {
        let ledger = InMemoryLedger::new();
        ledger.set_head_failure(true).await;

        let computed_at = Utc::now() - chrono::Duration::hours(1);
        let stale = CacheRecord {
            computed_at,
            entries: vec![LeaderboardEntry { player: player(6), score: 66 }],
        };
        let cache = Arc::new(MemoryCache::with_record(stale.clone()));
        let agg = aggregator(&ledger, cache.clone(), &test_config());

        assert_eq!(agg.get_leaderboard().await, stale.entries);
        // Nothing written.
        assert_eq!(cache.get().await.unwrap(), Some(stale));
        assert!(matches!(agg.refresh().await, Err(ScanError::HeadUnavailable(_))));
    }

    #[tokio::test]
    async fn test_head_failure_without_cache_is_empty() {
        let ledger = InMemoryLedger::new();
        ledger.set_head_failure(true).await;
        let cache = Arc::new(MemoryCache::new());
        let agg = aggregator(&ledger, cache.clone(), &test_config());

        assert!(agg.get_leaderboard().await.is_empty());
        assert!(cache.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scan_starts_at_deploy_block() {
        let ledger = InMemoryLedger::new();
        ledger.record_game(&player(1), 100).await.unwrap(); // block 2
        ledger.record_game(&player(2), 200).await.unwrap(); // block 4

        let config = LeaderboardConfig { deploy_block: 3, ..test_config() };
        let agg = aggregator(&ledger, Arc::new(MemoryCache::new()), &config);

        let report = agg.refresh().await.unwrap();
        assert_eq!(report.entries, vec![LeaderboardEntry { player: player(2), score: 200 }]);
    }
}
