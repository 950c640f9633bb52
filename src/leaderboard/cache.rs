//! Leaderboard Cache
//!
//! One slot holding the last computed leaderboard and when it was computed.
//! Freshness is decided by the caller against its own TTL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::leaderboard::LeaderboardEntry;

/// Cache errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Reading or writing the backing store failed.
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored record could not be decoded.
    #[error("cache corrupted: {0}")]
    Corrupted(String),
}

/// A computed leaderboard snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// When the snapshot was computed.
    pub computed_at: DateTime<Utc>,
    /// Ranked entries.
    pub entries: Vec<LeaderboardEntry>,
}

impl CacheRecord {
    /// Snapshot computed now.
    pub fn new(entries: Vec<LeaderboardEntry>) -> Self {
        Self {
            computed_at: Utc::now(),
            entries,
        }
    }

    /// Age at `now`. A timestamp in the future counts as age zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.computed_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the snapshot is younger than `ttl` at `now`.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) < ttl
    }
}

/// Storage for the single cached snapshot.
#[async_trait]
pub trait LeaderboardCache: Send + Sync {
    /// Stored snapshot, `None` when absent.
    async fn get(&self) -> Result<Option<CacheRecord>, CacheError>;

    /// Replace the stored snapshot.
    async fn put(&self, record: &CacheRecord) -> Result<(), CacheError>;
}

// =============================================================================
// FILE CACHE
// =============================================================================

/// JSON file cache.
///
/// Each write goes to its own uniquely named sibling temp file that is then
/// renamed over the target, so readers never observe a half-written record
/// even when refreshes overlap.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    /// Cache stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "leaderboard.json".into());
        name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl LeaderboardCache for FileCache {
    async fn get(&self) -> Result<Option<CacheRecord>, CacheError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io(e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CacheError::Corrupted(format!("{}: {}", self.path.display(), e)))
    }

    async fn put(&self, record: &CacheRecord) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec(record)
            .map_err(|e| CacheError::Corrupted(e.to_string()))?;

        let temp = self.temp_path();
        let written = match tokio::fs::write(&temp, json).await {
            Ok(()) => tokio::fs::rename(&temp, &self.path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(CacheError::Io(e));
        }

        debug!("Leaderboard cache written to {}", self.path.display());
        Ok(())
    }
}

// =============================================================================
// MEMORY CACHE
// =============================================================================

/// Process-local cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    slot: RwLock<Option<CacheRecord>>,
}

impl MemoryCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-loaded with `record`.
    pub fn with_record(record: CacheRecord) -> Self {
        Self {
            slot: RwLock::new(Some(record)),
        }
    }
}

#[async_trait]
impl LeaderboardCache for MemoryCache {
    async fn get(&self) -> Result<Option<CacheRecord>, CacheError> {
        Ok(self.slot.read().await.clone())
    }

    async fn put(&self, record: &CacheRecord) -> Result<(), CacheError> {
        *self.slot.write().await = Some(record.clone());
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
