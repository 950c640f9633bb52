//! Configuration
//!
//! Every setting has a default and can be overridden through a `BA2048_*`
//! environment variable:
//!
//! | Variable | Default |
//! | --- | --- |
//! | `BA2048_RPC_URL` | `https://mainnet.base.org` |
//! | `BA2048_CONTRACT_ADDRESS` | unset |
//! | `BA2048_DEPLOY_BLOCK` | `37603623` |
//! | `BA2048_BLOCK_STEP` | `20000` |
//! | `BA2048_SCAN_DELAY_MS` | `150` |
//! | `BA2048_CACHE_TTL_SECS` | `300` |
//! | `BA2048_CACHE_PATH` | `<tmp>/leaderboard.json` |
//! | `BA2048_FINALITY_TIMEOUT_SECS` | `120` |
//! | `BA2048_BIND_ADDR` | `0.0.0.0:8080` |
//! | `BA2048_MAX_CONNECTIONS` | `1000` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::ledger::{Address, BlockNumber};

/// Block the score contract was deployed at.
pub const DEFAULT_DEPLOY_BLOCK: BlockNumber = 37_603_623;

/// Blocks per `eth_getLogs` request.
pub const DEFAULT_BLOCK_STEP: u64 = 20_000;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Variable present but unparsable.
    #[error("invalid value for {key}: {value:?}")]
    Parse {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },

    /// Required setting absent.
    #[error("missing required setting {0}")]
    Missing(&'static str),

    /// Setting parsed but out of range.
    #[error("invalid setting {key}: {reason}")]
    Invalid {
        /// Setting name.
        key: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Ledger endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    /// Score contract. Required to read the leaderboard from a live chain.
    pub contract_address: Option<Address>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://mainnet.base.org".to_string(),
            contract_address: None,
        }
    }
}

impl LedgerConfig {
    /// Load from `BA2048_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(url) = lookup("BA2048_RPC_URL") {
            config.rpc_url = url;
        }
        if let Some(address) = read_var(lookup, "BA2048_CONTRACT_ADDRESS")? {
            config.contract_address = Some(address);
        }
        Ok(config)
    }

    /// The contract address, or `Missing`.
    pub fn contract(&self) -> Result<Address, ConfigError> {
        self.contract_address
            .ok_or(ConfigError::Missing("BA2048_CONTRACT_ADDRESS"))
    }

    /// Check settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.rpc_url.starts_with("http://") || self.rpc_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "BA2048_RPC_URL",
                reason: "must be an http(s) URL".to_string(),
            });
        }
        Ok(())
    }
}

/// Leaderboard scan and cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardConfig {
    /// First block to scan.
    pub deploy_block: BlockNumber,
    /// Blocks per sub-range request.
    pub block_step: u64,
    /// Pause between consecutive sub-range requests.
    pub scan_delay: Duration,
    /// How long a cached leaderboard is served.
    pub cache_ttl: Duration,
    /// Cache file location.
    pub cache_path: PathBuf,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            deploy_block: DEFAULT_DEPLOY_BLOCK,
            block_step: DEFAULT_BLOCK_STEP,
            scan_delay: Duration::from_millis(150),
            cache_ttl: Duration::from_secs(5 * 60),
            cache_path: std::env::temp_dir().join("leaderboard.json"),
        }
    }
}

impl LeaderboardConfig {
    /// Load from `BA2048_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(block) = read_var(lookup, "BA2048_DEPLOY_BLOCK")? {
            config.deploy_block = block;
        }
        if let Some(step) = read_var(lookup, "BA2048_BLOCK_STEP")? {
            config.block_step = step;
        }
        if let Some(ms) = read_var(lookup, "BA2048_SCAN_DELAY_MS")? {
            config.scan_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = read_var(lookup, "BA2048_CACHE_TTL_SECS")? {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(path) = lookup("BA2048_CACHE_PATH") {
            config.cache_path = PathBuf::from(path);
        }
        Ok(config)
    }

    /// Check settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_step == 0 {
            return Err(ConfigError::Invalid {
                key: "BA2048_BLOCK_STEP",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::Invalid {
                key: "BA2048_CACHE_TTL_SECS",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Session client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long to wait for a ledger write to finalize.
    pub finality_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            finality_timeout: Duration::from_secs(120),
        }
    }
}

impl SessionConfig {
    /// Load from `BA2048_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(secs) = read_var(lookup, "BA2048_FINALITY_TIMEOUT_SECS")? {
            config.finality_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Check settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.finality_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "BA2048_FINALITY_TIMEOUT_SECS",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Read-path server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Entries returned when a request gives no limit.
    pub default_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            default_limit: 100,
        }
    }
}

impl ServerConfig {
    /// Load from `BA2048_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(addr) = read_var(lookup, "BA2048_BIND_ADDR")? {
            config.bind_addr = addr;
        }
        if let Some(max) = read_var(lookup, "BA2048_MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        Ok(config)
    }

    /// Check settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "BA2048_MAX_CONNECTIONS",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// All settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Ledger endpoint.
    pub ledger: LedgerConfig,
    /// Leaderboard scan and cache.
    pub leaderboard: LeaderboardConfig,
    /// Session client.
    pub session: SessionConfig,
    /// Read-path server.
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load every section from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            ledger: LedgerConfig::from_lookup(lookup)?,
            leaderboard: LeaderboardConfig::from_lookup(lookup)?,
            session: SessionConfig::from_lookup(lookup)?,
            server: ServerConfig::from_lookup(lookup)?,
        })
    }

    /// Check every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ledger.validate()?;
        self.leaderboard.validate()?;
        self.session.validate()?;
        self.server.validate()
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn read_var<T: FromStr>(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Parse { key, value }),
    }
}

// =============================================================================
// TESTS
// =============================================================================
