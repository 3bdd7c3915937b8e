//! Configuration for BurrowKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for a store instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── snapshots/       (markers for live reader snapshots)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    /// WAL size (in bytes) past which the log is rewritten as a checkpoint
    pub compact_threshold: u64,

    // -------------------------------------------------------------------------
    // Instance Limits
    // -------------------------------------------------------------------------
    /// Limits in force when the store is opened
    pub limits: Limits,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Instance-wide resource thresholds.
///
/// Applied to an open handle with `Handle::set_instance_limits`; they govern
/// operations issued after the call returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    /// Cap on the sum of all stored value lengths. When a write pushes the
    /// total over the cap, least-recently-used keys are evicted.
    pub max_value_length_sum: Option<u64>,
}

impl Limits {
    /// No caps at all
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Cap the total stored value bytes
    pub fn with_max_value_length_sum(mut self, max: u64) -> Self {
        self.max_value_length_sum = Some(max);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./burrowkv_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            compact_threshold: 64 * 1024 * 1024, // 64 MB
            limits: Limits::unlimited(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the WAL checkpoint threshold (in bytes)
    pub fn compact_threshold(mut self, bytes: u64) -> Self {
        self.config.compact_threshold = bytes;
        self
    }

    /// Set the limits applied at open
    pub fn limits(mut self, limits: Limits) -> Self {
        self.config.limits = limits;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
