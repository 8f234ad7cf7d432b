//! Configuration for RoseKV
//!
//! Centralized configuration with sensible defaults. The engine saves the
//! configuration it ran with to `{dir_path}/DB.CFG` (JSON) when it closes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoseError};

/// File the engine writes its configuration to on close
pub const CONFIG_FILE: &str = "DB.CFG";

/// Main configuration for a RoseKV instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all segment files
    /// Internal structure:
    ///   {dir_path}/
    ///     ├── 000000000.data.str   (one file per type and generation)
    ///     ├── DB.CFG               (saved config)
    ///     └── rosedb_merge/        (merge output in progress)
    pub dir_path: PathBuf,

    /// Segment rotation threshold in bytes
    pub block_size: u64,

    /// How segment bytes are read and written
    pub rw_method: RwMethod,

    /// Whether string values live in memory or only their locators
    pub idx_mode: IndexMode,

    /// fsync the active segment after every write
    pub sync: bool,

    // -------------------------------------------------------------------------
    // Limits
    // -------------------------------------------------------------------------
    pub max_key_size: u32,
    pub max_value_size: u32,

    // -------------------------------------------------------------------------
    // Merge Configuration
    // -------------------------------------------------------------------------
    /// Minimum number of archived segments of one type before a merge runs
    pub merge_threshold: usize,

    /// How often the background ticker attempts a merge
    pub merge_check_interval: Duration,

    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// LRU capacity for string values in key-only mode (0 disables the cache)
    pub cache_capacity: usize,
}

/// Segment I/O strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RwMethod {
    /// Positioned reads and writes on the file descriptor
    FileIo,

    /// The file is pre-sized to `block_size` and memory mapped
    MMap,
}

/// String index mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexMode {
    /// Keys and values are both held in memory
    KeyValueMem,

    /// Only keys and disk locators are held; values are read from segments
    KeyOnlyMem,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir_path: PathBuf::from("/tmp/rosedb"),
            block_size: 16 * 1024 * 1024, // 16 MB
            rw_method: RwMethod::FileIo,
            idx_mode: IndexMode::KeyValueMem,
            sync: false,
            max_key_size: 1024 * 1024,       // 1 MB
            max_value_size: 8 * 1024 * 1024, // 8 MB
            merge_threshold: 10,
            merge_check_interval: Duration::from_secs(24 * 60 * 60),
            cache_capacity: 0,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that every parameter is usable
    pub fn validate(&self) -> Result<()> {
        if self.dir_path.as_os_str().is_empty() {
            return Err(RoseError::Config("dir_path cannot be empty".to_string()));
        }
        if self.block_size == 0 {
            return Err(RoseError::Config("block_size must be positive".to_string()));
        }
        if self.max_key_size == 0 || self.max_value_size == 0 {
            return Err(RoseError::Config(
                "max_key_size and max_value_size must be positive".to_string(),
            ));
        }
        if self.merge_threshold == 0 {
            return Err(RoseError::Config("merge_threshold must be at least 1".to_string()));
        }
        if self.merge_check_interval.is_zero() {
            return Err(RoseError::Config(
                "merge_check_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Write this config as JSON to `{dir_path}/DB.CFG`
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(self.dir_path.join(CONFIG_FILE), json)?;
        Ok(())
    }

    /// Read the config saved by the last clean close of the database in `dir`
    pub fn load_saved(dir: &Path) -> Result<Self> {
        let raw = fs::read(dir.join(CONFIG_FILE))?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database directory
    pub fn dir_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.dir_path = path.into();
        self
    }

    /// Set the segment rotation threshold (in bytes)
    pub fn block_size(mut self, size: u64) -> Self {
        self.config.block_size = size;
        self
    }

    /// Set the segment I/O strategy
    pub fn rw_method(mut self, method: RwMethod) -> Self {
        self.config.rw_method = method;
        self
    }

    /// Set the string index mode
    pub fn idx_mode(mut self, mode: IndexMode) -> Self {
        self.config.idx_mode = mode;
        self
    }

    /// fsync after every write
    pub fn sync(mut self, sync: bool) -> Self {
        self.config.sync = sync;
        self
    }

    /// Set the maximum key size (in bytes)
    pub fn max_key_size(mut self, size: u32) -> Self {
        self.config.max_key_size = size;
        self
    }

    /// Set the maximum value size (in bytes)
    pub fn max_value_size(mut self, size: u32) -> Self {
        self.config.max_value_size = size;
        self
    }

    /// Set the archived segment count that triggers a merge
    pub fn merge_threshold(mut self, threshold: usize) -> Self {
        self.config.merge_threshold = threshold;
        self
    }

    /// Set the background merge interval
    pub fn merge_check_interval(mut self, interval: Duration) -> Self {
        self.config.merge_check_interval = interval;
        self
    }

    /// Set the LRU cache capacity for key-only string reads
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
