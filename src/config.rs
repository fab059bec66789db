//! Pool configuration.
//!
//! Loaded from TOML or assembled with the builder-style setters:
//!
//! ```toml
//! pool_size = 8
//! max_wait_time_secs = 5.0
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 100
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{TabError, TabResult};

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 60;
/// Default wait for a free connection, in seconds.
pub const DEFAULT_MAX_WAIT_TIME_SECS: f64 = 60.0;
/// Default backing file name prefix.
pub const DEFAULT_FILE_PREFIX: &str = "tabquery_duckdb";

/// Connection pool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of concurrent connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Seconds a caller blocks waiting for a free connection.
    #[serde(default = "default_max_wait_time_secs")]
    pub max_wait_time_secs: f64,

    /// Directory for the backing file (system temp dir when unset).
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Backing file name prefix.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Explicit backing file; overrides `temp_dir` and `file_prefix`.
    /// The pool owns it and deletes it on close.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Table materialization retry policy.
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Retry policy for table materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    /// Attempts before the backend error is surfaced.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_max_wait_time_secs() -> f64 {
    DEFAULT_MAX_WAIT_TIME_SECS
}

fn default_file_prefix() -> String {
    DEFAULT_FILE_PREFIX.to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    100
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Backoff after a catalog conflict: `base * 2^attempt`.
    pub fn conflict_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    /// Backoff after any other failure: `base * (attempt + 1)`.
    pub fn linear_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(u64::from(attempt).saturating_add(1)),
        )
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            max_wait_time_secs: DEFAULT_MAX_WAIT_TIME_SECS,
            temp_dir: None,
            file_prefix: default_file_prefix(),
            database_path: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl PoolConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> TabResult<Self> {
        let config: PoolConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> TabResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Set the pool size.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the acquisition wait time.
    pub fn max_wait_time(mut self, wait: Duration) -> Self {
        self.max_wait_time_secs = wait.as_secs_f64();
        self
    }

    /// Set the directory that holds the backing file.
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Set an explicit backing file.
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Set the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Acquisition wait as a `Duration`.
    pub fn wait_duration(&self) -> Duration {
        Duration::from_secs_f64(self.max_wait_time_secs)
    }

    /// Check value ranges.
    pub fn validate(&self) -> TabResult<()> {
        if self.pool_size == 0 {
            return Err(TabError::Config(
                "pool_size must be greater than zero".to_string(),
            ));
        }
        if !self.max_wait_time_secs.is_finite() || self.max_wait_time_secs <= 0.0 {
            return Err(TabError::Config(format!(
                "max_wait_time_secs must be a positive number, got {}",
                self.max_wait_time_secs
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(TabError::Config(
                "retry.max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.file_prefix.is_empty() && self.database_path.is_none() {
            return Err(TabError::Config("file_prefix must not be empty".to_string()));
        }
        Ok(())
    }

    /// Backing file for this process, optionally suffixed with a pool sequence.
    pub fn backing_path(&self, sequence: Option<u64>) -> PathBuf {
        if let Some(path) = &self.database_path {
            return path.clone();
        }
        let dir = self.temp_dir.clone().unwrap_or_else(std::env::temp_dir);
        let pid = std::process::id();
        let name = match sequence {
            Some(seq) => format!("{}_{}_{}.duckdb", self.file_prefix, pid, seq),
            None => format!("{}_{}.duckdb", self.file_prefix, pid),
        };
        dir.join(name)
    }
}
