//! Pool configuration
//!
//! Loaded from TOML, from the environment, or built in code. The two
//! amortization knobs (`failed_threshold`, `large_scan_limit`) are copied
//! into the pool head at creation and stay fixed for the pool's lifetime.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Page size used to cap the small-object threshold
pub const PAGE_SIZE: usize = 4096;

/// Default pool (and block) size: 16 KiB
pub const DEFAULT_POOL_SIZE: usize = 16 * 1024;

/// Block misses tolerated before `current` skips a block
pub const DEFAULT_FAILED_THRESHOLD: u32 = 4;

/// Large-allocation records inspected for a reusable tombstone
pub const DEFAULT_LARGE_SCAN_LIMIT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Size of the first block and of every block grown after it
    #[serde(default = "default_size")]
    pub size: usize,

    /// Upper bound for the small-object threshold
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_failed_threshold")]
    pub failed_threshold: u32,

    #[serde(default = "default_large_scan_limit")]
    pub large_scan_limit: usize,
}

fn default_size() -> usize { DEFAULT_POOL_SIZE }
fn default_page_size() -> usize { PAGE_SIZE }
fn default_failed_threshold() -> u32 { DEFAULT_FAILED_THRESHOLD }
fn default_large_scan_limit() -> usize { DEFAULT_LARGE_SCAN_LIMIT }

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_POOL_SIZE,
            page_size: PAGE_SIZE,
            failed_threshold: DEFAULT_FAILED_THRESHOLD,
            large_scan_limit: DEFAULT_LARGE_SCAN_LIMIT,
        }
    }
}

impl PoolConfig {
    pub fn new(size: usize) -> Self {
        Self { size, ..Self::default() }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_failed_threshold(mut self, threshold: u32) -> Self {
        self.failed_threshold = threshold;
        self
    }

    pub fn with_large_scan_limit(mut self, limit: usize) -> Self {
        self.large_scan_limit = limit;
        self
    }

    /// Use the page size reported by the operating system
    pub fn with_system_page_size(self) -> Self {
        self.with_page_size(system_page_size())
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `REGIONPOOL_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(size) = env_var("REGIONPOOL_SIZE")? {
            config.size = size;
        }
        if let Some(page_size) = env_var("REGIONPOOL_PAGE_SIZE")? {
            config.page_size = page_size;
        }
        if let Some(threshold) = env_var("REGIONPOOL_FAILED_THRESHOLD")? {
            config.failed_threshold = threshold;
        }
        if let Some(limit) = env_var("REGIONPOOL_LARGE_SCAN_LIMIT")? {
            config.large_scan_limit = limit;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be non-zero".into()));
        }
        if self.size == 0 {
            return Err(ConfigError::Invalid("size must be non-zero".into()));
        }
        Ok(())
    }

    /// Serialize back to TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self)
            .unwrap_or_else(|_| String::from("# Failed to generate config"))
    }
}

fn env_var<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{key}={raw} is not a valid number"))),
        Err(_) => Ok(None),
    }
}

/// Page size reported by the OS, falling back to [`PAGE_SIZE`]
#[cfg(unix)]
pub fn system_page_size() -> usize {
    // SAFETY: sysconf has no preconditions
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as usize } else { PAGE_SIZE }
}

#[cfg(not(unix))]
pub fn system_page_size() -> usize {
    PAGE_SIZE
}
