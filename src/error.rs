//! Error types for pool operations and configuration loading

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by pool operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The system allocator could not satisfy the request
    #[error("allocation of {size} bytes failed")]
    AllocationFailure { size: usize },

    /// `free_large` was given a pointer the pool does not track
    #[error("pointer {addr:#x} is not a live large allocation of this pool")]
    NotFound { addr: usize },

    /// A typed helper was asked for a type aligned beyond the pool boundary
    #[error("alignment {align} exceeds pool alignment {max}")]
    UnsupportedAlignment { align: usize, max: usize },
}

impl PoolError {
    #[inline]
    pub(crate) fn alloc(size: usize) -> Self {
        Self::AllocationFailure { size }
    }
}

/// Errors raised while loading a [`PoolConfig`](crate::config::PoolConfig)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T, E = PoolError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_context() {
        let err = PoolError::alloc(4096);
        assert_eq!(err.to_string(), "allocation of 4096 bytes failed");

        let err = PoolError::NotFound { addr: 0x1000 };
        assert!(err.to_string().contains("0x1000"));

        let err = ConfigError::Invalid("page_size must be non-zero".into());
        assert_eq!(err.to_string(), "invalid config: page_size must be non-zero");
    }
}
