//! Regionpool - region-based memory pool
//!
//! Callers draw memory from a [`Pool`] instead of the general-purpose
//! allocator and release it all at once: small objects bump-allocate
//! from a chain of blocks, large ones are tracked on a side list, and
//! cleanup callbacks release foreign resources at teardown.
//!
//! ```
//! use regionpool::Pool;
//!
//! let mut pool = Pool::create(4096)?;
//! let header = pool.alloc(64)?;
//! let name = pool.alloc_str("access.log")?;
//! pool.on_destroy(|| println!("pool released"))?;
//! # let _ = (header, name);
//! pool.destroy();
//! # Ok::<(), regionpool::PoolError>(())
//! ```

pub mod config;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod pool;

// Re-export core types
pub use config::{PoolConfig, DEFAULT_POOL_SIZE, PAGE_SIZE};
pub use error::{ConfigError, PoolError, Result};
pub use pool::{BlockInfo, Cleanup, CleanupHandler, Pool, PoolStats, MIN_POOL_SIZE, POOL_ALIGNMENT};
