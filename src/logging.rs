//! Logging infrastructure - structured tracing for pool transitions
//!
//! Design: the library only emits `tracing` events; nothing is printed
//! unless the embedding program installs a subscriber, either its own or
//! the one built by [`init`] / [`init_with_config`].

use once_cell::sync::OnceCell;
use std::io;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

pub use tracing::{debug, error, info, trace, warn, Level};

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Daily-rotated file
    File { directory: String, prefix: String },
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Emit span open/close events
    pub span_events: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // REGIONPOOL_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("REGIONPOOL_LOG_LEVEL") {
            config.level = parse_level(&level);
        }

        if std::env::var("REGIONPOOL_LOG_JSON").is_ok() {
            config.format = LogFormat::Json;
        }

        // REGIONPOOL_LOG_FILE: directory for rotated log files
        if let Ok(directory) = std::env::var("REGIONPOOL_LOG_FILE") {
            config.output = LogOutput::File {
                directory,
                prefix: "regionpool.log".to_string(),
            };
        }

        config
    }

    /// Verbose config for debugging pool behaviour
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            format: LogFormat::Pretty,
            output: LogOutput::Stderr,
            span_events: true,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging from the environment
pub fn init() -> Option<WorkerGuard> {
    init_with_config(LogConfig::from_env())
}

/// Install a global subscriber; later calls are no-ops.
///
/// File output returns a `WorkerGuard` that must stay alive until the
/// program exits so buffered lines are flushed.
pub fn init_with_config(config: LogConfig) -> Option<WorkerGuard> {
    if LOGGER_INITIALIZED.set(()).is_err() {
        return None;
    }

    let (layer, guard) = match &config.output {
        LogOutput::Stdout => (build_layer(io::stdout, &config), None),
        LogOutput::Stderr => (build_layer(io::stderr, &config), None),
        LogOutput::File { directory, prefix } => {
            let appender = rolling::daily(directory, prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (build_layer(writer, &config), Some(guard))
        }
    };

    // Another subscriber may already be installed by the host program
    tracing_subscriber::registry().with(layer).try_init().ok();
    guard
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

fn build_layer<W>(writer: W, config: &LogConfig) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("regionpool={}", config.level.as_str().to_lowercase()))
    });
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_span_events(span_events);

    match config.format {
        LogFormat::Pretty => layer.pretty().with_filter(filter).boxed(),
        LogFormat::Compact => layer.compact().with_filter(filter).boxed(),
        LogFormat::Json => layer.json().with_filter(filter).boxed(),
    }
}

// ============================================================================
// Pool events
// ============================================================================

#[inline]
pub fn log_pool_create(size: usize, max: usize, ptr: *const u8) {
    debug!(
        target: "regionpool::pool",
        size,
        max,
        address = ?ptr,
        "pool created"
    );
}

#[inline]
pub fn log_pool_undersized(requested: usize, rounded: usize) {
    warn!(
        target: "regionpool::pool",
        requested,
        rounded,
        "pool size below minimum, rounding up"
    );
}

#[inline]
pub fn log_block_grow(block_size: usize, ptr: *const u8) {
    debug!(
        target: "regionpool::pool",
        block_size,
        address = ?ptr,
        "block appended to chain"
    );
}

#[inline]
pub fn log_current_advance(failed: u32, ptr: *const u8) {
    trace!(
        target: "regionpool::pool",
        failed,
        skipped = ?ptr,
        "current moved past exhausted block"
    );
}

#[inline]
pub fn log_large_alloc(size: usize, ptr: *const u8, reused_slot: bool) {
    trace!(
        target: "regionpool::large",
        size,
        address = ?ptr,
        reused_slot,
        "large allocation"
    );
}

#[inline]
pub fn log_large_free(size: usize, ptr: *const u8) {
    trace!(
        target: "regionpool::large",
        size,
        address = ?ptr,
        "large allocation freed"
    );
}

#[inline]
pub fn log_reset(blocks: usize, large_freed: usize) {
    debug!(
        target: "regionpool::pool",
        blocks,
        large_freed,
        "pool reset"
    );
}

#[inline]
pub fn log_cleanups_discarded(count: usize, dropped: usize) {
    warn!(
        target: "regionpool::cleanup",
        count,
        dropped,
        "reset discarded cleanup records without running them"
    );
}

#[inline]
pub fn log_cleanup_run(ran: usize, skipped: usize) {
    debug!(
        target: "regionpool::cleanup",
        ran,
        skipped,
        "cleanup handlers invoked"
    );
}

#[inline]
pub fn log_destroy(blocks: usize, large_freed: usize) {
    debug!(
        target: "regionpool::pool",
        blocks,
        large_freed,
        "pool destroyed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.output, LogOutput::Stderr);

        let debug_config = LogConfig::debug();
        assert_eq!(debug_config.level, Level::TRACE);
        assert!(debug_config.span_events);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("TRACE"), Level::TRACE);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("nonsense"), Level::INFO);
    }

    #[test]
    fn test_init_idempotent() {
        let _ = init_with_config(LogConfig::default().with_level(Level::WARN));
        assert!(init_with_config(LogConfig::default()).is_none());
        assert!(is_initialized());
    }

    #[test]
    fn test_logging_functions() {
        // These should not panic without a subscriber
        log_pool_create(512, 432, std::ptr::null());
        log_pool_undersized(8, 128);
        log_block_grow(16384, std::ptr::null());
        log_current_advance(5, std::ptr::null());
        log_large_alloc(8192, std::ptr::null(), true);
        log_large_free(8192, std::ptr::null());
        log_reset(3, 1);
        log_cleanups_discarded(2, 1);
        log_cleanup_run(2, 0);
        log_destroy(3, 1);
    }
}
