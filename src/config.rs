//! Configuration options for rings and file handles.
//!
//! Most programs only need [`UringFileConfig::default`]. The presets tune
//! logging and queue sizes for development and test runs.

use crate::error::{Result, UringFileError};
use crate::logging::LogLevel;

/// Largest queue depth accepted by the kernel for a single ring.
pub const MAX_QUEUE_DEPTH: u32 = 32768;

/// Complete configuration for a [`Ring`](crate::Ring) and its files.
#[derive(Debug, Clone, Default)]
pub struct UringFileConfig {
    /// Ring configuration
    pub ring: RingConfig,
    /// File handle configuration
    pub file: FileConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Ring-specific configuration options.
#[derive(Debug, Clone)]
pub struct RingConfig {
    /// Number of submission queue entries
    pub queue_depth: u32,
    /// Which backend executes submissions
    pub backend: BackendPreference,
}

/// Backend selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// io_uring when the kernel allows it, synchronous fallback otherwise
    #[default]
    Auto,
    /// io_uring only; setup fails where it is unavailable
    IoUring,
    /// Always use the synchronous fallback
    Fallback,
}

/// File handle configuration.
#[derive(Debug, Clone)]
pub struct FileConfig {
    /// Bytes requested per read while scanning for a newline
    pub readline_chunk_size: usize,
    /// Permission bits used by `open` when none are given
    pub default_mode: u32,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Install a subscriber when the ring is created
    pub enabled: bool,
    /// Minimum log level
    pub level: LogLevel,
    /// Use JSON format for logs
    pub json_format: bool,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            queue_depth: 32,
            backend: BackendPreference::Auto,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            readline_chunk_size: 32,
            default_mode: 0o660,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: LogLevel::Info,
            json_format: false,
        }
    }
}

impl UringFileConfig {
    /// Create a configuration for development and debugging.
    ///
    /// Enables debug logging and uses a deeper queue.
    pub fn development() -> Self {
        Self {
            ring: RingConfig {
                queue_depth: 64,
                backend: BackendPreference::Auto,
            },
            file: FileConfig::default(),
            logging: LoggingConfig {
                enabled: true,
                level: LogLevel::Debug,
                json_format: false,
            },
        }
    }

    /// Create a deterministic configuration for tests.
    ///
    /// Uses the synchronous fallback so results do not depend on whether
    /// the host allows io_uring.
    pub fn testing() -> Self {
        Self {
            ring: RingConfig {
                queue_depth: 16,
                backend: BackendPreference::Fallback,
            },
            file: FileConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Set the queue depth, keeping everything else.
    pub fn with_queue_depth(mut self, queue_depth: u32) -> Self {
        self.ring.queue_depth = queue_depth;
        self
    }

    /// Set the backend preference, keeping everything else.
    pub fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.ring.backend = backend;
        self
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.ring.queue_depth == 0 {
            return Err(UringFileError::InvalidConfig(
                "queue depth must be greater than 0".into(),
            ));
        }

        if self.ring.queue_depth > MAX_QUEUE_DEPTH {
            return Err(UringFileError::InvalidConfig(format!(
                "queue depth should not exceed {MAX_QUEUE_DEPTH}"
            )));
        }

        if self.file.readline_chunk_size == 0 {
            return Err(UringFileError::InvalidConfig(
                "readline chunk size must be greater than 0".into(),
            ));
        }

        if self.file.default_mode & !0o7777 != 0 {
            return Err(UringFileError::InvalidConfig(format!(
                "default mode {:o} has bits outside 0o7777",
                self.file.default_mode
            )));
        }

        Ok(())
    }
}
