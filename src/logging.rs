//! Logging setup for uring-file.
//!
//! The library emits structured events through `tracing` (`user_data`, `fd`
//! and `op` fields on the submission and completion paths). Applications
//! that already install a subscriber need nothing from this module;
//! [`init_logging`] is a convenience for everyone else.

use tracing::level_filters::LevelFilter;

use crate::config::LoggingConfig;

/// Log level for uring-file operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Trace-level logging (very verbose)
    Trace = 0,
    /// Debug-level logging
    Debug = 1,
    /// Info-level logging
    Info = 2,
    /// Warning-level logging
    Warn = 3,
    /// Error-level logging
    Error = 4,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Install a global `tracing-subscriber` formatter per `config`.
///
/// Returns `true` if this call installed the subscriber. Returns `false`
/// when logging is disabled or another global subscriber already exists,
/// which is not treated as an error.
pub fn init_logging(config: &LoggingConfig) -> bool {
    if !config.enabled {
        return false;
    }

    let builder = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from(config.level))
        .with_target(true);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    match installed {
        Ok(()) => {
            tracing::debug!(level = %config.level, json = config.json_format, "logging initialized");
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Info.to_string(), "INFO");
        assert_eq!(LogLevel::Error.to_string(), "ERROR");
    }

    #[test]
    fn test_level_filter_conversion() {
        assert_eq!(LevelFilter::from(LogLevel::Warn), LevelFilter::WARN);
        assert_eq!(LevelFilter::from(LogLevel::Trace), LevelFilter::TRACE);
    }

    #[test]
    fn test_disabled_logging_installs_nothing() {
        let config = LoggingConfig::default();
        assert!(!init_logging(&config));
    }

    #[test]
    fn test_second_init_is_tolerated() {
        let config = LoggingConfig {
            enabled: true,
            level: LogLevel::Debug,
            json_format: false,
        };
        // Whichever call wins, the other must not panic.
        let first = init_logging(&config);
        let second = init_logging(&config);
        assert!(!(first && second));
    }
}
