//! Pluggable warning sink (the `logger` option), plus the crate's own
//! internal diagnostics.
//!
//! Two things are deliberately kept separate: the caller-supplied [`Logger`]
//! receives exactly the `version_conflict` warnings and similar
//! invariant-relaxation notices; the crate's own housekeeping (vacuum
//! progress, scrub counts) goes straight to `tracing` regardless of what
//! `Logger` the caller installed, the same way the storage engine this crate
//! is descended from kept its own tracing spans independent of caller
//! callbacks.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// The caller-supplied warning sink installed via the `logger` option.
pub trait Logger {
    fn log(&self, level: LogLevel, message: &str, code: Option<&str>);
}

/// Default `Logger`: forwards to `tracing`, carrying `code` as a field when
/// present.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, code: Option<&str>) {
        let code = code.unwrap_or("");
        match level {
            LogLevel::Debug => tracing::debug!(code, "{message}"),
            LogLevel::Info => tracing::info!(code, "{message}"),
            LogLevel::Warn => tracing::warn!(code, "{message}"),
            LogLevel::Error => tracing::error!(code, "{message}"),
        }
    }
}

/// A no-op sink, useful for tests that don't want warnings on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: LogLevel, _message: &str, _code: Option<&str>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingLogger {
        messages: RefCell<Vec<(LogLevel, String, Option<String>)>>,
    }

    impl Logger for RecordingLogger {
        fn log(&self, level: LogLevel, message: &str, code: Option<&str>) {
            self.messages
                .borrow_mut()
                .push((level, message.to_string(), code.map(str::to_string)));
        }
    }

    #[test]
    fn records_level_message_and_code() {
        let logger = RecordingLogger::default();
        logger.log(LogLevel::Warn, "stale posting", Some("version_conflict"));
        let messages = logger.messages.borrow();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, LogLevel::Warn);
        assert_eq!(messages[0].2.as_deref(), Some("version_conflict"));
    }
}
