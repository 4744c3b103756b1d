//! Application log written to daily files.
//!
//! Lines look like `[2026-10-19T08:30:00Z] [ERROR] message {"key":"value"}`
//! and go to `<dir>/YYYY-MM-DD.log`. Every entry is also emitted as a
//! `tracing` event under the `minimvc::log` target.

use serde_json::Value;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::config::Config;

/// Severity of a log entry, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Daily file logger.
pub struct Logger {
    dir: PathBuf,
    min_level: LogLevel,
    debug: bool,
    writer: Mutex<RollingFileAppender>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("dir", &self.dir)
            .field("min_level", &self.min_level)
            .field("debug", &self.debug)
            .finish()
    }
}

impl Logger {
    /// Create a logger writing under `dir`.
    ///
    /// `DEBUG` entries are written only when `debug` is set, regardless of
    /// `min_level`.
    ///
    /// # Errors
    ///
    /// If the directory cannot be created or the appender cannot open it.
    pub fn new(dir: impl Into<PathBuf>, min_level: LogLevel, debug: bool) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_suffix("log")
            .build(&dir)
            .map_err(io::Error::other)?;
        Ok(Self {
            dir,
            min_level,
            debug,
            writer: Mutex::new(appender),
        })
    }

    /// Build from the `logger.*` config section.
    ///
    /// # Errors
    ///
    /// See [`Logger::new`].
    pub fn from_config(dir: impl Into<PathBuf>, config: &Config) -> io::Result<Self> {
        let level = config
            .str("logger.level", "info")
            .parse()
            .unwrap_or(LogLevel::Info);
        let debug = config.bool("logger.debug", false);
        Self::new(dir, level, debug)
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn enabled(&self, level: LogLevel) -> bool {
        match level {
            LogLevel::Debug => self.debug,
            other => other >= self.min_level,
        }
    }

    pub fn debug(&self, message: &str, context: Value) {
        self.log(LogLevel::Debug, message, &context);
    }

    pub fn info(&self, message: &str, context: Value) {
        self.log(LogLevel::Info, message, &context);
    }

    pub fn warning(&self, message: &str, context: Value) {
        self.log(LogLevel::Warning, message, &context);
    }

    pub fn error(&self, message: &str, context: Value) {
        self.log(LogLevel::Error, message, &context);
    }

    /// Write one entry. Write failures are reported through `tracing` only.
    pub fn log(&self, level: LogLevel, message: &str, context: &Value) {
        if !self.enabled(level) {
            return;
        }
        let has_context = match context {
            Value::Null => false,
            Value::Object(map) => !map.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        };
        let context_json = if has_context {
            context.to_string()
        } else {
            String::new()
        };

        match level {
            LogLevel::Debug => tracing::debug!(target: "minimvc::log", context = %context_json, "{message}"),
            LogLevel::Info => tracing::info!(target: "minimvc::log", context = %context_json, "{message}"),
            LogLevel::Warning => tracing::warn!(target: "minimvc::log", context = %context_json, "{message}"),
            LogLevel::Error => tracing::error!(target: "minimvc::log", context = %context_json, "{message}"),
        }

        let timestamp = humantime::format_rfc3339_seconds(SystemTime::now());
        let mut line = format!("[{timestamp}] [{}] {message}", level.as_str());
        if has_context {
            line.push(' ');
            line.push_str(&context_json);
        }
        line.push('\n');

        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writer.write_all(line.as_bytes()).and_then(|()| writer.flush()) {
            tracing::warn!(error = %e, dir = %self.dir.display(), "Failed to write log file");
        }
    }

    /// Delete log files older than `max_age`.
    ///
    /// # Errors
    ///
    /// If the log directory cannot be listed.
    pub fn prune(&self, max_age: Duration) -> io::Result<usize> {
        super::prune_files(&self.dir, "log", max_age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read_logs(dir: &Path) -> String {
        let mut out = String::new();
        for entry in std::fs::read_dir(dir).unwrap() {
            out.push_str(&std::fs::read_to_string(entry.unwrap().path()).unwrap());
        }
        out
    }

    #[test]
    fn test_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(dir.path(), LogLevel::Info, false).unwrap();
        logger.error("Something broke", json!({"line": 12}));
        logger.info("No context", Value::Null);

        let logs = read_logs(dir.path());
        let lines: Vec<&str> = logs.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with(r#"] [ERROR] Something broke {"line":12}"#));
        assert!(lines[1].ends_with("] [INFO] No context"));
    }

    #[test]
    fn test_daily_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(dir.path(), LogLevel::Info, false).unwrap();
        logger.info("hello", Value::Null);
        let name = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .file_name()
            .into_string()
            .unwrap();
        assert_eq!(name.len(), "YYYY-MM-DD.log".len());
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn test_debug_requires_flag() {
        let dir = tempfile::tempdir().unwrap();
        let quiet = Logger::new(dir.path().join("quiet"), LogLevel::Debug, false).unwrap();
        quiet.debug("hidden", Value::Null);
        assert!(read_logs(quiet.dir()).is_empty());

        let loud = Logger::new(dir.path().join("loud"), LogLevel::Info, true).unwrap();
        loud.debug("shown", Value::Null);
        assert!(read_logs(loud.dir()).contains("[DEBUG] shown"));
    }

    #[test]
    fn test_min_level_filters() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(dir.path(), LogLevel::Error, false).unwrap();
        logger.warning("skipped", Value::Null);
        logger.error("kept", Value::Null);
        let logs = read_logs(dir.path());
        assert!(!logs.contains("skipped"));
        assert!(logs.contains("kept"));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("debug".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
