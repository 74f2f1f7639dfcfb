use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub(super) mod json_log;
pub(super) mod multilog;

/// One structured log line.
#[derive(Debug, Serialize, Deserialize)]
struct LogEntry {
    pub timestamp: String,
    pub level: Level,
    pub message: String,
    pub target: String,
    pub module: String,
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl From<log::Level> for Level {
    fn from(value: log::Level) -> Self {
        match value {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug => Level::Debug,
            log::Level::Trace => Level::Trace,
        }
    }
}

impl LogEntry {
    fn new(record: &log::Record, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            level: record.level().into(),
            message: record.args().to_string(),
            target: record.target().to_string(),
            module: record.module_path().unwrap_or_default().to_string(),
            file: record.file().unwrap_or_default().to_string(),
            line: record.line().unwrap_or_default(),
        }
    }
}

impl From<&log::Record<'_>> for LogEntry {
    fn from(value: &log::Record) -> Self {
        Self::new(value, Utc::now())
    }
}
