use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::Path,
    sync::Mutex,
};

use anyhow::{Context, Error};
use log::{Log, Record};

use super::LogEntry;

/// Writes every record as a single JSON line.
pub struct JsonLog {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl JsonLog {
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Append to the file at `path`, creating it if needed.
    pub fn file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .with_context(|| format!("Failed to open log file '{}'", path.as_ref().display()))?;
        Ok(Self::new(Box::new(file)))
    }

    fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    pub fn into_logger(self) -> Box<dyn Log> {
        Box::new(self)
    }

    fn write_entry(&self, record: &Record) -> Result<(), Box<dyn std::error::Error + '_>> {
        let mut serialized = serde_json::to_string(&LogEntry::from(record))?;
        serialized.push('\n');

        let mut sink = self.sink.lock()?;
        sink.write_all(serialized.as_bytes())?;
        sink.flush()?;
        Ok(())
    }
}

impl Log for JsonLog {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        // Nowhere to report a failing log sink.
        let _ = self.write_entry(record);
    }

    fn flush(&self) {
        if let Ok(mut sink) = self.sink.lock() {
            let _ = sink.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use log::Level;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_enabled() {
        // Verbosity is gated globally by the multi-logger.
        let logger = JsonLog::stdout().into_logger();
        assert!(logger.enabled(&log::Metadata::builder().level(Level::Error).build()));
        assert!(logger.enabled(&log::Metadata::builder().level(Level::Trace).build()));
    }

    #[test]
    fn test_file_log() {
        let test_dir = tempdir().unwrap();
        let target = test_dir.path().join("setup.log");
        fs::write(&target, "{\"earlier\": true}\n").unwrap();

        let logger = JsonLog::file(&target).unwrap().into_logger();
        let record = log::Record::builder()
            .args(format_args!("Creating RAID array"))
            .level(Level::Info)
            .target("test_target")
            .module_path(Some("test_module"))
            .file(Some(file!()))
            .line(Some(42))
            .build();
        logger.log(&record);
        logger.log(&record);
        logger.flush();

        let content = fs::read_to_string(&target).unwrap();
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3, "Log file should be appended to");

        let entry: LogEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(entry.level, Level::Info.into());
        assert_eq!(entry.message, "Creating RAID array");
        assert_eq!(entry.target, "test_target");
        assert_eq!(entry.module, "test_module");
        assert_eq!(entry.file, file!());
        assert_eq!(entry.line, 42);
        assert!(!entry.timestamp.is_empty());
    }

    #[test]
    fn test_file_log_unwritable() {
        let test_dir = tempdir().unwrap();
        // A directory cannot be opened for appending.
        assert!(JsonLog::file(test_dir.path()).is_err());
    }
}
