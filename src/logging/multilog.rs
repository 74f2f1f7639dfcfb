use log::{LevelFilter, Log};

/// Fans every record out to a set of loggers. The global level set by `init`
/// is the only verbosity gate; each logger may filter further.
pub struct MultiLogger {
    loggers: Vec<Box<dyn Log>>,
    max_level: LevelFilter,
}

impl Default for MultiLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiLogger {
    pub fn new() -> Self {
        Self {
            loggers: Vec::new(),
            max_level: LevelFilter::Info,
        }
    }

    pub fn with_max_level(mut self, max_level: LevelFilter) -> Self {
        self.max_level = max_level;
        self
    }

    pub fn add_logger(&mut self, logger: Box<dyn Log>) {
        self.loggers.push(logger);
    }

    pub fn init(self) -> Result<(), log::SetLoggerError> {
        log::set_max_level(self.max_level);
        log::set_boxed_logger(Box::new(self))
    }
}

impl Log for MultiLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.loggers.iter().any(|l| l.enabled(metadata))
    }

    fn log(&self, record: &log::Record) {
        self.loggers
            .iter()
            .filter(|l| l.enabled(record.metadata()))
            .for_each(|l| l.log(record));
    }

    fn flush(&self) {
        self.loggers.iter().for_each(|l| l.flush());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use log::Level;

    struct CountingLogger {
        max_level: LevelFilter,
        records: Arc<AtomicUsize>,
        flushes: Arc<AtomicUsize>,
    }

    impl CountingLogger {
        fn new(max_level: LevelFilter) -> (Box<Self>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let records = Arc::new(AtomicUsize::new(0));
            let flushes = Arc::new(AtomicUsize::new(0));
            (
                Box::new(Self {
                    max_level,
                    records: records.clone(),
                    flushes: flushes.clone(),
                }),
                records,
                flushes,
            )
        }
    }

    impl Log for CountingLogger {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.level() <= self.max_level
        }

        fn log(&self, _: &log::Record) {
            self.records.fetch_add(1, Ordering::Relaxed);
        }

        fn flush(&self) {
            self.flushes.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_enabled() {
        let (quiet, ..) = CountingLogger::new(LevelFilter::Error);
        let (chatty, ..) = CountingLogger::new(LevelFilter::Debug);

        let mut multi_logger = MultiLogger::new();
        multi_logger.add_logger(quiet);
        assert!(!multi_logger.enabled(&log::Metadata::builder().level(Level::Info).build()));

        multi_logger.add_logger(chatty);
        assert!(multi_logger.enabled(&log::Metadata::builder().level(Level::Info).build()));
        assert!(!multi_logger.enabled(&log::Metadata::builder().level(Level::Trace).build()));
    }

    #[test]
    fn test_fan_out() {
        let (quiet, quiet_records, quiet_flushes) = CountingLogger::new(LevelFilter::Error);
        let (chatty, chatty_records, chatty_flushes) = CountingLogger::new(LevelFilter::Trace);

        let mut multi_logger = MultiLogger::new();
        multi_logger.add_logger(quiet);
        multi_logger.add_logger(chatty);

        multi_logger.log(&log::Record::builder().level(Level::Debug).build());
        multi_logger.log(&log::Record::builder().level(Level::Error).build());
        multi_logger.flush();

        assert_eq!(quiet_records.load(Ordering::Relaxed), 1);
        assert_eq!(chatty_records.load(Ordering::Relaxed), 2);
        assert_eq!(quiet_flushes.load(Ordering::Relaxed), 1);
        assert_eq!(chatty_flushes.load(Ordering::Relaxed), 1);
    }
}
