pub mod cli;
pub mod config;
pub mod engine;
pub mod host;
mod logging;

pub use engine::{provision, scan_report, EngineContext, Provisioned};
pub use host::{BlockDeviceHost, SystemHost};
pub use logging::{json_log::JsonLog, multilog::MultiLogger};

/// Version of the tool, as reported by `--version` and logged at startup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
