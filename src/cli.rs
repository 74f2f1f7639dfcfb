use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;

use storage_api::constants::FSTAB_PATH;

use crate::VERSION;

#[derive(Parser, Debug)]
#[clap(version = VERSION, about = "Claim, assemble and mount ephemeral local disks")]
pub struct Cli {
    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]
    #[arg(global = true, short, long, default_value_t = LevelFilter::Info)]
    pub verbosity: LevelFilter,

    /// Format of the log lines
    #[arg(global = true, long, value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// Additionally append JSON log lines to this file
    #[arg(global = true, long)]
    pub log_file: Option<PathBuf>,

    /// Path to save an eventual fatal error
    #[arg(global = true, short, long)]
    pub error: Option<PathBuf>,

    /// Mount table to record the new filesystem in
    #[arg(global = true, long, hide = true, default_value = FSTAB_PATH)]
    pub fstab_path: PathBuf,

    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(ValueEnum, Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogFormat {
    /// One JSON object per line on stdout
    Json,
    /// Human readable lines on stderr
    Text,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Provision the eligible disks: partition, assemble, format, mount and
    /// persist
    Setup {
        /// Configuration file; falls back to the system-wide one
        #[clap(index = 1)]
        config: Option<PathBuf>,
    },

    /// Load and validate the configuration without touching any device
    Validate {
        /// Configuration file; falls back to the system-wide one
        #[clap(index = 1)]
        config: Option<PathBuf>,
    },

    /// List block devices and whether they would be claimed
    Scan {
        /// Configuration file; falls back to the system-wide one
        #[clap(index = 1)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// The subcommand to run. Without one, the tool provisions using the
    /// system-wide configuration.
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Setup { config: None })
    }
}

impl Commands {
    pub fn config(&self) -> Option<&PathBuf> {
        match self {
            Commands::Setup { config }
            | Commands::Validate { config }
            | Commands::Scan { config } => config.as_ref(),
        }
    }
}

impl Display for Commands {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Commands::Setup { .. } => write!(f, "setup"),
            Commands::Validate { .. } => write!(f, "validate"),
            Commands::Scan { .. } => write!(f, "scan"),
        }
    }
}
