use std::{path::Path, str::FromStr};

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::{constants::DEFAULT_MODELS, primitives::bytes::ByteCount};

mod error;
mod populate;
mod storage;

pub use error::InvalidConfigError;
pub use populate::{EntryType, FileMode, Populate, PopulateEntry};
pub use storage::{
    MkfsConfig, MountConfig, MountPoint, Ownership, PartitioningConfig, RaidConfig, RaidLevel,
};

/// Full configuration of a provisioning run, as read from the YAML
/// configuration file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Log level to switch to once the configuration is loaded. Accepts the
    /// usual level names (`error`, `warn`, `info`, `debug`, `trace`, `off`),
    /// case-insensitive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Device models that may be claimed. A disk is only considered when its
    /// model string is one of these, verbatim.
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    /// Smallest disk that may be claimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<ByteCount>,

    /// Largest disk that may be claimed. A value of zero means no upper
    /// bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<ByteCount>,

    #[serde(default)]
    pub partitioning: PartitioningConfig,

    #[serde(default)]
    pub mdraid: RaidConfig,

    #[serde(default)]
    pub mkfs: MkfsConfig,

    pub mount: MountConfig,

    /// How to fill the filesystem once it is mounted. Nothing is written when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub populate: Option<Populate>,
}

fn default_models() -> Vec<String> {
    DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
}

/// Operator input deciding which disks are claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionCriteria {
    pub models: Vec<String>,
    pub min_size: u64,
    pub max_size: Option<u64>,
}

impl Config {
    /// Parse a configuration from YAML. Does not validate it.
    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    /// Selection criteria for the eligibility filter.
    pub fn selection_criteria(&self) -> SelectionCriteria {
        SelectionCriteria {
            models: self.models.clone(),
            min_size: self.min_size.map(ByteCount::bytes).unwrap_or(0),
            max_size: self
                .max_size
                .map(ByteCount::bytes)
                .filter(|&max_size| max_size > 0),
        }
    }

    /// Log level requested by the configuration, if any.
    pub fn log_level_filter(&self) -> Result<Option<LevelFilter>, InvalidConfigError> {
        self.log_level
            .as_deref()
            .map(|level| {
                LevelFilter::from_str(level).map_err(|_| InvalidConfigError::InvalidLogLevel {
                    level: level.to_owned(),
                })
            })
            .transpose()
    }

    /// Check the cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), InvalidConfigError> {
        self.log_level_filter()?;

        if self.models.is_empty() {
            return Err(InvalidConfigError::NoModels);
        }

        let criteria = self.selection_criteria();
        if let Some(max_size) = criteria.max_size {
            if criteria.min_size > max_size {
                return Err(InvalidConfigError::SizeRange {
                    min_size: criteria.min_size,
                    max_size,
                });
            }
        }

        self.mdraid.validate()?;
        self.mkfs.validate()?;
        self.mount.validate()?;

        if let Some(populate) = &self.populate {
            populate.validate()?;
        }

        Ok(())
    }
}

/// Returns true when `path` stays below the directory it is joined to: it is
/// relative and has no `..` component.
pub(crate) fn is_contained_relative_path(path: &Path) -> bool {
    path.is_relative()
        && path
            .components()
            .all(|c| !matches!(c, std::path::Component::ParentDir))
}
