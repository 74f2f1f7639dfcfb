use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{is_contained_relative_path, InvalidConfigError};

/// Where the content of a freshly mounted filesystem comes from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Populate {
    /// Copy the tree under `source_path` into the mount point, keeping
    /// ownership and modes.
    Directory { source_path: PathBuf },

    /// Unpack a tar archive, optionally zstd-compressed, into the mount point.
    Archive { archive_path: PathBuf },

    /// Create the listed entries below the mount point.
    Config { entries: Vec<PopulateEntry> },
}

impl Populate {
    pub(super) fn validate(&self) -> Result<(), InvalidConfigError> {
        match self {
            Self::Directory { source_path: path } | Self::Archive { archive_path: path } => {
                if !path.is_absolute() {
                    return Err(InvalidConfigError::RelativePopulateSource { path: path.clone() });
                }
            }
            Self::Config { entries } => {
                for entry in entries {
                    entry.validate()?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PopulateEntry {
    /// Path relative to the mount point.
    pub path: PathBuf,

    #[serde(rename = "type", default)]
    pub entry_type: EntryType,

    /// Contents of a file entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<FileMode>,
}

impl PopulateEntry {
    fn validate(&self) -> Result<(), InvalidConfigError> {
        if !is_contained_relative_path(&self.path) || self.path.as_os_str().is_empty() {
            return Err(InvalidConfigError::EntryOutsideMountPoint {
                path: self.path.clone(),
            });
        }
        if self.entry_type == EntryType::Directory && self.contents.is_some() {
            return Err(InvalidConfigError::DirectoryWithContents {
                path: self.path.clone(),
            });
        }
        if let Some(FileMode(mode)) = self.mode {
            if mode > 0o7777 {
                return Err(InvalidConfigError::InvalidMode {
                    path: self.path.clone(),
                    mode,
                });
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    #[default]
    Directory,
    File,
}

/// Unix permission bits. Strings are read as octal (`"750"`), integers are
/// taken as they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMode(pub u32);

impl Serialize for FileMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:o}", self.0))
    }
}

impl<'de> Deserialize<'de> for FileMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match serde_yaml::Value::deserialize(deserializer)? {
            serde_yaml::Value::Number(n) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(FileMode)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid mode {n}"))),
            serde_yaml::Value::String(s) => {
                let digits = s.trim();
                let digits = digits
                    .strip_prefix("0o")
                    .unwrap_or(digits)
                    .trim_start_matches('0');
                if digits.is_empty() {
                    return Ok(FileMode(0));
                }
                u32::from_str_radix(digits, 8)
                    .map(FileMode)
                    .map_err(|e| serde::de::Error::custom(format!("invalid octal mode '{s}': {e}")))
            }
            _ => Err(serde::de::Error::custom("invalid mode")),
        }
    }
}
