use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ARRAY_NAME, DEFAULT_FILESYSTEM_LABEL, DEFAULT_FILESYSTEM_TYPE};

use super::InvalidConfigError;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartitioningConfig {
    /// Partition member disks concurrently instead of one after the other.
    #[serde(default)]
    pub parallel: bool,
}

/// Software RAID array assembled from the member partitions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RaidConfig {
    /// Name of the array. The array device is `/dev/md/<name>`.
    #[serde(default = "default_array_name")]
    pub name: String,

    #[serde(default)]
    pub level: RaidLevel,

    /// Build a degenerate array when only one member is available. mdadm
    /// refuses to do that without `--force`.
    #[serde(default = "default_true")]
    pub allow_single_member: bool,
}

impl Default for RaidConfig {
    fn default() -> Self {
        Self {
            name: default_array_name(),
            level: RaidLevel::default(),
            allow_single_member: true,
        }
    }
}

impl RaidConfig {
    pub(super) fn validate(&self) -> Result<(), InvalidConfigError> {
        if self.name.is_empty() || self.name.contains('/') {
            return Err(InvalidConfigError::InvalidArrayName {
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

fn default_array_name() -> String {
    DEFAULT_ARRAY_NAME.into()
}

fn default_true() -> bool {
    true
}

/// RAID level of the array. Written either as a bare number (`0`) or with
/// the `raid` prefix (`raid0`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RaidLevel {
    #[default]
    Raid0,
    Raid1,
    Raid4,
    Raid5,
    Raid6,
    Raid10,
}

impl RaidLevel {
    fn from_number(level: u64) -> Option<Self> {
        Some(match level {
            0 => Self::Raid0,
            1 => Self::Raid1,
            4 => Self::Raid4,
            5 => Self::Raid5,
            6 => Self::Raid6,
            10 => Self::Raid10,
            _ => return None,
        })
    }

    /// Numeric level as understood by `mdadm --level`.
    pub fn number(self) -> u8 {
        match self {
            Self::Raid0 => 0,
            Self::Raid1 => 1,
            Self::Raid4 => 4,
            Self::Raid5 => 5,
            Self::Raid6 => 6,
            Self::Raid10 => 10,
        }
    }
}

impl fmt::Display for RaidLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "raid{}", self.number())
    }
}

impl Serialize for RaidLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RaidLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        let level = match &value {
            serde_yaml::Value::Number(n) => n.as_u64(),
            serde_yaml::Value::String(s) => s
                .trim()
                .strip_prefix("raid")
                .unwrap_or(s.trim())
                .parse::<u64>()
                .ok(),
            _ => None,
        };

        level.and_then(RaidLevel::from_number).ok_or_else(|| {
            serde::de::Error::custom(format!("unsupported RAID level: {value:?}"))
        })
    }
}

/// Filesystem created on the array.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MkfsConfig {
    #[serde(rename = "type", default = "default_filesystem_type")]
    pub filesystem: String,

    #[serde(default = "default_filesystem_label")]
    pub label: String,

    /// Share of blocks reserved for the superuser. Only passed to filesystems
    /// of the ext family.
    #[serde(default)]
    pub reserved_blocks_percentage: u8,

    /// Replace the built-in mkfs invocation. The array device path is appended
    /// as the last argument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

impl Default for MkfsConfig {
    fn default() -> Self {
        Self {
            filesystem: default_filesystem_type(),
            label: default_filesystem_label(),
            reserved_blocks_percentage: 0,
            command: None,
        }
    }
}

impl MkfsConfig {
    /// Whether the filesystem understands `-m` for reserved blocks.
    pub fn is_ext_family(&self) -> bool {
        matches!(self.filesystem.as_str(), "ext2" | "ext3" | "ext4")
    }

    /// Program that actually writes the filesystem: the first word of the
    /// custom command, or the `mkfs.<type>` helper the front end dispatches to.
    pub fn formatter_program(&self) -> String {
        match self.command.as_ref().and_then(|command| command.first()) {
            Some(program) => program.clone(),
            None => format!("mkfs.{}", self.filesystem),
        }
    }

    pub(super) fn validate(&self) -> Result<(), InvalidConfigError> {
        if matches!(&self.command, Some(command) if command.is_empty()) {
            return Err(InvalidConfigError::EmptyMkfsCommand);
        }
        if self.filesystem.is_empty() {
            return Err(InvalidConfigError::EmptyFilesystemType);
        }
        if self.reserved_blocks_percentage > 50 {
            return Err(InvalidConfigError::ReservedBlocksPercentage {
                percentage: self.reserved_blocks_percentage,
            });
        }
        Ok(())
    }
}

fn default_filesystem_type() -> String {
    DEFAULT_FILESYSTEM_TYPE.into()
}

fn default_filesystem_label() -> String {
    DEFAULT_FILESYSTEM_LABEL.into()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MountConfig {
    pub mount_point: MountPoint,

    /// Extra options passed to `mount -o`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl MountConfig {
    pub(super) fn validate(&self) -> Result<(), InvalidConfigError> {
        if !self.mount_point.path.is_absolute() {
            return Err(InvalidConfigError::RelativeMountPoint {
                path: self.mount_point.path.clone(),
            });
        }
        if self
            .options
            .iter()
            .any(|option| option.is_empty() || option.contains(','))
        {
            return Err(InvalidConfigError::InvalidMountOption);
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MountPoint {
    pub path: PathBuf,

    /// Owner to hand the mounted filesystem root to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chown: Option<Ownership>,
}

/// User and group names, resolved on the host at mount time.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Ownership {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raid_level() {
        #[derive(Debug, Deserialize)]
        struct Level {
            level: RaidLevel,
        }

        let cases = [
            ("level: 0", RaidLevel::Raid0),
            ("level: 1", RaidLevel::Raid1),
            ("level: '5'", RaidLevel::Raid5),
            ("level: raid6", RaidLevel::Raid6),
            ("level: raid10", RaidLevel::Raid10),
        ];
        for (yaml, expected) in cases {
            let parsed: Level = serde_yaml::from_str(yaml).unwrap();
            assert_eq!(parsed.level, expected, "failed on '{yaml}'");
        }

        serde_yaml::from_str::<Level>("level: 3").unwrap_err();
        serde_yaml::from_str::<Level>("level: mirror").unwrap_err();
        serde_yaml::from_str::<Level>("level: -1").unwrap_err();

        assert_eq!(RaidLevel::Raid10.to_string(), "raid10");
        assert_eq!(RaidLevel::Raid5.number(), 5);
        assert_eq!(
            serde_yaml::to_string(&RaidLevel::Raid1).unwrap().trim(),
            "raid1"
        );
    }

    #[test]
    fn test_formatter_program() {
        let mut config = MkfsConfig::default();
        assert_eq!(config.formatter_program(), "mkfs.ext4");

        config.filesystem = "xfs".into();
        assert_eq!(config.formatter_program(), "mkfs.xfs");

        config.command = Some(vec!["/usr/local/sbin/format-scratch".into(), "-q".into()]);
        assert_eq!(config.formatter_program(), "/usr/local/sbin/format-scratch");
    }

    #[test]
    fn test_ext_family() {
        let mut mkfs = MkfsConfig::default();
        assert!(mkfs.is_ext_family());
        mkfs.filesystem = "xfs".into();
        assert!(!mkfs.is_ext_family());
    }

    #[test]
    fn test_mount_options_validation() {
        let mut mount = MountConfig {
            mount_point: MountPoint {
                path: "/mnt".into(),
                chown: None,
            },
            options: vec!["noatime".into()],
        };
        mount.validate().unwrap();

        mount.options.push("ro,nodev".into());
        assert_eq!(
            mount.validate().unwrap_err(),
            InvalidConfigError::InvalidMountOption
        );
    }
}
