use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use log::warn;
use serde::{Deserialize, Deserializer};

use crate::{dependencies::Dependency, exe::RunAndCheck};

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LsBlkOutput {
    pub blockdevices: Vec<BlockDevice>,
}

/// One node of the kernel block device tree, as reported by lsblk.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    pub path: PathBuf,

    /// Raw device type, e.g. `disk`, `part`, `raid0`, `crypt`.
    #[serde(rename = "type")]
    pub device_type: String,

    pub model: Option<String>,

    #[serde(deserialize_with = "number_or_string")]
    pub size: u64,

    #[serde(rename = "phy-sec", default, deserialize_with = "number_or_string")]
    pub physical_sector_size: u64,

    #[serde(rename = "pttype")]
    pub partition_table_type: Option<String>,

    #[serde(rename = "fstype")]
    pub filesystem_type: Option<String>,

    pub label: Option<String>,

    pub uuid: Option<String>,

    #[serde(rename = "partuuid")]
    pub partition_uuid: Option<String>,

    #[serde(default)]
    pub children: Vec<BlockDevice>,
}

/// Older util-linux releases print numeric columns as strings even with
/// `--json --bytes`.
fn number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("expected unsigned integer, got {n}"))),
        serde_json::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid number '{s}': {e}"))),
        serde_json::Value::Null => Ok(0),
        other => Err(serde::de::Error::custom(format!(
            "expected number, got {other}"
        ))),
    }
}

/// List block devices with their children. With a path, only that device (and
/// its children) is listed, and lsblk fails if it is not a block device.
pub fn list(device_path: Option<&Path>) -> Result<Vec<BlockDevice>, Error> {
    let mut command = Dependency::Lsblk.cmd();
    command
        .arg("--json")
        .arg("--bytes")
        .arg("--paths")
        .arg("--output-all");
    if let Some(device_path) = device_path {
        command.arg(device_path);
    }

    let result = command
        .output_and_check()
        .context("Failed to execute lsblk")?;

    let parsed = parse_lsblk_output(&result);
    if parsed.is_err() {
        warn!("lsblk output: {}", result);
    }

    parsed
}

fn parse_lsblk_output(output: &str) -> Result<Vec<BlockDevice>, Error> {
    let parsed: LsBlkOutput =
        serde_json::from_str(output).context("Failed to parse lsblk output")?;

    Ok(parsed.blockdevices)
}
