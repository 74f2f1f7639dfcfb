use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;
use strum_macros::IntoStaticStr;

use osutils::lsblk::BlockDevice;
use storage_api::error::{ProvisioningError, ReportError, SetupError, SetupResultExt};

use crate::host::{settled, BlockDeviceHost};

/// Kind of a block device, derived from the lsblk type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DeviceKind {
    Disk,
    Partition,
    Array,
    Unknown,
}

/// Type name prefixes recognized by [`DeviceKind::classify`]. Array types are
/// reported per level (`raid0`, `raid1`, ...), hence the prefix match.
const KIND_PREFIXES: &[(&str, DeviceKind)] = &[
    ("disk", DeviceKind::Disk),
    ("part", DeviceKind::Partition),
    ("raid", DeviceKind::Array),
];

impl DeviceKind {
    pub fn classify(device_type: &str) -> Self {
        KIND_PREFIXES
            .iter()
            .find(|(prefix, _)| device_type.starts_with(prefix))
            .map(|(_, kind)| *kind)
            .unwrap_or(DeviceKind::Unknown)
    }
}

/// Snapshot of one block device at the time of the scan that produced it.
///
/// Records are never updated. Anything done to the device afterwards is only
/// visible in a new record from [`scan`] or [`rescan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockDeviceRecord {
    pub path: PathBuf,
    pub kind: DeviceKind,
    pub model: Option<String>,
    pub size: u64,
    pub physical_sector_size: u64,
    pub partition_table_type: Option<String>,
    pub filesystem_type: Option<String>,
    pub label: Option<String>,
    pub filesystem_uuid: Option<String>,
    pub partition_uuid: Option<String>,
    /// All children, including those of unknown kind.
    pub children: Vec<BlockDeviceRecord>,
}

impl From<BlockDevice> for BlockDeviceRecord {
    fn from(device: BlockDevice) -> Self {
        Self {
            kind: DeviceKind::classify(&device.device_type),
            path: device.path,
            model: device.model,
            size: device.size,
            physical_sector_size: device.physical_sector_size,
            partition_table_type: device.partition_table_type,
            filesystem_type: device.filesystem_type,
            label: device.label,
            filesystem_uuid: device.uuid,
            partition_uuid: device.partition_uuid,
            children: device.children.into_iter().map(Self::from).collect(),
        }
    }
}

impl BlockDeviceRecord {
    /// Children that are partitions.
    pub fn partitions(&self) -> impl Iterator<Item = &BlockDeviceRecord> {
        self.children
            .iter()
            .filter(|child| child.kind == DeviceKind::Partition)
    }
}

/// Snapshot the block device tree, or the subtree at `path`.
///
/// Top-level devices of unknown kind are dropped.
pub fn scan(
    host: &dyn BlockDeviceHost,
    path: Option<&Path>,
) -> Result<Vec<BlockDeviceRecord>, SetupError> {
    let devices = settled(host, || {
        host.list_block_devices(path)
            .structured(ProvisioningError::ExternalToolFailure {
                tool: "lsblk".into(),
            })
    })
    .message("Failed to list block devices")?;

    Ok(devices
        .into_iter()
        .map(BlockDeviceRecord::from)
        .filter(|record| {
            if record.kind == DeviceKind::Unknown {
                debug!(
                    "Ignoring block device '{}' of unknown kind",
                    record.path.display()
                );
                return false;
            }
            true
        })
        .collect())
}

/// Take a fresh snapshot of the device at `path`.
pub fn rescan(host: &dyn BlockDeviceHost, path: &Path) -> Result<BlockDeviceRecord, SetupError> {
    let devices = settled(host, || {
        host.list_block_devices(Some(path))
            .structured(ProvisioningError::DeviceNotFound {
                path: path.display().to_string(),
            })
    })?;

    let mut records = devices.into_iter().map(BlockDeviceRecord::from);
    match (records.next(), records.next()) {
        (Some(record), None) => Ok(record),
        _ => Err(SetupError::new(ProvisioningError::DeviceNotFound {
            path: path.display().to_string(),
        }))
        .message(format!(
            "Expected exactly one block device at '{}'",
            path.display()
        )),
    }
}
