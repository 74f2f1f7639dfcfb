use std::fmt::{self, Display, Formatter};

use log::{debug, info};

use storage_api::{
    config::SelectionCriteria,
    error::{ProvisioningError, SetupError},
    primitives::bytes::ByteCount,
};

use super::inventory::{BlockDeviceRecord, DeviceKind};

/// Why a device was not selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligibility {
    NotADisk(DeviceKind),
    Initialized,
    ModelMismatch(Option<String>),
    TooSmall { size: u64, min_size: u64 },
    TooLarge { size: u64, max_size: u64 },
}

impl Display for Ineligibility {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Ineligibility::NotADisk(kind) => {
                write!(f, "not a disk but a {}", <&str>::from(kind))
            }
            Ineligibility::Initialized => write!(f, "already initialized"),
            Ineligibility::ModelMismatch(Some(model)) => {
                write!(f, "model '{model}' is not allowed")
            }
            Ineligibility::ModelMismatch(None) => write!(f, "no model reported"),
            Ineligibility::TooSmall { size, min_size } => write!(
                f,
                "size {} is below the minimum of {}",
                ByteCount(*size),
                ByteCount(*min_size)
            ),
            Ineligibility::TooLarge { size, max_size } => write!(
                f,
                "size {} is above the maximum of {}",
                ByteCount(*size),
                ByteCount(*max_size)
            ),
        }
    }
}

/// A disk carries a trace of prior use: a partition table, any child device,
/// or a filesystem type, label, filesystem UUID or partition UUID.
pub fn is_initialized(disk: &BlockDeviceRecord) -> bool {
    disk.partition_table_type.is_some()
        || !disk.children.is_empty()
        || disk.filesystem_type.is_some()
        || disk.label.is_some()
        || disk.filesystem_uuid.is_some()
        || disk.partition_uuid.is_some()
}

fn criteria_mismatch(
    disk: &BlockDeviceRecord,
    criteria: &SelectionCriteria,
) -> Option<Ineligibility> {
    if !disk
        .model
        .as_ref()
        .is_some_and(|model| criteria.models.contains(model))
    {
        return Some(Ineligibility::ModelMismatch(disk.model.clone()));
    }

    if disk.size < criteria.min_size {
        return Some(Ineligibility::TooSmall {
            size: disk.size,
            min_size: criteria.min_size,
        });
    }

    match criteria.max_size {
        Some(max_size) if disk.size > max_size => Some(Ineligibility::TooLarge {
            size: disk.size,
            max_size,
        }),
        _ => None,
    }
}

pub fn matches_criteria(disk: &BlockDeviceRecord, criteria: &SelectionCriteria) -> bool {
    criteria_mismatch(disk, criteria).is_none()
}

/// Reason `device` may not be claimed, or `None` if it may. Kind and prior
/// use are checked before the criteria.
pub fn ineligibility(
    device: &BlockDeviceRecord,
    criteria: &SelectionCriteria,
) -> Option<Ineligibility> {
    if device.kind != DeviceKind::Disk {
        return Some(Ineligibility::NotADisk(device.kind));
    }

    if is_initialized(device) {
        return Some(Ineligibility::Initialized);
    }

    criteria_mismatch(device, criteria)
}

pub fn is_eligible(device: &BlockDeviceRecord, criteria: &SelectionCriteria) -> bool {
    ineligibility(device, criteria).is_none()
}

/// Pick the disks to claim from a scan. Having none is an error.
pub fn select_member_disks<'a>(
    devices: &'a [BlockDeviceRecord],
    criteria: &SelectionCriteria,
) -> Result<Vec<&'a BlockDeviceRecord>, SetupError> {
    let selected = devices
        .iter()
        .filter(|device| match ineligibility(device, criteria) {
            Some(reason) => {
                debug!("Skipping '{}': {reason}", device.path.display());
                false
            }
            None => {
                info!(
                    "Selected disk '{}' ({}, {})",
                    device.path.display(),
                    device.model.as_deref().unwrap_or_default(),
                    ByteCount(device.size)
                );
                true
            }
        })
        .collect::<Vec<_>>();

    if selected.is_empty() {
        return Err(SetupError::new(ProvisioningError::NoEligibleDevices));
    }

    Ok(selected)
}
