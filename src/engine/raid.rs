use std::path::{Path, PathBuf};

use log::{info, warn};

use storage_api::{
    config::RaidConfig,
    constants::MD_DEVICE_DIRECTORY,
    error::{ProvisioningError, ReportError, SetupError, SetupResultExt},
};

use crate::host::{settled, ArrayRequest, BlockDeviceHost};

use super::inventory::{self, BlockDeviceRecord};

/// Stable device node of the array named `name`.
pub fn array_path(name: &str) -> PathBuf {
    Path::new(MD_DEVICE_DIRECTORY).join(name)
}

/// Assemble `members` into one array and return a fresh record of it.
///
/// A single member needs `--force`, which is only passed when the
/// configuration allows single-member arrays. Otherwise mdadm is left to
/// refuse it.
pub fn assemble(
    host: &dyn BlockDeviceHost,
    members: &[PathBuf],
    config: &RaidConfig,
) -> Result<BlockDeviceRecord, SetupError> {
    if members.is_empty() {
        return Err(SetupError::new(ProvisioningError::NoEligibleDevices))
            .message("Cannot assemble an array without members");
    }

    let force = members.len() == 1 && config.allow_single_member;
    if members.len() == 1 && !config.allow_single_member {
        warn!("Creating a single-member array without --force, mdadm is expected to refuse it");
    }

    let request = ArrayRequest {
        path: array_path(&config.name),
        level: config.level,
        members: members.to_vec(),
        force,
    };

    info!(
        "Creating {} array '{}' from {} member(s)",
        request.level,
        request.path.display(),
        members.len()
    );
    settled(host, || {
        host.create_array(&request)
            .structured(ProvisioningError::ExternalToolFailure {
                tool: "mdadm".into(),
            })
    })
    .message(format!(
        "Failed to create array '{}'",
        request.path.display()
    ))?;

    let is_block_device = settled(host, || {
        host.is_block_device(&request.path)
            .structured(ProvisioningError::ArrayCreationFailed {
                path: request.path.display().to_string(),
            })
    })?;
    if !is_block_device {
        return Err(SetupError::new(ProvisioningError::ArrayCreationFailed {
            path: request.path.display().to_string(),
        }));
    }

    inventory::rescan(host, &request.path)
}
