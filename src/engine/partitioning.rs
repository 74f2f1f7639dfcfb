use std::path::PathBuf;

use log::{debug, info};
use rayon::prelude::*;
use uuid::Uuid;

use storage_api::{
    constants::PARTITION_ALIGNMENT_BYTES,
    error::{ProvisioningError, ReportError, SetupError, SetupResultExt},
};

use crate::host::{settled, BlockDeviceHost, PartitionRequest};

use super::inventory::{self, BlockDeviceRecord};

/// First sector of a partition aligned to [`PARTITION_ALIGNMENT_BYTES`] on a
/// disk with the given physical sector size.
pub fn alignment_start_sector(disk: &BlockDeviceRecord) -> Result<u64, SetupError> {
    let sector_size = disk.physical_sector_size;
    if sector_size == 0 || PARTITION_ALIGNMENT_BYTES % sector_size != 0 {
        return Err(SetupError::new(ProvisioningError::UnsupportedSectorSize {
            disk: disk.path.display().to_string(),
            sector_size,
        }));
    }
    Ok(PARTITION_ALIGNMENT_BYTES / sector_size)
}

/// Create one Linux RAID partition spanning `disk` and return a fresh record of
/// it. The partition is found again by a partition UUID generated up front.
pub fn create_single_partition(
    host: &dyn BlockDeviceHost,
    disk: &BlockDeviceRecord,
) -> Result<BlockDeviceRecord, SetupError> {
    let request = PartitionRequest {
        disk: disk.path.clone(),
        alignment: alignment_start_sector(disk)?,
        partition_uuid: Uuid::new_v4(),
    };

    info!(
        "Creating partition '{}' on disk '{}'",
        request.partition_uuid,
        disk.path.display()
    );
    settled(host, || {
        host.create_partition(&request)
            .structured(ProvisioningError::ExternalToolFailure {
                tool: "sgdisk".into(),
            })
    })
    .message(format!(
        "Failed to partition disk '{}'",
        disk.path.display()
    ))?;

    let wanted = request.partition_uuid.to_string();
    let partition = inventory::rescan(host, &disk.path)?
        .partitions()
        .find(|partition| {
            partition
                .partition_uuid
                .as_deref()
                .is_some_and(|uuid| uuid.eq_ignore_ascii_case(&wanted))
        })
        .cloned()
        .structured(ProvisioningError::PartitionNotFound {
            disk: disk.path.display().to_string(),
            partition_uuid: wanted,
        })?;

    debug!(
        "Partition '{}' on disk '{}' is '{}'",
        request.partition_uuid,
        disk.path.display(),
        partition.path.display()
    );
    Ok(partition)
}

/// Partition every disk, in the order given. With `parallel`, disks are
/// handled concurrently; each disk's create, settle and lookup stay on one
/// worker.
pub fn create_partitions(
    host: &dyn BlockDeviceHost,
    disks: &[&BlockDeviceRecord],
    parallel: bool,
) -> Result<Vec<BlockDeviceRecord>, SetupError> {
    if parallel {
        debug!("Partitioning {} disks in parallel", disks.len());
        disks
            .par_iter()
            .map(|disk| create_single_partition(host, disk))
            .collect()
    } else {
        disks
            .iter()
            .map(|disk| create_single_partition(host, disk))
            .collect()
    }
}

/// Paths of the given partitions.
pub fn member_paths(partitions: &[BlockDeviceRecord]) -> Vec<PathBuf> {
    partitions.iter().map(|p| p.path.clone()).collect()
}
