use std::{path::Path, process::Command};

use anyhow::{Context, Error};
use log::debug;
use uuid::Uuid;

use storage_api::constants::LINUX_RAID_PARTITION_TYPE;

use crate::{dependencies::Dependency, exe::RunAndCheck};

/// Create partition 1 spanning the largest free region of `disk`, typed as a
/// Linux RAID member and carrying `partition_uuid` as its GPT unique GUID.
///
/// `alignment` is in sectors of the disk.
pub fn create_single_partition(
    disk: &Path,
    alignment: u64,
    partition_uuid: &Uuid,
) -> Result<(), Error> {
    debug!(
        "Creating partition '{}' on disk '{}'",
        partition_uuid,
        disk.display()
    );

    single_partition_command(disk, alignment, partition_uuid)
        .run_and_check()
        .with_context(|| format!("Failed to partition disk '{}'", disk.display()))
}

fn single_partition_command(disk: &Path, alignment: u64, partition_uuid: &Uuid) -> Command {
    let mut command = Dependency::Sgdisk.cmd();
    command
        .arg(format!("--set-alignment={alignment}"))
        .arg("--largest-new=1")
        .arg(format!("--typecode=1:{LINUX_RAID_PARTITION_TYPE}"))
        .arg(format!("--partition-guid=1:{partition_uuid}"))
        .arg(disk);
    command
}
