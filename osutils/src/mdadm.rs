use std::{
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Error};
use log::debug;

use storage_api::config::RaidLevel;

use crate::{dependencies::Dependency, exe::RunAndCheck};

/// Create an array at `raid_path` from `device_paths`.
///
/// The array is created with `--homehost=any` so that it keeps its name when
/// assembled on another host. `force` is required by mdadm to build an array
/// from a single device.
pub fn create(
    raid_path: &Path,
    level: RaidLevel,
    device_paths: &[PathBuf],
    force: bool,
) -> Result<(), Error> {
    debug!(
        "Creating RAID array '{}' ({level}) from {} device(s)",
        raid_path.display(),
        device_paths.len()
    );

    create_command(raid_path, level, device_paths, force)
        .run_and_check()
        .context("Failed to run mdadm create")
}

fn create_command(
    raid_path: &Path,
    level: RaidLevel,
    device_paths: &[PathBuf],
    force: bool,
) -> Command {
    let mut command = Dependency::Mdadm.cmd();
    command
        .arg("--create")
        .arg(raid_path)
        .arg("--homehost=any")
        .arg(format!("--level={level}"));
    if force {
        command.arg("--force");
    }
    command
        .arg(format!("--raid-devices={}", device_paths.len()))
        .args(device_paths);
    command
}
