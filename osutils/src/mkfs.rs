use std::{path::Path, process::Command};

use anyhow::{Context, Error};

use crate::{dependencies::Dependency, exe::RunAndCheck};

/// Format `device_path` with `filesystem`. The reserved block percentage is
/// only understood by the ext family and is skipped when `None`.
pub fn run(
    device_path: &Path,
    filesystem: &str,
    label: &str,
    reserved_blocks_percentage: Option<u8>,
) -> Result<(), Error> {
    mkfs_command(device_path, filesystem, label, reserved_blocks_percentage)
        .run_and_check()
        .context("Failed to execute mkfs")
}

/// Format `device_path` with an operator supplied command line. The device
/// path is appended as the final argument.
pub fn run_custom(command: &[String], device_path: &Path) -> Result<(), Error> {
    custom_command(command, device_path)?
        .run_and_check()
        .context("Failed to execute custom mkfs command")
}

fn mkfs_command(
    device_path: &Path,
    filesystem: &str,
    label: &str,
    reserved_blocks_percentage: Option<u8>,
) -> Command {
    let mut command = Dependency::Mkfs.cmd();
    command.arg("--type").arg(filesystem).arg("-L").arg(label);
    if let Some(percentage) = reserved_blocks_percentage {
        command.arg("-m").arg(percentage.to_string());
    }
    command.arg(device_path);
    command
}

fn custom_command(command: &[String], device_path: &Path) -> Result<Command, Error> {
    let (program, args) = command
        .split_first()
        .context("Custom mkfs command is empty")?;
    let mut command = Command::new(program);
    command.args(args).arg(device_path);
    Ok(command)
}
