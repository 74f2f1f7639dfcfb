use std::{path::Path, process::Command};

use anyhow::{bail, Context, Error};
use log::debug;

use crate::{dependencies::Dependency, exe::RunAndCheck, files};

/// Mounts the block device in `path` on the directory `mount_dir`, letting
/// mount detect the filesystem type.
pub fn mount(
    path: impl AsRef<Path>,
    mount_dir: impl AsRef<Path>,
    options: &[String],
) -> Result<(), Error> {
    mount_command(path.as_ref(), mount_dir.as_ref(), options)
        .run_and_check()
        .context(format!(
            "Failed to mount {} to path {}",
            path.as_ref().display(),
            mount_dir.as_ref().display(),
        ))
}

fn mount_command(path: &Path, mount_dir: &Path, options: &[String]) -> Command {
    let mut command = Dependency::Mount.cmd();
    if !options.is_empty() {
        command.arg("-o").arg(options.join(","));
    }
    command.arg(path).arg(mount_dir);
    command
}

/// Ensure that `target_path` is a directory that can be mounted on, creating
/// it when missing.
pub fn ensure_mount_directory(target_path: &Path) -> Result<(), Error> {
    if target_path.exists() {
        if !target_path.is_dir() {
            bail!("Mount path '{}' is not a directory", target_path.display());
        }
        return Ok(());
    }

    debug!("Creating mount point '{}'", target_path.display());
    files::create_dirs(target_path).context(format!(
        "Failed to create mount path '{}'",
        target_path.display()
    ))
}
