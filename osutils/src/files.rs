use std::{
    fs::{File, Permissions},
    io::Write,
    os::unix::fs::PermissionsExt,
    path::Path,
};

use anyhow::{Context, Error};
use nix::unistd::{Gid, Group, Uid, User};

/// Creates all directories in a path if they don't exist
pub fn create_dirs<S>(path: S) -> Result<(), Error>
where
    S: AsRef<Path>,
{
    std::fs::create_dir_all(path.as_ref()).context(format!(
        "Could not create path: {}",
        path.as_ref().display()
    ))
}

/// Creates a file and all parent directories if they don't exist
pub fn create_file<S>(path: S) -> Result<File, Error>
where
    S: AsRef<Path>,
{
    if let Some(parent) = path.as_ref().parent() {
        create_dirs(parent)?;
    }

    File::create(path.as_ref()).context(format!(
        "Could not create file: {}",
        path.as_ref().display()
    ))
}

/// Writes `contents` to a new or truncated file, creating parent directories
pub fn write_file<S>(path: S, contents: &[u8]) -> Result<(), Error>
where
    S: AsRef<Path>,
{
    create_file(path.as_ref())?
        .write_all(contents)
        .context(format!(
            "Could not write to file: {}",
            path.as_ref().display()
        ))
}

pub fn set_mode<S>(path: S, mode: u32) -> Result<(), Error>
where
    S: AsRef<Path>,
{
    std::fs::set_permissions(path.as_ref(), Permissions::from_mode(mode)).context(format!(
        "Could not set permissions {:#o} for {}",
        mode,
        path.as_ref().display()
    ))
}

/// Changes owner and/or group of `path`. `None` leaves that id unchanged.
pub fn set_ownership<S>(path: S, uid: Option<u32>, gid: Option<u32>) -> Result<(), Error>
where
    S: AsRef<Path>,
{
    if uid.is_none() && gid.is_none() {
        return Ok(());
    }

    nix::unistd::chown(
        path.as_ref(),
        uid.map(Uid::from_raw),
        gid.map(Gid::from_raw),
    )
    .context(format!(
        "Could not change ownership of {} to {}:{}",
        path.as_ref().display(),
        uid.map(|u| u.to_string()).unwrap_or_default(),
        gid.map(|g| g.to_string()).unwrap_or_default(),
    ))
}

/// Looks up user and group names in the host's account databases.
pub fn resolve_ownership(
    user: Option<&str>,
    group: Option<&str>,
) -> Result<(Option<u32>, Option<u32>), Error> {
    let uid = user
        .map(|name| {
            User::from_name(name)
                .context(format!("Failed to look up user '{name}'"))?
                .map(|user| user.uid.as_raw())
                .context(format!("User '{name}' does not exist"))
        })
        .transpose()?;

    let gid = group
        .map(|name| {
            Group::from_name(name)
                .context(format!("Failed to look up group '{name}'"))?
                .map(|group| group.gid.as_raw())
                .context(format!("Group '{name}' does not exist"))
        })
        .transpose()?;

    Ok((uid, gid))
}
