use std::path::Path;

use log::{debug, info};

use osutils::{files, mount::ensure_mount_directory, tabfile::TabFileEntry};
use storage_api::{
    config::{MkfsConfig, MountConfig},
    constants::FSTAB_MOUNT_OPTIONS,
    error::{ProvisioningError, ReportError, SetupError, SetupResultExt},
};

use crate::host::{settled, BlockDeviceHost, FilesystemRequest, MountRequest};

use super::inventory::{self, BlockDeviceRecord};

/// The filesystem as found on the array after formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedFilesystem {
    /// Lower case.
    pub uuid: String,
    pub filesystem_type: String,
}

fn filesystem_request(device: &Path, config: &MkfsConfig) -> FilesystemRequest {
    match &config.command {
        Some(command) => FilesystemRequest::Custom {
            device: device.to_path_buf(),
            command: command.clone(),
        },
        None => FilesystemRequest::Builtin {
            device: device.to_path_buf(),
            filesystem: config.filesystem.clone(),
            label: config.label.clone(),
            reserved_blocks_percentage: config
                .is_ext_family()
                .then_some(config.reserved_blocks_percentage),
        },
    }
}

/// Format the array.
pub fn make_filesystem(
    host: &dyn BlockDeviceHost,
    array: &BlockDeviceRecord,
    config: &MkfsConfig,
) -> Result<(), SetupError> {
    let request = filesystem_request(&array.path, config);
    match &request {
        FilesystemRequest::Builtin { filesystem, .. } => info!(
            "Creating {filesystem} filesystem on '{}'",
            array.path.display()
        ),
        FilesystemRequest::Custom { command, .. } => info!(
            "Creating filesystem on '{}' with '{}'",
            array.path.display(),
            command.join(" ")
        ),
    }

    settled(host, || {
        host.make_filesystem(&request)
            .structured(ProvisioningError::ExternalToolFailure {
                tool: "mkfs".into(),
            })
    })
    .message(format!(
        "Failed to create filesystem on '{}'",
        array.path.display()
    ))
}

/// Look up the filesystem just created on `device`. The type falls back to
/// the configured one when the device does not report it.
pub fn filesystem_uuid(
    host: &dyn BlockDeviceHost,
    device: &Path,
    config: &MkfsConfig,
) -> Result<ProvisionedFilesystem, SetupError> {
    let record = inventory::rescan(host, device)?;
    let uuid = record
        .filesystem_uuid
        .filter(|uuid| !uuid.is_empty())
        .structured(ProvisioningError::FilesystemUuidMissing {
            path: device.display().to_string(),
        })?
        .to_lowercase();

    let filesystem_type = record
        .filesystem_type
        .unwrap_or_else(|| config.filesystem.clone());

    debug!(
        "Filesystem on '{}' is {filesystem_type} with UUID '{uuid}'",
        device.display()
    );
    Ok(ProvisionedFilesystem {
        uuid,
        filesystem_type,
    })
}

/// Mount the array on the configured mount point, creating the directory if
/// needed, then hand the mount point to the configured owner.
pub fn mount(
    host: &dyn BlockDeviceHost,
    array: &BlockDeviceRecord,
    config: &MountConfig,
) -> Result<(), SetupError> {
    let mount_point = &config.mount_point.path;
    ensure_mount_directory(mount_point).structured(ProvisioningError::CreateMountPoint {
        path: mount_point.display().to_string(),
    })?;

    info!(
        "Mounting '{}' on '{}'",
        array.path.display(),
        mount_point.display()
    );
    host.mount(&MountRequest {
        device: array.path.clone(),
        mount_point: mount_point.clone(),
        options: config.options.clone(),
    })
    .structured(ProvisioningError::ExternalToolFailure {
        tool: "mount".into(),
    })
    .message(format!(
        "Failed to mount '{}' on '{}'",
        array.path.display(),
        mount_point.display()
    ))?;

    if let Some(owner) = &config.mount_point.chown {
        debug!(
            "Changing ownership of '{}' to {:?}:{:?}",
            mount_point.display(),
            owner.user,
            owner.group
        );
        files::resolve_ownership(owner.user.as_deref(), owner.group.as_deref())
            .and_then(|(uid, gid)| files::set_ownership(mount_point, uid, gid))
            .structured(ProvisioningError::MountPointOwnership {
                path: mount_point.display().to_string(),
            })?;
    }

    Ok(())
}

/// Record the mount in the mount table at `fstab_path`, keyed by filesystem
/// UUID. Only ever appends.
pub fn persist(
    fstab_path: &Path,
    filesystem: &ProvisionedFilesystem,
    mount_point: &Path,
) -> Result<(), SetupError> {
    let entry = TabFileEntry::new_uuid(
        &filesystem.uuid,
        mount_point,
        &filesystem.filesystem_type,
    )
    .with_options(
        FSTAB_MOUNT_OPTIONS
            .split(',')
            .map(str::to_owned)
            .collect(),
    );

    info!(
        "Appending to '{}': {}",
        fstab_path.display(),
        entry.render().trim_end()
    );
    entry
        .append_to(fstab_path)
        .structured(ProvisioningError::PersistMount {
            path: fstab_path.display().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use storage_api::{
        config::{MountPoint, Ownership},
        error::ErrorKind,
    };

    use crate::engine::test_utils::{disk, Call, Failure, FakeHost, FAKE_FILESYSTEM_UUID};

    use super::*;

    fn array_host() -> (FakeHost, BlockDeviceRecord) {
        let mut array = disk("/dev/md/ephemeral", None, 1 << 30);
        array.device_type = "raid0".into();
        let host = FakeHost::new().with_device(array);
        let record = inventory::rescan(&host, Path::new("/dev/md/ephemeral")).unwrap();
        (host, record)
    }

    fn mount_config(path: &Path) -> MountConfig {
        MountConfig {
            mount_point: MountPoint {
                path: path.to_path_buf(),
                chown: None,
            },
            options: vec!["noatime".into()],
        }
    }

    #[test]
    fn test_filesystem_request() {
        let device = Path::new("/dev/md/ephemeral");
        assert_eq!(
            filesystem_request(device, &MkfsConfig::default()),
            FilesystemRequest::Builtin {
                device: device.into(),
                filesystem: "ext4".into(),
                label: "ephemeral".into(),
                reserved_blocks_percentage: Some(0),
            }
        );

        let xfs = MkfsConfig {
            filesystem: "xfs".into(),
            ..Default::default()
        };
        assert!(matches!(
            filesystem_request(device, &xfs),
            FilesystemRequest::Builtin {
                reserved_blocks_percentage: None,
                ..
            }
        ));

        let custom = MkfsConfig {
            command: Some(vec!["mkfs.xfs".into(), "-f".into()]),
            ..Default::default()
        };
        assert_eq!(
            filesystem_request(device, &custom),
            FilesystemRequest::Custom {
                device: device.into(),
                command: vec!["mkfs.xfs".into(), "-f".into()],
            }
        );
    }

    #[test]
    fn test_make_filesystem_and_uuid() {
        let (host, array) = array_host();
        make_filesystem(&host, &array, &MkfsConfig::default()).unwrap();

        let filesystem =
            filesystem_uuid(&host, &array.path, &MkfsConfig::default()).unwrap();
        assert_eq!(filesystem.uuid, FAKE_FILESYSTEM_UUID.to_lowercase());
        assert_eq!(filesystem.filesystem_type, "ext4");

        // The record taken before formatting knows nothing about it.
        assert_eq!(array.filesystem_uuid, None);
    }

    #[test]
    fn test_filesystem_type_fallback() {
        let (host, array) = array_host();
        let config = MkfsConfig {
            filesystem: "btrfs".into(),
            command: Some(vec!["/usr/local/bin/format".into()]),
            ..Default::default()
        };
        make_filesystem(&host, &array, &config).unwrap();
        let filesystem = filesystem_uuid(&host, &array.path, &config).unwrap();
        assert_eq!(filesystem.filesystem_type, "btrfs");
    }

    #[test]
    fn test_missing_uuid() {
        let (host, array) = array_host();
        let host = host.without_filesystem_uuid();
        make_filesystem(&host, &array, &MkfsConfig::default()).unwrap();
        assert_eq!(
            filesystem_uuid(&host, &array.path, &MkfsConfig::default())
                .unwrap_err()
                .kind(),
            &ErrorKind::Provisioning(ProvisioningError::FilesystemUuidMissing {
                path: "/dev/md/ephemeral".into()
            })
        );
    }

    #[test]
    fn test_mkfs_failure() {
        let (host, array) = array_host();
        let host = host.fail(Failure::MakeFilesystem);
        assert!(matches!(
            make_filesystem(&host, &array, &MkfsConfig::default())
                .unwrap_err()
                .kind(),
            ErrorKind::Provisioning(ProvisioningError::ExternalToolFailure { tool }) if tool == "mkfs"
        ));
    }

    #[test]
    fn test_mount() {
        let (host, array) = array_host();
        let temp_dir = tempfile::tempdir().unwrap();
        let mount_point = temp_dir.path().join("mnt/ephemeral");

        mount(&host, &array, &mount_config(&mount_point)).unwrap();
        assert!(mount_point.is_dir());
        assert_eq!(
            host.mutating_calls(),
            vec![Call::Mount(MountRequest {
                device: "/dev/md/ephemeral".into(),
                mount_point: mount_point.clone(),
                options: vec!["noatime".into()],
            })]
        );
    }

    #[test]
    fn test_mount_errors() {
        let (host, array) = array_host();
        let temp_dir = tempfile::tempdir().unwrap();

        let file = temp_dir.path().join("file");
        fs::write(&file, "").unwrap();
        assert!(matches!(
            mount(&host, &array, &mount_config(&file)).unwrap_err().kind(),
            ErrorKind::Provisioning(ProvisioningError::CreateMountPoint { .. })
        ));
        assert!(host.mutating_calls().is_empty());

        let mut config = mount_config(&temp_dir.path().join("mnt"));
        config.mount_point.chown = Some(Ownership {
            user: Some("no-such-user-ephemeral-1234".into()),
            group: None,
        });
        assert!(matches!(
            mount(&host, &array, &config).unwrap_err().kind(),
            ErrorKind::Provisioning(ProvisioningError::MountPointOwnership { .. })
        ));

        let host = FakeHost::new().fail(Failure::Mount);
        assert!(matches!(
            mount(&host, &array, &mount_config(&temp_dir.path().join("mnt")))
                .unwrap_err()
                .kind(),
            ErrorKind::Provisioning(ProvisioningError::ExternalToolFailure { tool }) if tool == "mount"
        ));
    }

    #[test]
    fn test_persist_appends() {
        let temp_dir = tempfile::tempdir().unwrap();
        let fstab = temp_dir.path().join("fstab");
        fs::write(&fstab, "# existing\nUUID=abc / ext4 defaults 0 1\n").unwrap();

        let filesystem = ProvisionedFilesystem {
            uuid: "0f6e6f2c-2f0a-4c55-8d7b-6c1d7e3b9a10".into(),
            filesystem_type: "ext4".into(),
        };
        persist(&fstab, &filesystem, Path::new("/mnt/ephemeral")).unwrap();

        assert_eq!(
            fs::read_to_string(&fstab).unwrap(),
            "# existing\n\
            UUID=abc / ext4 defaults 0 1\n\
            UUID=0f6e6f2c-2f0a-4c55-8d7b-6c1d7e3b9a10 /mnt/ephemeral ext4 defaults,discard 0 0\n"
        );

        let error = persist(
            &PathBuf::from("/nonexistent-dir-1234/fstab"),
            &filesystem,
            Path::new("/mnt/ephemeral"),
        )
        .unwrap_err();
        assert!(matches!(
            error.kind(),
            ErrorKind::Provisioning(ProvisioningError::PersistMount { .. })
        ));
    }
}
