use std::path::{Path, PathBuf};

use anyhow::Error;
use log::{debug, trace};
use uuid::Uuid;

use osutils::{
    block_devices, dependencies, lsblk::BlockDevice, mdadm, mkfs, mount, sgdisk, udevadm,
};
use storage_api::{
    config::{MkfsConfig, RaidLevel},
    error::{InitializationError, ProvisioningError, ReportError, SetupError, SetupResultExt},
};

/// Request to create a single Linux RAID partition covering a disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRequest {
    pub disk: PathBuf,
    /// Partition start alignment, in sectors.
    pub alignment: u64,
    pub partition_uuid: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayRequest {
    pub path: PathBuf,
    pub level: RaidLevel,
    pub members: Vec<PathBuf>,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilesystemRequest {
    Builtin {
        device: PathBuf,
        filesystem: String,
        label: String,
        reserved_blocks_percentage: Option<u8>,
    },
    Custom {
        device: PathBuf,
        command: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    pub device: PathBuf,
    pub mount_point: PathBuf,
    pub options: Vec<String>,
}

/// Everything the provisioning engine needs from the machine's block layer.
///
/// Each call maps to one invocation of a system tool. Implementations do not
/// settle the device tree themselves; callers wrap mutations in [`settled`].
pub trait BlockDeviceHost: Send + Sync {
    /// Wait for the kernel to finish publishing device tree changes.
    fn settle(&self) -> Result<(), Error>;

    /// List block devices with their children. With a path, list only that
    /// device; an unknown path is an error.
    fn list_block_devices(&self, path: Option<&Path>) -> Result<Vec<BlockDevice>, Error>;

    fn create_partition(&self, request: &PartitionRequest) -> Result<(), Error>;

    fn create_array(&self, request: &ArrayRequest) -> Result<(), Error>;

    /// Kernel-level check that `path` is a block special file.
    fn is_block_device(&self, path: &Path) -> Result<bool, Error>;

    fn make_filesystem(&self, request: &FilesystemRequest) -> Result<(), Error>;

    fn mount(&self, request: &MountRequest) -> Result<(), Error>;
}

/// The machine the tool runs on.
#[derive(Debug, Default)]
pub struct SystemHost;

impl BlockDeviceHost for SystemHost {
    fn settle(&self) -> Result<(), Error> {
        udevadm::settle()
    }

    fn list_block_devices(&self, path: Option<&Path>) -> Result<Vec<BlockDevice>, Error> {
        osutils::lsblk::list(path)
    }

    fn create_partition(&self, request: &PartitionRequest) -> Result<(), Error> {
        sgdisk::create_single_partition(&request.disk, request.alignment, &request.partition_uuid)
    }

    fn create_array(&self, request: &ArrayRequest) -> Result<(), Error> {
        mdadm::create(&request.path, request.level, &request.members, request.force)
    }

    fn is_block_device(&self, path: &Path) -> Result<bool, Error> {
        block_devices::is_block_device(path)
    }

    fn make_filesystem(&self, request: &FilesystemRequest) -> Result<(), Error> {
        match request {
            FilesystemRequest::Builtin {
                device,
                filesystem,
                label,
                reserved_blocks_percentage,
            } => mkfs::run(device, filesystem, label, *reserved_blocks_percentage),
            FilesystemRequest::Custom { device, command } => mkfs::run_custom(command, device),
        }
    }

    fn mount(&self, request: &MountRequest) -> Result<(), Error> {
        mount::mount(&request.device, &request.mount_point, &request.options)
    }
}

/// Make sure the program that formats the array can be found. `mkfs` only
/// dispatches to `mkfs.<type>`, so its presence alone proves nothing.
pub fn check_formatter(config: &MkfsConfig) -> Result<(), SetupError> {
    let program = config.formatter_program();
    let path = dependencies::find_program(&program)
        .structured(InitializationError::MissingDependency {
            binary: program.clone(),
        })?;
    debug!("Found '{program}' at '{}'", path.display());
    Ok(())
}

/// Check every binary a run needs before any device is touched.
pub fn check_dependencies(config: &MkfsConfig) -> Result<(), SetupError> {
    for dependency in dependencies::REQUIRED {
        let path = dependency
            .path()
            .structured(InitializationError::MissingDependency {
                binary: dependency.name().into(),
            })?;
        debug!("Found '{}' at '{}'", dependency.name(), path.display());
    }
    check_formatter(config)
}

fn settle(host: &dyn BlockDeviceHost) -> Result<(), SetupError> {
    host.settle()
        .structured(ProvisioningError::ExternalToolFailure {
            tool: "udevadm".into(),
        })
}

/// Run `operation` between two settle barriers. The trailing barrier runs
/// whether or not the operation succeeded; if both fail, the operation's
/// error is returned with the settle failure attached.
pub fn settled<T>(
    host: &dyn BlockDeviceHost,
    operation: impl FnOnce() -> Result<T, SetupError>,
) -> Result<T, SetupError> {
    trace!("Settling device tree before operation");
    settle(host).message("Failed to settle device tree before operation")?;

    let result = operation();

    trace!("Settling device tree after operation");
    match (result, host.settle()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e)
            .structured(ProvisioningError::ExternalToolFailure {
                tool: "udevadm".into(),
            })
            .message("Failed to settle device tree after operation"),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(settle_error)) => Err(e.secondary_error_context(settle_error)),
    }
}
