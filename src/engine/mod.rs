use std::path::PathBuf;

use log::{debug, info};
use serde::Serialize;

use storage_api::{
    config::SelectionCriteria,
    error::{SetupError, SetupResultExt},
    primitives::bytes::ByteCount,
};

use crate::host::BlockDeviceHost;

mod context;
pub mod eligibility;
pub mod filesystem;
pub mod inventory;
pub mod partitioning;
pub mod populate;
pub mod raid;
#[cfg(test)]
pub(crate) mod test_utils;

pub use context::EngineContext;
use inventory::DeviceKind;

/// What a successful run left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Provisioned {
    pub array: PathBuf,
    pub members: Vec<PathBuf>,
    pub filesystem_uuid: String,
    pub mount_point: PathBuf,
}

fn step<T>(
    name: &'static str,
    run: impl FnOnce() -> Result<T, SetupError>,
) -> Result<T, SetupError> {
    info!("Starting step '{name}'");
    let value = run().message(format!("Step '{name}' failed"))?;
    debug!("Finished step '{name}'");
    Ok(value)
}

/// Claim the eligible disks, assemble them into one array, then format,
/// mount, persist and populate it.
///
/// Stops at the first error. Nothing done before the error is undone.
pub fn provision(ctx: &EngineContext) -> Result<Provisioned, SetupError> {
    let config = ctx.config;
    let criteria = config.selection_criteria();

    let devices = step("Scan", || inventory::scan(ctx.host, None))?;
    let disks = step("Select", || {
        eligibility::select_member_disks(&devices, &criteria)
    })?;

    let partitions = step("Partition", || {
        partitioning::create_partitions(ctx.host, &disks, config.partitioning.parallel)
    })?;
    let members = partitioning::member_paths(&partitions);

    let array = step("Assemble", || {
        raid::assemble(ctx.host, &members, &config.mdraid)
    })?;

    let filesystem = step("Format", || {
        filesystem::make_filesystem(ctx.host, &array, &config.mkfs)?;
        filesystem::filesystem_uuid(ctx.host, &array.path, &config.mkfs)
    })?;

    step("Mount", || filesystem::mount(ctx.host, &array, &config.mount))?;

    let mount_point = &config.mount.mount_point.path;
    step("Persist", || {
        filesystem::persist(&ctx.fstab_path, &filesystem, mount_point)
    })?;

    if let Some(method) = &config.populate {
        step("Populate", || populate::populate(mount_point, method))?;
    }

    info!(
        "Mounted '{}' ({} member(s)) on '{}'",
        array.path.display(),
        members.len(),
        mount_point.display()
    );
    Ok(Provisioned {
        array: array.path,
        members,
        filesystem_uuid: filesystem.uuid,
        mount_point: mount_point.clone(),
    })
}

/// One line of the `scan` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeviceReport {
    pub path: PathBuf,
    pub kind: DeviceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub size: ByteCount,
    pub initialized: bool,
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Describe every recognized top-level device without changing anything.
pub fn scan_report(
    host: &dyn BlockDeviceHost,
    criteria: &SelectionCriteria,
) -> Result<Vec<DeviceReport>, SetupError> {
    Ok(inventory::scan(host, None)?
        .into_iter()
        .map(|device| {
            let reason = eligibility::ineligibility(&device, criteria);
            DeviceReport {
                initialized: eligibility::is_initialized(&device),
                eligible: reason.is_none(),
                reason: reason.map(|r| r.to_string()),
                size: ByteCount(device.size),
                path: device.path,
                kind: device.kind,
                model: device.model,
            }
        })
        .collect())
}
