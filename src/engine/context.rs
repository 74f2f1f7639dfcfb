use std::path::PathBuf;

use storage_api::{config::Config, constants::FSTAB_PATH};

use crate::host::BlockDeviceHost;

/// Everything a provisioning run works with, passed explicitly to every step.
pub struct EngineContext<'a> {
    /// Block layer of the machine being provisioned.
    pub host: &'a dyn BlockDeviceHost,

    pub config: &'a Config,

    /// Mount table the new filesystem is recorded in.
    pub fstab_path: PathBuf,
}

impl<'a> EngineContext<'a> {
    pub fn new(host: &'a dyn BlockDeviceHost, config: &'a Config) -> Self {
        Self {
            host,
            config,
            fstab_path: PathBuf::from(FSTAB_PATH),
        }
    }

    pub fn with_fstab_path(self, fstab_path: impl Into<PathBuf>) -> Self {
        Self {
            fstab_path: fstab_path.into(),
            ..self
        }
    }
}
