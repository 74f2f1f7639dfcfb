use std::{path::PathBuf, process::Command};

use strum_macros::IntoStaticStr;

#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("Failed to find dependency '{dependency}': {source}")]
    NotFound {
        dependency: Dependency,
        #[source]
        source: which::Error,
    },
    #[error("Failed to find program '{program}': {source}")]
    ProgramNotFound {
        program: String,
        #[source]
        source: which::Error,
    },
}

/// Resolve a program that is only known at runtime, either by name through
/// `$PATH` or as an explicit path.
pub fn find_program(program: &str) -> Result<PathBuf, DependencyError> {
    which::which(program).map_err(|source| DependencyError::ProgramNotFound {
        program: program.into(),
        source,
    })
}

/// External binaries the provisioning pipeline shells out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Dependency {
    Lsblk,
    Mdadm,
    Mkfs,
    Mount,
    Sgdisk,
    Udevadm,
    // Test dependencies
    #[cfg(test)]
    #[strum(serialize = "does-not-exist-1234")]
    DoesNotExist,
    #[cfg(test)]
    Echo,
}

/// Everything that must be installed before any device is touched.
pub const REQUIRED: [Dependency; 6] = [
    Dependency::Lsblk,
    Dependency::Udevadm,
    Dependency::Sgdisk,
    Dependency::Mdadm,
    Dependency::Mkfs,
    Dependency::Mount,
];

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.into())
    }
}

impl Dependency {
    /// For example, Dependency::Mdadm => "mdadm"
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Resolve the binary through `$PATH`.
    pub fn path(&self) -> Result<PathBuf, DependencyError> {
        which::which(self.name()).map_err(|source| DependencyError::NotFound {
            dependency: *self,
            source,
        })
    }

    /// A fresh `Command` for this binary.
    pub fn cmd(&self) -> Command {
        Command::new(self.name())
    }
}
