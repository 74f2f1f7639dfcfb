use std::path::PathBuf;

/// A configuration that parsed but cannot be acted upon.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum InvalidConfigError {
    #[error("Unknown log level '{level}'")]
    InvalidLogLevel { level: String },

    #[error("At least one device model must be listed")]
    NoModels,

    #[error("Minimum size {min_size} is larger than maximum size {max_size}")]
    SizeRange { min_size: u64, max_size: u64 },

    #[error("Array name '{name}' must be non-empty and may not contain '/'")]
    InvalidArrayName { name: String },

    #[error("Mount point '{}' must be an absolute path", path.display())]
    RelativeMountPoint { path: PathBuf },

    #[error("Mount options may not be empty strings or contain ','")]
    InvalidMountOption,

    #[error("Custom mkfs command must not be empty")]
    EmptyMkfsCommand,

    #[error("Filesystem type must not be empty")]
    EmptyFilesystemType,

    #[error("Reserved blocks percentage {percentage} is above 50")]
    ReservedBlocksPercentage { percentage: u8 },

    #[error("Source '{}' must be an absolute path", path.display())]
    RelativePopulateSource { path: PathBuf },

    #[error("Entry '{}' must be a relative path inside the mount point", path.display())]
    EntryOutsideMountPoint { path: PathBuf },

    #[error("Entry '{}' is a directory and cannot have contents", path.display())]
    DirectoryWithContents { path: PathBuf },

    #[error("Mode {mode:#o} of entry '{}' is not a permission mode", path.display())]
    InvalidMode { path: PathBuf, mode: u32 },
}
