use const_format::formatcp;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ephemeral-storage-setup/config.yml";

/// System mount table that persists mounts across reboots.
pub const FSTAB_PATH: &str = "/etc/fstab";

/// Directory in which md arrays get a stable, name-based device node.
pub const MD_DEVICE_DIRECTORY: &str = "/dev/md";

/// Default name of the assembled array, i.e. `/dev/md/ephemeral`.
pub const DEFAULT_ARRAY_NAME: &str = "ephemeral";

/// Default filesystem label.
pub const DEFAULT_FILESYSTEM_LABEL: &str = "ephemeral";

/// Default filesystem type.
pub const DEFAULT_FILESYSTEM_TYPE: &str = "ext4";

/// Device models claimed when the configuration does not list any.
pub const DEFAULT_MODELS: [&str; 2] = [
    "Amazon EC2 NVMe Instance Storage",
    "Amazon Elastic Block Store",
];

/// Alignment of the first sector of every member partition.
pub const PARTITION_ALIGNMENT_BYTES: u64 = 4 * 1024 * 1024;

/// GPT type GUID of a "Linux RAID" partition (sgdisk code fd00). The kernel and
/// udev use it to auto-assemble the array on boot.
pub const LINUX_RAID_PARTITION_TYPE: &str = "a19d880f-05fc-4d3b-a006-743f0f84911e";

/// Options written to the mount table for the provisioned filesystem.
pub const FSTAB_MOUNT_OPTIONS: &str = "defaults,discard";

/// Stable device node of the array assembled under the default name.
pub const DEFAULT_ARRAY_PATH: &str = formatcp!("{MD_DEVICE_DIRECTORY}/{DEFAULT_ARRAY_NAME}");
