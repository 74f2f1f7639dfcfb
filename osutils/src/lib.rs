pub mod block_devices;
pub mod dependencies;
pub mod exe;
pub mod files;
pub mod lsblk;
pub mod mdadm;
pub mod mkfs;
pub mod mount;
pub mod populate;
pub mod sgdisk;
pub mod tabfile;
pub mod udevadm;

pub(crate) mod crate_private {
    pub trait Sealed {}
}
