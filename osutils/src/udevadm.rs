use anyhow::{Context, Error};

use crate::{dependencies::Dependency, exe::RunAndCheck};

/// Block until udev has processed every queued event, so that the device tree
/// reflects all prior partition and array changes.
pub fn settle() -> Result<(), Error> {
    Dependency::Udevadm
        .cmd()
        .arg("settle")
        .run_and_check()
        .context("Failed to settle udev")
}
