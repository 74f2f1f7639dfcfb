use std::path::Path;

use log::{debug, info};

use osutils::files;
use storage_api::{
    config::{EntryType, Populate, PopulateEntry},
    error::{PopulationError, ReportError, SetupError, SetupResultExt},
};

fn create_entry(root: &Path, entry: &PopulateEntry) -> Result<(), anyhow::Error> {
    let path = root.join(&entry.path);
    debug!("Creating {:?} '{}'", entry.entry_type, path.display());

    match entry.entry_type {
        EntryType::Directory => files::create_dirs(&path)?,
        EntryType::File => files::write_file(
            &path,
            entry.contents.as_deref().unwrap_or_default().as_bytes(),
        )?,
    }

    files::set_ownership(&path, entry.uid, entry.gid)?;
    if let Some(mode) = entry.mode {
        files::set_mode(&path, mode.0)?;
    }

    Ok(())
}

/// Fill the freshly mounted filesystem at `mount_point`.
pub fn populate(mount_point: &Path, method: &Populate) -> Result<(), SetupError> {
    match method {
        Populate::Directory { source_path } => {
            info!(
                "Populating '{}' from directory '{}'",
                mount_point.display(),
                source_path.display()
            );
            osutils::populate::sync_directory(source_path, mount_point).structured(
                PopulationError::SyncDirectory {
                    source_path: source_path.display().to_string(),
                },
            )
        }
        Populate::Archive { archive_path } => {
            info!(
                "Populating '{}' from archive '{}'",
                mount_point.display(),
                archive_path.display()
            );
            osutils::populate::extract_archive(archive_path, mount_point).structured(
                PopulationError::ExtractArchive {
                    archive: archive_path.display().to_string(),
                },
            )
        }
        Populate::Config { entries } => {
            info!(
                "Populating '{}' with {} configured entries",
                mount_point.display(),
                entries.len()
            );
            for entry in entries {
                create_entry(mount_point, entry)
                    .structured(PopulationError::CreateEntries)
                    .message(format!(
                        "Failed to create '{}'",
                        entry.path.display()
                    ))?;
            }
            Ok(())
        }
    }
}
