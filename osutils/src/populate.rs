use std::{
    fs::File,
    io::{Read, Seek},
    path::Path,
};

use anyhow::{bail, Context, Error};
use log::{debug, info};
use tar::{Archive, Builder, HeaderMode};

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Copy the tree under `source` into `target`, keeping modes, ownership and
/// symlinks. The tree is streamed through a tar archive spooled to an
/// anonymous temporary file.
pub fn sync_directory(source: &Path, target: &Path) -> Result<(), Error> {
    info!(
        "Copying '{}' into '{}'",
        source.display(),
        target.display()
    );

    if !source.is_dir() {
        bail!("Source '{}' is not a directory", source.display());
    }

    let spool = tempfile::tempfile().context("Failed to create spool file")?;
    let mut builder = Builder::new(spool);
    builder.follow_symlinks(false);
    builder.mode(HeaderMode::Complete);
    builder
        .append_dir_all(".", source)
        .with_context(|| format!("Failed to archive '{}'", source.display()))?;

    let mut spool = builder.into_inner().context("Failed to finish archive")?;
    spool.rewind().context("Failed to rewind spool file")?;

    unpack(spool, target)
}

/// Unpack the tar archive at `archive_path` into `target`. zstd-compressed
/// archives are detected by their magic number. Fails on the first entry that
/// would land outside `target`.
pub fn extract_archive(archive_path: &Path, target: &Path) -> Result<(), Error> {
    info!(
        "Extracting '{}' into '{}'",
        archive_path.display(),
        target.display()
    );

    let mut file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive '{}'", archive_path.display()))?;

    let mut magic = [0u8; 4];
    let compressed = match file.read_exact(&mut magic) {
        Ok(()) => magic == ZSTD_MAGIC,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(e).context("Failed to read archive header"),
    };
    file.rewind().context("Failed to rewind archive")?;

    if compressed {
        debug!("Archive '{}' is zstd-compressed", archive_path.display());
        let decoder = zstd::Decoder::new(file).context("Failed to create zstd decoder")?;
        unpack(decoder, target)
    } else {
        unpack(file, target)
    }
}

fn unpack(reader: impl Read, target: &Path) -> Result<(), Error> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_preserve_ownerships(true);
    archive.set_overwrite(true);

    for entry in archive.entries().context("Failed to read archive")? {
        let mut entry = entry.context("Failed to read archive entry")?;
        let path = entry
            .path()
            .context("Archive entry has an invalid path")?
            .into_owned();

        let unpacked = entry
            .unpack_in(target)
            .with_context(|| format!("Failed to unpack '{}'", path.display()))?;
        if !unpacked {
            bail!(
                "Archive entry '{}' points outside of '{}'",
                path.display(),
                target.display()
            );
        }
    }

    Ok(())
}
