use std::{io::ErrorKind, os::unix::fs::FileTypeExt, path::Path};

use anyhow::{Context, Error};

/// Returns true when `path` exists and, after following symlinks, is a block
/// special file. A missing path is not an error.
pub fn is_block_device(path: impl AsRef<Path>) -> Result<bool, Error> {
    match std::fs::metadata(path.as_ref()) {
        Ok(metadata) => Ok(metadata.file_type().is_block_device()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to stat '{}'", path.as_ref().display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_block_device() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("file");
        std::fs::write(&file, b"").unwrap();

        assert!(!is_block_device(temp_dir.path()).unwrap());
        assert!(!is_block_device(&file).unwrap());
        assert!(!is_block_device(temp_dir.path().join("missing")).unwrap());

        let link = temp_dir.path().join("link");
        std::os::unix::fs::symlink(&file, &link).unwrap();
        assert!(!is_block_device(&link).unwrap());
    }
}
