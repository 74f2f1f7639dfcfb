use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Error};

/// A single line of an fstab-style file.
#[derive(Debug, PartialEq, Eq)]
pub struct TabFileEntry {
    /// Filesystem UUID, written as `UUID=<uuid>`.
    pub uuid: String,
    pub mount_point: PathBuf,
    pub fs_type: String,
    pub options: Vec<String>,
    pub dump: u8,
    pub fsck_pass: u8,
}

impl TabFileEntry {
    /// Entry for the filesystem with UUID `uuid`. Dump and fsck pass are 0.
    pub fn new_uuid(
        uuid: impl Into<String>,
        mount_point: impl Into<PathBuf>,
        fs_type: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            mount_point: mount_point.into(),
            fs_type: fs_type.into(),
            options: Vec::new(),
            dump: 0,
            fsck_pass: 0,
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    /// Render this entry as a newline-terminated line.
    pub fn render(&self) -> String {
        let options = if self.options.is_empty() {
            "defaults".into()
        } else {
            self.options.join(",")
        };

        format!(
            "UUID={} {} {} {} {} {}\n",
            self.uuid,
            self.mount_point.display(),
            self.fs_type,
            options,
            self.dump,
            self.fsck_pass,
        )
    }

    /// Append this entry to the tab file at `tab_file_path`, creating the file
    /// if needed. Existing lines are never touched.
    pub fn append_to(&self, tab_file_path: impl AsRef<Path>) -> Result<(), Error> {
        let path = tab_file_path.as_ref();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?
            .write_all(self.render().as_bytes())
            .with_context(|| format!("Failed to append to {}", path.display()))
    }
}
