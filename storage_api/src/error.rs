use std::fmt::{Debug, Write};
use std::{borrow::Cow, panic::Location};

use serde::{ser::SerializeStruct, Serialize};
use strum_macros::IntoStaticStr;

/// The tool could not get far enough to look at any device.
#[derive(Debug, Eq, thiserror::Error, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InitializationError {
    #[error("No configuration file found, tried: {attempted}")]
    ConfigNotFound { attempted: String },
    #[error("Failed to read configuration file '{path}'")]
    ReadConfig { path: String },
    #[error("Failed to set up logging")]
    SetupLogging,
    #[error("Required binary '{binary}' is not available")]
    MissingDependency { binary: String },
}

/// Operator supplied input was invalid.
#[derive(Debug, Eq, thiserror::Error, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidInputError {
    #[error("Failed to parse configuration file '{path}'")]
    ParseConfig { path: String },
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// A step of the device pipeline failed. None of these are retried, and
/// whatever was already done to the host is left in place.
#[derive(Debug, Eq, thiserror::Error, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisioningError {
    #[error("No member devices found")]
    NoEligibleDevices,
    #[error("Block device '{path}' not found")]
    DeviceNotFound { path: String },
    #[error("Partition with UUID '{partition_uuid}' not found on disk '{disk}' after partitioning")]
    PartitionNotFound {
        disk: String,
        partition_uuid: String,
    },
    #[error("Disk '{disk}' has a physical sector size of {sector_size} bytes, which does not divide the partition alignment")]
    UnsupportedSectorSize { disk: String, sector_size: u64 },
    #[error("Array '{path}' is not a block device after creation")]
    ArrayCreationFailed { path: String },
    #[error("External tool '{tool}' failed")]
    ExternalToolFailure { tool: String },
    #[error("Filesystem on '{path}' has no UUID")]
    FilesystemUuidMissing { path: String },
    #[error("Failed to create mount point '{path}'")]
    CreateMountPoint { path: String },
    #[error("Failed to change ownership of mount point '{path}'")]
    MountPointOwnership { path: String },
    #[error("Failed to record mount in '{path}'")]
    PersistMount { path: String },
}

/// Filling the mounted filesystem with content failed.
#[derive(Debug, Eq, thiserror::Error, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum PopulationError {
    #[error("Failed to copy directory '{source_path}'")]
    SyncDirectory { source_path: String },
    #[error("Failed to extract archive '{archive}'")]
    ExtractArchive { archive: String },
    #[error("Failed to create configured entries")]
    CreateEntries,
}

#[derive(Debug, Eq, thiserror::Error, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InternalError {
    #[error("Internal error: {0}")]
    Internal(&'static str),
    #[error("Panic: {0}")]
    Panic(String),
}

/// Category of a [`SetupError`]. The category tells an operator whether to
/// look at the configuration, at the host, or at the tool itself.
#[derive(Debug, Eq, thiserror::Error, IntoStaticStr, PartialEq)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    #[error(transparent)]
    Initialization(#[from] InitializationError),

    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error(transparent)]
    Population(#[from] PopulationError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug)]
struct SetupErrorInner {
    kind: ErrorKind,
    location: &'static Location<'static>,
    source: Option<anyhow::Error>,
    context: Vec<(Cow<'static, str>, &'static Location<'static>)>,
}

/// Structured, fatal error of a provisioning run.
pub struct SetupError(Box<SetupErrorInner>);

impl SetupError {
    #[track_caller]
    pub fn new(kind: impl Into<ErrorKind>) -> Self {
        SetupError(Box::new(SetupErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: None,
            context: Vec::new(),
        }))
    }

    #[track_caller]
    pub fn with_source(kind: impl Into<ErrorKind>, source: anyhow::Error) -> Self {
        SetupError(Box::new(SetupErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: Some(source),
            context: Vec::new(),
        }))
    }

    #[track_caller]
    pub fn internal(message: &'static str) -> Self {
        Self::new(InternalError::Internal(message))
    }

    /// Record an error that happened while an earlier one was already on its
    /// way up, without losing the earlier one.
    #[track_caller]
    pub fn secondary_error_context(mut self, secondary: impl Debug) -> Self {
        self.0.context.push((
            format!(
                "While handling the error, an additional error was caught: \n\n{secondary:?}\n\nThe earlier error:"
            )
            .into(),
            Location::caller(),
        ));
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.0.kind
    }
}

pub trait ReportError<T, K> {
    /// Convert this error into a structured SetupError.
    fn structured(self, kind: K) -> Result<T, SetupError>;
}

impl<T, K> ReportError<T, K> for Option<T>
where
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, SetupError> {
        match self {
            Some(t) => Ok(t),
            None => Err(SetupError::new(kind)),
        }
    }
}

impl<T, E, K> ReportError<T, K> for Result<T, E>
where
    E: Into<anyhow::Error>,
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, SetupError> {
        match self {
            Ok(o) => Ok(o),
            Err(e) => Err(SetupError::with_source(kind, e.into())),
        }
    }
}

pub trait SetupResultExt<T> {
    /// Attach a context message to the error.
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, SetupError>;
}

impl<T> SetupResultExt<T> for Result<T, SetupError> {
    #[track_caller]
    fn message(mut self, context: impl Into<Cow<'static, str>>) -> Result<T, SetupError> {
        if let Err(ref mut e) = self {
            e.0.context.push((context.into(), Location::caller()));
        }
        self
    }
}

impl Serialize for SetupError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("setup-error", 5)?;
        state.serialize_field("message", &self.0.kind.to_string())?;
        match self.0.kind {
            ErrorKind::Initialization(ref e) => state.serialize_field("error", e)?,
            ErrorKind::InvalidInput(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Provisioning(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Population(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Internal(ref e) => state.serialize_field("error", e)?,
        }
        state.serialize_field("category", <&str>::from(&self.0.kind))?;
        state.serialize_field(
            "location",
            &format!("{}:{}", self.0.location.file(), self.0.location.line()),
        )?;
        match self.0.source {
            Some(ref e) => state.serialize_field("cause", &Some(format!("{:?}", e)))?,
            None => state.serialize_field("cause", &None::<String>)?,
        }
        state.end()
    }
}

impl Debug for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.0.kind,
            self.0.location.file(),
            self.0.location.line()
        )?;

        if !self.0.context.is_empty() {
            writeln!(f, "\n\nContext:")?;
            for (i, (context, location)) in self.0.context.iter().enumerate() {
                for (j, line) in context.split('\n').enumerate() {
                    if j == 0 {
                        write!(f, "{: >5}: ", i)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                writeln!(f, " at {}:{}", location.file(), location.line())?;
            }
        }

        if let Some(ref source) = self.0.source {
            writeln!(f, "\n\nCaused by:")?;
            let mut source: Option<&dyn std::error::Error> = Some(source.as_ref());
            let mut index = 0;
            while let Some(e) = source {
                for (i, line) in e.to_string().split('\n').enumerate() {
                    if i == 0 {
                        write!(f, "{: >5}: ", index)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                f.write_char('\n')?;
                source = e.source();
                index += 1;
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.kind)
    }
}
