use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use log::{debug, info};

use storage_api::{
    config::Config,
    constants::DEFAULT_CONFIG_PATH,
    error::{InitializationError, InvalidInputError, ReportError, SetupError},
};

/// Configuration file candidates, most specific first.
pub fn candidate_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .into_iter()
        .chain(std::iter::once(PathBuf::from(DEFAULT_CONFIG_PATH)))
        .collect()
}

/// Load and validate the first configuration file that exists among
/// `candidates`.
pub fn load(candidates: &[PathBuf]) -> Result<(PathBuf, Config), SetupError> {
    for path in candidates {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No configuration at '{}'", path.display());
                continue;
            }
            Err(e) => {
                return Err(e).structured(InitializationError::ReadConfig {
                    path: path.display().to_string(),
                });
            }
        };

        info!("Loading configuration from '{}'", path.display());
        let config = Config::from_yaml(&contents).structured(InvalidInputError::ParseConfig {
            path: path.display().to_string(),
        })?;

        config.validate().map_err(|e| {
            SetupError::new(InvalidInputError::InvalidConfig {
                reason: e.to_string(),
            })
        })?;

        return Ok((path.clone(), config));
    }

    Err(SetupError::new(InitializationError::ConfigNotFound {
        attempted: candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    }))
}
