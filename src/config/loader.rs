//! Client settings loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::ClientConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Why a settings file could not be used.
#[derive(Debug)]
pub enum SettingsError {
    /// The file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`ClientConfig`].
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// The file parsed but holds unusable values.
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io { path, source } => {
                write!(f, "cannot read settings file {}: {}", path.display(), source)
            }
            SettingsError::Parse { path, source } => {
                write!(f, "settings file {} is malformed: {}", path.display(), source)
            }
            SettingsError::Validation(errors) => {
                let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
                write!(f, "invalid settings: {}", details.join("; "))
            }
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Io { source, .. } => Some(source),
            SettingsError::Parse { source, .. } => Some(source),
            SettingsError::Validation(_) => None,
        }
    }
}

/// Read `path`, parse it as TOML and validate the result.
pub fn load_config(path: &Path) -> Result<ClientConfig, SettingsError> {
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ClientConfig = toml::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    validate_config(&config).map_err(SettingsError::Validation)?;
    Ok(config)
}
