// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{FleetrunError, Result};
use crate::workflow::Workflow;

/// Load a configuration file and return the raw, unvalidated contents.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Load `path` if given; otherwise load the default config file when it
/// exists, or fall back to built-in defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<ConfigFile> {
    match path {
        Some(p) => load_and_validate(p),
        None => {
            let default_path = default_config_path();
            if default_path.is_file() {
                load_and_validate(&default_path)
            } else {
                debug!(path = %default_path.display(), "no config file found; using defaults");
                Ok(ConfigFile::default())
            }
        }
    }
}

/// `Fleetrun.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Fleetrun.toml")
}

/// Load a workflow definition; the format follows the file extension
/// (`.toml` or `.json`).
pub fn load_workflow(path: impl AsRef<Path>) -> Result<Workflow> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let workflow: Workflow = match ext.as_deref() {
        Some("toml") => toml::from_str(&contents)?,
        Some("json") => serde_json::from_str(&contents)?,
        _ => {
            return Err(FleetrunError::ConfigError(format!(
                "unsupported workflow file '{}': expected a .toml or .json extension",
                path.display()
            )));
        }
    };

    debug!(path = %path.display(), "workflow loaded");
    Ok(workflow)
}
