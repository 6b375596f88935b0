//! Config paths and JSON file helpers.

use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "driver-manager";
const UPDATER_DIR_NAME: &str = "kernel-mesa-updater";

fn config_root() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .ok_or_else(|| ConfigError::NoConfigDir("Cannot determine home directory".to_string()))
}

/// ~/.config/driver-manager
pub fn app_config_dir() -> Result<PathBuf, ConfigError> {
    Ok(config_root()?.join(APP_DIR_NAME))
}

/// ~/.config/kernel-mesa-updater, shared with the kernel/Mesa history files
pub fn updater_config_dir() -> Result<PathBuf, ConfigError> {
    Ok(config_root()?.join(UPDATER_DIR_NAME))
}

/// Get the global settings path: ~/.config/driver-manager/settings.json
pub fn settings_path() -> Result<PathBuf, ConfigError> {
    Ok(app_config_dir()?.join("settings.json"))
}

pub fn kernel_history_path() -> Result<PathBuf, ConfigError> {
    Ok(updater_config_dir()?.join("kernel_history.json"))
}

pub fn mesa_history_path() -> Result<PathBuf, ConfigError> {
    Ok(updater_config_dir()?.join("mesa_history.json"))
}

pub fn ensure_dir(dir: &Path) -> Result<(), ConfigError> {
    fs::create_dir_all(dir).map_err(ConfigError::IoError)
}

/// Read and deserialize a JSON file.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(path.display().to_string())
        } else {
            ConfigError::IoError(e)
        }
    })?;

    serde_json::from_str(&content).map_err(ConfigError::InvalidJson)
}

/// Serialize as pretty JSON, creating parent directories first.
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }

    let json_content = serde_json::to_string_pretty(value).map_err(ConfigError::InvalidJson)?;
    fs::write(path, json_content).map_err(ConfigError::IoError)?;
    Ok(())
}
