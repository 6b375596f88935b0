//! Application settings and persisted install history.
//!
//! # Settings Management
//!
//! The `SettingsManager` provides thread-safe access to `AppState`:
//! - Uses `Arc<RwLock<AppState>>` for parallel reads
//! - Persists state to `~/.config/driver-manager/settings.json`
//! - Falls back to defaults on a missing or unreadable file

pub mod history;
pub mod loader;

pub use history::{HistoryEntry, InstallHistory};

use crate::error::ConfigError;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// User-adjustable settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppState {
    // UI Customization Settings
    pub theme_idx: usize,
    pub ui_font_size: f32,

    // Package management
    /// "auto", "yay" or "paru"
    pub preferred_aur_helper: String,
    pub kernel_cache_ttl_secs: u64,
    pub prefer_mhwd_kernel: bool,
    pub show_incompatible_drivers: bool,

    /// Overrides for the helper scripts shipped with the drivers data dir
    pub drivers_script_path: Option<String>,
    pub hardware_detect_script_path: Option<String>,
    pub drivers_data_dir: String,

    // Debug Settings
    pub debug_logging: bool,
}

impl Default for AppState {
    fn default() -> Self {
        AppState {
            theme_idx: 0,
            ui_font_size: 14.0,
            preferred_aur_helper: "auto".to_string(),
            kernel_cache_ttl_secs: 300,
            prefer_mhwd_kernel: true,
            show_incompatible_drivers: false,
            drivers_script_path: None,
            hardware_detect_script_path: None,
            drivers_data_dir: crate::drivers::DEFAULT_DATA_DIR.to_string(),
            debug_logging: false,
        }
    }
}

impl AppState {
    /// `None` when the user left helper selection on automatic.
    pub fn aur_helper_preference(&self) -> Option<&str> {
        match self.preferred_aur_helper.as_str() {
            "" | "auto" => None,
            other => Some(other),
        }
    }
}

/// Thread-safe settings manager for AppState persistence
pub struct SettingsManager;

impl SettingsManager {
    /// Load AppState from the global settings file, or return defaults.
    pub fn load() -> Result<AppState, ConfigError> {
        let path = loader::settings_path()?;
        Ok(Self::load_from(&path))
    }

    /// Parse failures log a warning and yield defaults.
    pub fn load_from(path: &Path) -> AppState {
        match loader::load_json::<AppState>(path) {
            Ok(state) => state,
            Err(ConfigError::FileNotFound(_)) => AppState::default(),
            Err(e) => {
                log::warn!(
                    "[Config] Failed to read {}, falling back to defaults: {}",
                    path.display(),
                    e
                );
                AppState::default()
            }
        }
    }

    pub fn save(state: &AppState) -> Result<(), ConfigError> {
        let path = loader::settings_path()?;
        Self::save_to(state, &path)
    }

    pub fn save_to(state: &AppState, path: &Path) -> Result<(), ConfigError> {
        loader::save_json(state, path)
    }

    /// Create a thread-safe shared instance of AppState
    pub fn new_shared() -> Result<Arc<RwLock<AppState>>, ConfigError> {
        let state = Self::load()?;
        Ok(Arc::new(RwLock::new(state)))
    }
}
