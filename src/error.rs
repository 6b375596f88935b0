//! Unified error type hierarchy for Driver Manager
//!
//! Provides structured error handling with HardwareError, ConfigError,
//! PackageError, and the UI-facing AppError.

use std::io;
use thiserror::Error;

/// Hardware detection and system information errors.
#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("inxi failed: {0}")]
    InxiFailed(String),

    #[error("inxi output is not valid JSON: {0}")]
    InvalidInxiJson(#[from] serde_json::Error),

    #[error("System info unavailable: {0}")]
    SystemInfoUnavailable(String),

    #[error("IO error during hardware detection: {0}")]
    IoError(#[from] io::Error),
}

/// Configuration file parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid JSON in config: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Configuration directory unavailable: {0}")]
    NoConfigDir(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Package transaction errors (pacman, mhwd, mhwd-kernel, AUR helpers).
#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Transaction failed for {package} (exit code {code})")]
    TransactionFailed { package: String, code: i32 },

    #[error("No AUR helper available (install yay or paru)")]
    NoAurHelper,

    #[error("No previous {0} version in history for rollback")]
    NothingToRollBack(String),
}

/// Global error type for all Driver Manager modules.
///
/// Every fallible library operation returns `Result<T, AppError>`; the UI
/// shows `user_message()` and the log gets the `Display` form.
#[derive(Error, Debug, Clone)]
pub enum AppError {
    /// OS command failed to spawn or exited unsuccessfully
    #[error("Command '{cmd}' failed: {reason}")]
    OsCommand { cmd: String, reason: String },

    /// Command exceeded its time budget and was killed
    #[error("Command '{cmd}' timed out after {secs}s")]
    Timeout { cmd: String, secs: u64 },

    /// Hardware detection failed
    #[error("Hardware detection failed: {0}")]
    HardwareDetection(String),

    /// Tool output could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// File I/O error (read/write/delete)
    #[error("I/O error: {0}")]
    Io(String),

    /// Settings persist or deserialize error
    #[error("Settings error: {0}")]
    Settings(String),

    /// Invalid input (e.g., package name with shell chars)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Not enough free space for a package transaction
    #[error("Insufficient disk space on {path}: {available_gb:.1}GB available, {required_gb:.1}GB required")]
    InsufficientDiskSpace {
        path: String,
        available_gb: f64,
        required_gb: f64,
    },

    /// Requested package or kernel is unknown
    #[error("Not found: {0}")]
    NotFound(String),

    /// A required external tool is not installed
    #[error("Missing tool: {0}")]
    MissingTool(String),
}

impl AppError {
    /// Get a user-facing error message suitable for UI display
    pub fn user_message(&self) -> String {
        match self {
            AppError::OsCommand { cmd, reason } => {
                format!("Failed to execute '{}': {}", cmd, reason)
            }
            AppError::Timeout { cmd, secs } => {
                format!("'{}' did not finish within {} seconds", cmd, secs)
            }
            AppError::HardwareDetection(msg) => format!("Could not detect hardware: {}", msg),
            AppError::Parse(msg) => format!("Unexpected tool output: {}", msg),
            AppError::Io(msg) => format!("File operation failed: {}", msg),
            AppError::Settings(msg) => format!("Settings error: {}", msg),
            AppError::InvalidInput(msg) => format!("Invalid input: {}", msg),
            AppError::InsufficientDiskSpace {
                path,
                available_gb,
                required_gb,
            } => format!(
                "Not enough disk space on {}: {:.1}GB free, {:.1}GB needed",
                path, available_gb, required_gb
            ),
            AppError::NotFound(msg) => msg.clone(),
            AppError::MissingTool(tool) => format!("Required tool not installed: {}", tool),
        }
    }
}

impl From<io::Error> for AppError {
    fn from(e: io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Parse(e.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Settings(e.to_string())
    }
}

impl From<HardwareError> for AppError {
    fn from(e: HardwareError) -> Self {
        AppError::HardwareDetection(e.to_string())
    }
}

impl From<PackageError> for AppError {
    fn from(e: PackageError) -> Self {
        match e {
            e @ PackageError::NothingToRollBack(_) => AppError::NotFound(e.to_string()),
            PackageError::NoAurHelper => AppError::MissingTool("yay or paru".to_string()),
            other => AppError::OsCommand {
                cmd: "package transaction".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Io(s)
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::Io(s.to_string())
    }
}

/// Top-level result type for binaries and glue code.
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardware_error_display() {
        let err = HardwareError::InxiFailed("exit code 2".to_string());
        assert_eq!(err.to_string(), "inxi failed: exit code 2");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::FileNotFound("/etc/config.json".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration file not found: /etc/config.json"
        );
    }

    #[test]
    fn test_timeout_user_message() {
        let err = AppError::Timeout {
            cmd: "inxi".to_string(),
            secs: 90,
        };
        assert_eq!(err.user_message(), "'inxi' did not finish within 90 seconds");
    }

    #[test]
    fn test_package_error_maps_to_app_error() {
        let err: AppError = PackageError::NoAurHelper.into();
        assert!(matches!(err, AppError::MissingTool(_)));

        let err: AppError = PackageError::NothingToRollBack("kernel".into()).into();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.user_message(), "No previous kernel version in history for rollback");
    }

    #[test]
    fn test_result_type_err() {
        let result: Result<i32> = Err("test error".into());
        assert!(result.is_err());
    }
}
