//! Driver Manager backend
//!
//! Hardware information, driver installation and kernel/Mesa management for
//! Arch-based distributions, with an egui frontend.
//!
//! The crate is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Shared data structures (kernels, drivers, progress)
//! - **system**: Command execution, package operations, dependency health
//! - **hardware**: inxi report and the system summary
//! - **drivers**: Driver discovery and installation
//! - **kernel**: pacman/AUR and mhwd-kernel kernel management
//! - **mesa**: Mesa stable/git switching with rollback
//! - **config**: Settings and install history persistence
//! - **ui**: AppController and the egui pages

pub mod error;
pub mod models;

pub mod system;

pub mod hardware;

pub mod drivers;

pub mod kernel;

pub mod mesa;

pub mod config;

pub mod ui;

// Decoupled logging pipeline
pub mod log_collector;

// Re-export the log crate for macro usage
pub use log;

pub use log_collector::{LogCollector, LogLine};

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{AppError, ConfigError, HardwareError, PackageError, Result};

pub use models::{CatalogDriver, DriverEntry, KernelPackage, KernelsReport, OperationProgress};

pub use hardware::{HardwareDetector, HardwareSnapshot};

pub use config::{AppState, SettingsManager};

pub use kernel::{KernelManager, MhwdKernelManager};

pub use mesa::MesaManager;

pub use ui::AppController;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert_eq!(VERSION, "0.1.0");
    }

    #[test]
    fn test_error_reexport() {
        let _: Result<i32> = Ok(42);
        let err: AppError = PackageError::NoAurHelper.into();
        assert!(matches!(err, AppError::MissingTool(_)));
    }
}
