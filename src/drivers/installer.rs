//! Install and remove driver packages through mhwd or pacman.

use crate::error::AppError;
use crate::system::command::{CommandRunner, CommandSpec, PACKAGE_OP_TIMEOUT};
use crate::system::validate_package_name;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverAction {
    Install,
    Remove,
}

impl DriverAction {
    pub fn verb(&self) -> &'static str {
        match self {
            DriverAction::Install => "install",
            DriverAction::Remove => "remove",
        }
    }
}

/// The privileged command for `action` on `package`. Sources starting with
/// `mhwd` go through `mhwd ... pci`, everything else through pacman.
pub fn driver_command(action: DriverAction, package: &str, source: &str) -> CommandSpec {
    let spec = if source.starts_with("mhwd") {
        let flag = match action {
            DriverAction::Install => "-i",
            DriverAction::Remove => "-r",
        };
        CommandSpec::new("mhwd").args([flag, "pci", package, "--noconfirm"])
    } else {
        let flag = match action {
            DriverAction::Install => "-S",
            DriverAction::Remove => "-Rns",
        };
        CommandSpec::new("pacman").args([flag, "--noconfirm", package])
    };
    spec.timeout(PACKAGE_OP_TIMEOUT).privileged()
}

#[derive(Clone)]
pub struct DriverInstaller {
    runner: Arc<dyn CommandRunner>,
}

impl DriverInstaller {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        DriverInstaller { runner }
    }

    pub async fn install(&self, package: &str, source: &str) -> Result<(), AppError> {
        self.apply(DriverAction::Install, package, source).await
    }

    pub async fn remove(&self, package: &str, source: &str) -> Result<(), AppError> {
        self.apply(DriverAction::Remove, package, source).await
    }

    async fn apply(&self, action: DriverAction, package: &str, source: &str) -> Result<(), AppError> {
        let package = package.trim();
        if package.is_empty() {
            return Err(AppError::InvalidInput("No package specified for driver".to_string()));
        }
        validate_package_name(package)?;

        let spec = driver_command(action, package, source);
        let display = spec.display();
        crate::log_parsed!("Driver {}: {}", action.verb(), display);

        let output = self.runner.run(spec).await?;
        if output.success() {
            log::info!("[Drivers] {} of {} succeeded", action.verb(), package);
            Ok(())
        } else {
            log::error!("[Drivers] '{}' failed with code {}", display, output.code());
            Err(AppError::OsCommand {
                cmd: display,
                reason: format!("exit code {}: {}", output.code(), output.stderr_tail(5)),
            })
        }
    }
}
