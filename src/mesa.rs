//! Mesa detection, stable/git installs and rollback.

use crate::config::InstallHistory;
use crate::error::{AppError, PackageError};
use crate::models::{OperationProgress, ProgressFn};
use crate::system::command::{CommandSpec, AUR_BUILD_TIMEOUT, QUERY_TIMEOUT};
use crate::system::disk::{check_disk_space, MESA_REQUIRED_GB};
use crate::system::{install_progress_sink, SystemImpl};
use crate::{log_info, log_parsed};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Mutex;

static MESA_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"OpenGL version string:.*Mesa ([0-9\.]+)").expect("static mesa version regex"));

pub const UNKNOWN_VERSION: &str = "Unknown";
pub const ERROR_VERSION: &str = "Error";

/// Mesa version from `glxinfo -B` output.
pub fn parse_glxinfo(output: &str) -> Option<String> {
    MESA_VERSION_RE
        .captures(output)
        .map(|caps| caps[1].to_string())
}

/// Packages for a Mesa install.
pub fn mesa_packages(use_git: bool, use_multilib: bool) -> Vec<String> {
    let (base, lib32) = if use_git {
        ("mesa-git", "lib32-mesa-git")
    } else {
        ("mesa", "lib32-mesa")
    };
    let mut packages = vec![base.to_string()];
    if use_multilib {
        packages.push(lib32.to_string());
    }
    packages
}

pub struct MesaManager {
    system: SystemImpl,
    history_path: PathBuf,
    aur_preference: Option<String>,
    current: Mutex<Option<String>>,
}

impl MesaManager {
    pub fn new(system: SystemImpl, history_path: impl Into<PathBuf>) -> Self {
        MesaManager {
            system,
            history_path: history_path.into(),
            aur_preference: None,
            current: Mutex::new(None),
        }
    }

    pub fn with_aur_preference(mut self, preference: Option<String>) -> Self {
        self.aur_preference = preference;
        self
    }

    pub fn history(&self) -> InstallHistory {
        InstallHistory::load(&self.history_path)
    }

    /// Last version returned by [`detect_current_mesa`](Self::detect_current_mesa).
    pub fn current_mesa(&self) -> Option<String> {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Mesa version, "Unknown" when glxinfo gives none, "Error" when glxinfo
    /// cannot run.
    pub async fn detect_current_mesa(&self) -> String {
        let spec = CommandSpec::new("glxinfo").arg("-B").timeout(QUERY_TIMEOUT).c_locale();
        let output = match self.system.runner().run(spec).await {
            Ok(output) => output,
            Err(e) => {
                log::error!("[Mesa] Exception detecting Mesa version: {}", e);
                return ERROR_VERSION.to_string();
            }
        };
        if !output.success() {
            log::error!("[Mesa] Error detecting Mesa: {}", output.stderr_tail(2));
            return UNKNOWN_VERSION.to_string();
        }
        match parse_glxinfo(&output.stdout) {
            Some(version) => {
                log_info!("[Mesa] Detected Mesa version: {}", version);
                *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(version.clone());
                version
            }
            None => {
                log::error!("[Mesa] Could not find Mesa version in glxinfo output");
                UNKNOWN_VERSION.to_string()
            }
        }
    }

    pub async fn install_mesa(&self, use_git: bool, use_multilib: bool, progress: ProgressFn) -> Result<(), AppError> {
        let runner = self.system.runner();
        if let Err(e) = check_disk_space(runner.as_ref(), &["/"], MESA_REQUIRED_GB).await {
            log::error!("[Mesa] Not enough disk space for Mesa installation: {}", e);
            progress(OperationProgress::new(0.0, "Error: Not enough disk space"));
            return Err(e);
        }

        let packages = mesa_packages(use_git, use_multilib);
        let flavour = if use_git { "mesa-git" } else { "mesa" };
        log_parsed!("Installing {}", packages.join(" "));
        progress(OperationProgress::new(0.2, format!("Installing {}...", flavour)));

        let sink = install_progress_sink(progress.clone());
        let result = if use_git {
            let Some(helper) = self.system.detect_aur_helper(self.aur_preference.as_deref()).await else {
                progress(OperationProgress::new(1.0, "Error: No AUR helper for installation."));
                return Err(PackageError::NoAurHelper.into());
            };
            let spec = CommandSpec::new(helper)
                .args(["-S", "--noconfirm"])
                .args(packages.iter().cloned())
                .timeout(AUR_BUILD_TIMEOUT);
            runner.run_streaming(spec, sink).await
        } else {
            self.system.install_packages(&packages, sink).await
        };

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                progress(OperationProgress::new(1.0, format!("Error: {}", e.user_message())));
                return Err(e);
            }
        };
        if !output.success() {
            log::error!("[Mesa] Installing {} exited with {}", flavour, output.code());
            progress(OperationProgress::new(
                1.0,
                format!("Error: Installation failed (code {})", output.code()),
            ));
            return Err(PackageError::TransactionFailed {
                package: flavour.to_string(),
                code: output.code(),
            }
            .into());
        }

        let version = self.detect_current_mesa().await;
        if let Err(e) = self.history().append(flavour, &version) {
            log::warn!("[Mesa] Failed to record {} in mesa history: {}", flavour, e);
        }
        progress(OperationProgress::new(1.0, format!("Mesa {} installed. Reboot recommended.", version)));
        Ok(())
    }

    /// Reinstall the Mesa flavour recorded before the latest one.
    pub async fn rollback_mesa(&self, progress: ProgressFn) -> Result<(), AppError> {
        let history = self.history();
        let Some(target) = history.rollback_target().cloned() else {
            let err = PackageError::NothingToRollBack("Mesa".to_string());
            log::error!("[Mesa] {}", err);
            progress(OperationProgress::new(1.0, format!("Error: {}.", err)));
            return Err(err.into());
        };

        let use_git = target.name.ends_with("-git");
        let use_multilib = self.system.is_package_installed("lib32-mesa").await
            || self.system.is_package_installed("lib32-mesa-git").await;
        log_info!(
            "[Mesa] Rolling back to {} (git: {}, multilib: {})",
            target.name,
            use_git,
            use_multilib
        );
        progress(OperationProgress::new(0.1, format!("Rolling back to {}...", target.name)));
        self.install_mesa(use_git, use_multilib, progress).await
    }
}
