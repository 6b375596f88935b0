/// Kernel Manager module: repository and AUR kernels
///
/// This module handles:
/// - Listing official, AUR and installed kernel packages
/// - Caching the combined report for a configurable TTL
/// - Installing, removing and rolling back kernels with progress reporting
///
/// Privileged operations go through pkexec; AUR helpers escalate themselves.

use super::parser;
use crate::config::InstallHistory;
use crate::error::{AppError, PackageError};
use crate::models::{KernelPackage, KernelSource, KernelsReport, OperationProgress, ProgressFn};
use crate::system::command::{
    CommandSpec, AUR_BUILD_TIMEOUT, AUR_SEARCH_TIMEOUT, QUERY_TIMEOUT,
};
use crate::system::disk::{check_disk_space, KERNEL_REQUIRED_GB};
use crate::system::{install_progress_sink, validate_package_name, SystemImpl};
use crate::{log_info, log_parsed};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

const KERNEL_DISK_PATHS: &[&str] = &["/", "/boot"];

pub struct KernelManager {
    system: SystemImpl,
    history_path: PathBuf,
    aur_preference: Option<String>,
    cache_ttl: Duration,
    cache: Mutex<Option<(KernelsReport, Instant)>>,
}

impl KernelManager {
    pub fn new(system: SystemImpl, history_path: impl Into<PathBuf>) -> Self {
        KernelManager {
            system,
            history_path: history_path.into(),
            aur_preference: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: Mutex::new(None),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_aur_preference(mut self, preference: Option<String>) -> Self {
        self.aur_preference = preference;
        self
    }

    pub fn history(&self) -> InstallHistory {
        InstallHistory::load(&self.history_path)
    }

    /// `uname -r`, or "Unknown".
    pub async fn detect_current_kernel(&self) -> String {
        self.system.uname_r().await
    }

    async fn pacman_search(&self, pattern: &str) -> Result<String, AppError> {
        let spec = CommandSpec::new("pacman")
            .args(["-Ss", pattern])
            .timeout(QUERY_TIMEOUT)
            .c_locale();
        let output = self.system.runner().run(spec).await?;
        // pacman exits 1 when nothing matches
        if !output.success() && !output.stderr.trim().is_empty() {
            return Err(AppError::OsCommand {
                cmd: format!("pacman -Ss {}", pattern),
                reason: output.stderr_tail(2),
            });
        }
        Ok(output.stdout)
    }

    pub async fn official_kernels(&self) -> Result<Vec<KernelPackage>, AppError> {
        let text = self.pacman_search("^linux").await?;
        let kernels = parser::parse_official_search(&text);
        log_info!("[Kernel] Found {} official kernels", kernels.len());
        Ok(kernels)
    }

    /// Empty when no AUR helper is installed.
    pub async fn aur_kernels(&self) -> Result<Vec<KernelPackage>, AppError> {
        let Some(helper) = self.system.detect_aur_helper(self.aur_preference.as_deref()).await else {
            log::warn!("[Kernel] No AUR helper (yay/paru) found, skipping AUR kernels");
            return Ok(Vec::new());
        };
        log_info!("[Kernel] Using AUR helper {} to search for kernels", helper);
        let spec = CommandSpec::new(helper.as_str())
            .args(["-Ss", "linux"])
            .timeout(AUR_SEARCH_TIMEOUT)
            .c_locale();
        let output = self.system.runner().run(spec).await?;
        if !output.success() && output.stdout.trim().is_empty() {
            log::warn!("[Kernel] AUR kernel search failed: {}", output.stderr_tail(2));
            return Ok(Vec::new());
        }
        let kernels = parser::parse_aur_search(&output.stdout);
        log_info!("[Kernel] Found {} AUR kernels", kernels.len());
        Ok(kernels)
    }

    pub async fn installed_kernels(&self, uname: &str) -> Result<Vec<KernelPackage>, AppError> {
        let spec = CommandSpec::new("pacman").arg("-Q").timeout(QUERY_TIMEOUT).c_locale();
        let output = self.system.runner().run(spec).await?;
        if !output.success() {
            return Err(AppError::OsCommand {
                cmd: "pacman -Q".to_string(),
                reason: output.stderr_tail(2),
            });
        }
        Ok(parser::parse_installed(&output.stdout, uname))
    }

    async fn build_report(&self) -> KernelsReport {
        let uname = self.detect_current_kernel().await;

        let installed = match self.installed_kernels(&uname).await {
            Ok(installed) => installed,
            Err(e) => return KernelsReport::empty_with_error(uname, e.to_string()),
        };
        let mut official = match self.official_kernels().await {
            Ok(kernels) => kernels,
            Err(e) => return KernelsReport::empty_with_error(uname, e.to_string()),
        };
        let mut aur = self.aur_kernels().await.unwrap_or_else(|e| {
            log::warn!("[Kernel] AUR search failed: {}", e);
            Vec::new()
        });

        if official.is_empty() && aur.is_empty() {
            log::warn!("[Kernel] No kernels found with standard filters, trying broader search");
            match self.pacman_search("linux").await {
                Ok(text) => official = parser::parse_fallback_search(&text),
                Err(e) => log::warn!("[Kernel] Fallback search failed: {}", e),
            }
        }

        for kernel in official.iter_mut().chain(aur.iter_mut()) {
            if let Some(local) = installed.iter().find(|k| k.name == kernel.name) {
                kernel.is_installed = true;
                kernel.is_running = local.is_running;
            }
        }

        log_info!(
            "[Kernel] Kernel data summary - Official: {}, AUR: {}, Installed: {}",
            official.len(),
            aur.len(),
            installed.len()
        );

        KernelsReport {
            official_available: official,
            aur_available: aur,
            installed_packages: installed,
            current_running_uname: uname,
            timestamp: chrono::Local::now(),
            error: None,
        }
    }

    fn cached_report(&self) -> Option<KernelsReport> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        match cache.as_ref() {
            Some((report, at)) if at.elapsed() < self.cache_ttl => Some(report.clone()),
            _ => None,
        }
    }

    /// Combined report. Reports carrying an error are never cached.
    pub async fn kernels_report(&self, use_cache: bool) -> KernelsReport {
        if use_cache {
            if let Some(report) = self.cached_report() {
                log::debug!("[Kernel] Returning cached kernel report");
                return report;
            }
        }
        let report = self.build_report().await;
        if report.error.is_none() {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            *cache = Some((report.clone(), Instant::now()));
        }
        report
    }

    pub fn invalidate_cache(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        *cache = None;
    }

    pub fn has_cached_report(&self) -> bool {
        self.cached_report().is_some()
    }

    /// Install `name` from the official repositories or the AUR.
    pub async fn install_kernel(&self, name: &str, progress: ProgressFn) -> Result<(), AppError> {
        validate_package_name(name)?;

        let runner = self.system.runner();
        if let Err(e) = check_disk_space(runner.as_ref(), KERNEL_DISK_PATHS, KERNEL_REQUIRED_GB).await {
            log::error!("[Kernel] Not enough disk space for kernel installation: {}", e);
            progress(OperationProgress::new(0.0, "Error: Not enough disk space"));
            return Err(e);
        }

        progress(OperationProgress::new(0.1, format!("Fetching info for {} kernel...", name)));
        let report = self.kernels_report(false).await;
        if let Some(err) = &report.error {
            let msg = format!("Could not fetch kernel data before install: {}", err);
            progress(OperationProgress::new(0.0, msg.clone()));
            return Err(AppError::OsCommand {
                cmd: "kernel report".to_string(),
                reason: msg,
            });
        }
        let Some(kernel) = report.find_available(name).cloned() else {
            log::error!("[Kernel] Kernel {} not found in available kernels", name);
            progress(OperationProgress::new(0.0, format!("Error: Kernel {} not found", name)));
            return Err(AppError::NotFound(format!("Kernel {} not found", name)));
        };

        log_parsed!("Installing kernel {} from {}", name, kernel.source);
        progress(OperationProgress::new(0.2, format!("Installing {} from {}...", name, kernel.source)));

        let sink = install_progress_sink(progress.clone());
        let result = match kernel.source {
            KernelSource::Aur => {
                let Some(helper) = self.system.detect_aur_helper(self.aur_preference.as_deref()).await else {
                    progress(OperationProgress::new(1.0, "Error: No AUR helper for installation."));
                    return Err(PackageError::NoAurHelper.into());
                };
                let spec = CommandSpec::new(helper)
                    .args(["-S", "--noconfirm", name])
                    .timeout(AUR_BUILD_TIMEOUT);
                runner.run_streaming(spec, sink).await
            }
            KernelSource::Official | KernelSource::Mhwd => {
                let mut packages = vec![name.to_string()];
                let headers = format!("{}-headers", name);
                if self.system.package_exists_in_repos(&headers).await {
                    packages.push(headers);
                } else {
                    log_info!("[Kernel] Header package {} not found, installing only {}", headers, name);
                }
                self.system.install_packages(&packages, sink).await
            }
        };

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                progress(OperationProgress::new(1.0, format!("Error: {}", e.user_message())));
                return Err(e);
            }
        };
        if !output.success() {
            log::error!("[Kernel] Installing {} exited with {}", name, output.code());
            progress(OperationProgress::new(
                1.0,
                format!("Error: Installation failed (code {})", output.code()),
            ));
            return Err(PackageError::TransactionFailed {
                package: name.to_string(),
                code: output.code(),
            }
            .into());
        }

        let version = self.system.installed_version(name).await.unwrap_or_default();
        if let Err(e) = self.history().append(name, &version) {
            log::warn!("[Kernel] Failed to record {} in kernel history: {}", name, e);
        }
        self.invalidate_cache();

        log_parsed!("Kernel {} installed. Reboot required.", name);
        progress(OperationProgress::new(1.0, format!("Kernel {} installed. Reboot required.", name)));
        Ok(())
    }

    /// Reinstall the kernel recorded before the latest one.
    pub async fn rollback_kernel(&self, progress: ProgressFn) -> Result<(), AppError> {
        let history = self.history();
        let Some(target) = history.rollback_target().cloned() else {
            let err = PackageError::NothingToRollBack("kernel".to_string());
            log::error!("[Kernel] {}", err);
            progress(OperationProgress::new(1.0, format!("Error: {}.", err)));
            return Err(err.into());
        };

        log_info!(
            "[Kernel] Rolling back to {} (version in history: {})",
            target.name,
            if target.version.is_empty() { "N/A" } else { target.version.as_str() }
        );
        progress(OperationProgress::new(0.1, format!("Rolling back to {}...", target.name)));
        self.install_kernel(&target.name, progress).await
    }

    /// Remove an installed kernel and its headers. The running kernel is refused.
    pub async fn remove_kernel(&self, name: &str) -> Result<(), AppError> {
        validate_package_name(name)?;
        let uname = self.detect_current_kernel().await;
        let installed = self.installed_kernels(&uname).await?;
        match installed.iter().find(|k| k.name == name) {
            None => return Err(AppError::NotFound(format!("Kernel {} is not installed", name))),
            Some(k) if k.is_running => {
                return Err(AppError::InvalidInput(format!(
                    "Kernel {} is currently running and cannot be removed",
                    name
                )))
            }
            Some(_) => {}
        }

        let headers = format!("{}-headers", name);
        if self.system.is_package_installed(&headers).await {
            self.system.remove_package(&headers).await?;
        }
        self.system.remove_package(name).await?;
        self.invalidate_cache();
        log_parsed!("Kernel {} removed", name);
        Ok(())
    }
}
