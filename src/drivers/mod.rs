//! Driver discovery and installation.
//!
//! Drivers come from four places, concatenated in this order:
//! - `device-ids`: per-module directories whose PCI ids are matched against `lspci -nn`
//! - `firmware`: firmware packages matched against failed loads in `dmesg`
//! - MHWD: `mhwd -l` free and non-free sections
//! - a fixed list of printer, scanner and Bluetooth packages
//!
//! A failure in one source is logged and yields nothing for that source only.

pub mod catalog;
pub mod device_ids;
pub mod firmware;
pub mod installer;
pub mod mhwd;
pub mod standalone;

use crate::error::AppError;
use crate::models::DriverEntry;
use crate::system::command::{CommandSpec, QUERY_TIMEOUT};
use crate::system::SystemImpl;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_DIR: &str = "/usr/share/bigbashview/bcc/apps/drivers";

/// Label for a raw category string such as `"Network Star"`.
///
/// The first word picks the label; `Star` anywhere after it marks the entry
/// as recommended.
pub fn category_label(category: &str) -> String {
    let mut parts = category.split_whitespace();
    let Some(main) = parts.next() else {
        return "Others".to_string();
    };
    let label = match main {
        "Star" => "Main",
        "Cpu" => "Processor",
        "Gpu" | "Video" => "Video Card",
        "Machine" => "Motherboard",
        "Memory" => "Memory",
        "Network" => "Network",
        "Usb" => "USB",
        "Pci" => "PCI",
        "Printer" => "Printer",
        "Scanner" => "Scanner",
        "Bluetooth" => "Bluetooth",
        "Sound" => "Audio",
        "Webcam" => "Webcam",
        other => other,
    };
    if parts.any(|p| p == "Star") {
        format!("{} (Recommended)", label)
    } else {
        label.to_string()
    }
}

/// Read a small metadata file, trimmed.
pub(crate) fn read_trimmed(path: &Path) -> Result<String, AppError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| AppError::Io(format!("{}: {}", path.display(), e)))
}

/// Non-empty trimmed lines of a file; a missing file yields nothing.
pub(crate) fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|content| {
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Subdirectory names of `dir`, sorted for stable output.
pub(crate) fn subdirectories(dir: &Path) -> Result<Vec<String>, AppError> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map_err(|e| AppError::Io(format!("{}: {}", dir.display(), e)))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();
    Ok(names)
}

/// Collects [`DriverEntry`] values from every source.
pub struct DriverLister {
    system: SystemImpl,
    data_dir: PathBuf,
    proc_modules: PathBuf,
}

impl DriverLister {
    pub fn new(system: SystemImpl) -> Self {
        DriverLister {
            system,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            proc_modules: PathBuf::from("/proc/modules"),
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_proc_modules(mut self, path: impl Into<PathBuf>) -> Self {
        self.proc_modules = path.into();
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn system(&self) -> &SystemImpl {
        &self.system
    }

    /// All drivers from all sources.
    pub async fn list_all(&self) -> Vec<DriverEntry> {
        let mut drivers = Vec::new();
        drivers.extend(log_source("device-ids", device_ids::list(self).await));
        drivers.extend(log_source("firmware", firmware::list(self).await));
        drivers.extend(log_source("mhwd", mhwd::list(self).await));
        drivers.extend(log_source("standalone", standalone::list(self).await));
        log::info!("[Drivers] Listed {} drivers", drivers.len());
        drivers
    }

    /// `lspci -nn` lines; empty on failure.
    pub async fn pci_devices(&self) -> Vec<String> {
        self.command_lines(CommandSpec::new("lspci").arg("-nn")).await
    }

    /// `dmesg` lines; empty on failure (dmesg may be restricted to root).
    pub async fn kernel_messages(&self) -> Vec<String> {
        self.command_lines(CommandSpec::new("dmesg")).await
    }

    /// Whether `module` appears anywhere in /proc/modules.
    pub fn is_module_loaded(&self, module: &str) -> bool {
        match std::fs::read_to_string(&self.proc_modules) {
            Ok(content) => content.contains(module),
            Err(e) => {
                log::debug!("[Drivers] Cannot read {}: {}", self.proc_modules.display(), e);
                false
            }
        }
    }

    async fn command_lines(&self, spec: CommandSpec) -> Vec<String> {
        let display = spec.display();
        match self.system.runner().run(spec.timeout(QUERY_TIMEOUT).c_locale()).await {
            Ok(output) if output.success() => output.stdout.lines().map(str::to_string).collect(),
            Ok(output) => {
                log::warn!("[Drivers] '{}' exited with {}: {}", display, output.code(), output.stderr_tail(2));
                Vec::new()
            }
            Err(e) => {
                log::warn!("[Drivers] '{}' failed: {}", display, e);
                Vec::new()
            }
        }
    }
}

fn log_source(source: &str, result: Result<Vec<DriverEntry>, AppError>) -> Vec<DriverEntry> {
    match result {
        Ok(entries) => {
            log::debug!("[Drivers] {} source: {} entries", source, entries.len());
            entries
        }
        Err(e) => {
            log::error!("[Drivers] Error getting {} drivers: {}", source, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_label_mapping() {
        assert_eq!(category_label("Gpu"), "Video Card");
        assert_eq!(category_label("Video"), "Video Card");
        assert_eq!(category_label("Sound"), "Audio");
        assert_eq!(category_label("Thing"), "Thing");
        assert_eq!(category_label(""), "Others");
        assert_eq!(category_label("   "), "Others");
    }

    #[test]
    fn test_category_label_star_suffix() {
        assert_eq!(category_label("Network Star"), "Network (Recommended)");
        assert_eq!(category_label("Star"), "Main");
        assert_eq!(category_label("Star Star"), "Main (Recommended)");
    }

    #[test]
    fn test_read_lines_skips_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pci.ids");
        std::fs::write(&path, "10de:1b80\n\n  8086:a0f0  \n").unwrap();
        assert_eq!(read_lines(&path), vec!["10de:1b80", "8086:a0f0"]);
        assert!(read_lines(&dir.path().join("missing")).is_empty());
    }
}
