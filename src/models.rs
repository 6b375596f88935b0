//! Core data types for Driver Manager.

use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Where a driver entry in the lister came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriverSource {
    DeviceIds,
    Firmware,
    MhwdFree,
    MhwdNonfree,
    Standalone,
}

impl DriverSource {
    pub fn is_mhwd(&self) -> bool {
        matches!(self, DriverSource::MhwdFree | DriverSource::MhwdNonfree)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DriverSource::DeviceIds => "device-ids",
            DriverSource::Firmware => "firmware",
            DriverSource::MhwdFree => "mhwd-free",
            DriverSource::MhwdNonfree => "mhwd-nonfree",
            DriverSource::Standalone => "standalone",
        }
    }
}

impl fmt::Display for DriverSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A driver or firmware package found by the lister.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverEntry {
    pub name: String,
    pub package: String,
    pub description: String,
    pub category: String,
    pub category_label: String,
    pub compatible: bool,
    pub installed: bool,
    pub loaded: bool,
    pub source: DriverSource,
    /// Firmware files the package provides, for firmware entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub firmware_files: Vec<String>,
}

/// Accept `true`, `"true"`, `"yes"`, `1` and their negatives.
fn deserialize_lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct LenientBoolVisitor;

    impl<'de> Visitor<'de> for LenientBoolVisitor {
        type Value = bool;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a boolean, 0/1, or a yes/no string")
        }

        fn visit_bool<E: de::Error>(self, value: bool) -> Result<bool, E> {
            Ok(value)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<bool, E> {
            Ok(value != 0)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<bool, E> {
            Ok(value != 0)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<bool, E> {
            Ok(matches!(
                value.trim().to_lowercase().as_str(),
                "true" | "yes" | "1" | "installed"
            ))
        }

        fn visit_unit<E: de::Error>(self) -> Result<bool, E> {
            Ok(false)
        }
    }

    deserializer.deserialize_any(LenientBoolVisitor)
}

/// Driver descriptor written by the drivers listing script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogDriver {
    pub name: String,
    pub package: String,
    pub category: String,
    pub description: String,
    #[serde(deserialize_with = "deserialize_lenient_bool")]
    pub installed: bool,
    pub driver: String,
    pub category_label: String,
    pub source: String,
}

impl CatalogDriver {
    pub fn uses_mhwd(&self) -> bool {
        self.source.starts_with("mhwd")
    }
}

impl From<&DriverEntry> for CatalogDriver {
    fn from(entry: &DriverEntry) -> Self {
        CatalogDriver {
            name: entry.name.clone(),
            package: entry.package.clone(),
            category: entry.category.clone(),
            description: entry.description.clone(),
            installed: entry.installed,
            driver: String::new(),
            category_label: entry.category_label.clone(),
            source: entry.source.as_str().to_string(),
        }
    }
}

/// Driver descriptor from the hardware detection script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectedDriver {
    pub id: Option<String>,
    pub device: Option<String>,
    pub name: String,
    pub package: String,
    pub description: String,
    #[serde(deserialize_with = "deserialize_lenient_bool")]
    pub installed: bool,
    pub source: String,
}

impl From<&DetectedDriver> for CatalogDriver {
    fn from(d: &DetectedDriver) -> Self {
        CatalogDriver {
            name: d.name.clone(),
            package: d.package.clone(),
            category: "detected".to_string(),
            description: d.description.clone(),
            installed: d.installed,
            driver: String::new(),
            category_label: d.device.clone().unwrap_or_default(),
            source: d.source.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelSource {
    Official,
    Aur,
    Mhwd,
}

impl fmt::Display for KernelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KernelSource::Official => "official",
            KernelSource::Aur => "aur",
            KernelSource::Mhwd => "mhwd",
        };
        f.write_str(s)
    }
}

/// A kernel package from pacman, an AUR search, or the local database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelPackage {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub source: KernelSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default)]
    pub is_installed: bool,
    #[serde(default)]
    pub is_running: bool,
}

/// Snapshot of available and installed kernels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelsReport {
    pub official_available: Vec<KernelPackage>,
    pub aur_available: Vec<KernelPackage>,
    pub installed_packages: Vec<KernelPackage>,
    pub current_running_uname: String,
    pub timestamp: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KernelsReport {
    pub fn empty_with_error(uname: String, error: String) -> Self {
        KernelsReport {
            official_available: Vec::new(),
            aur_available: Vec::new(),
            installed_packages: Vec::new(),
            current_running_uname: uname,
            timestamp: Local::now(),
            error: Some(error),
        }
    }

    /// Look a kernel up among the installable ones, official first.
    pub fn find_available(&self, name: &str) -> Option<&KernelPackage> {
        self.official_available
            .iter()
            .chain(self.aur_available.iter())
            .find(|k| k.name == name)
    }

    pub fn running_kernel(&self) -> Option<&KernelPackage> {
        self.installed_packages.iter().find(|k| k.is_running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelStatus {
    InUse,
    Installed,
    Available,
}

impl KernelStatus {
    pub fn label(&self) -> &'static str {
        match self {
            KernelStatus::InUse => "In use",
            KernelStatus::Installed => "Installed",
            KernelStatus::Available => "Available",
        }
    }
}

/// A kernel as listed by mhwd-kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MhwdKernel {
    pub name: String,
    pub version: String,
    pub status: KernelStatus,
    pub repository: String,
    pub build_date: String,
    pub description: String,
}

/// Progress update from a long-running package operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationProgress {
    /// 0.0 ..= 1.0
    pub fraction: f32,
    pub message: String,
}

impl OperationProgress {
    pub fn new(fraction: f32, message: impl Into<String>) -> Self {
        OperationProgress {
            fraction: fraction.clamp(0.0, 1.0),
            message: message.into(),
        }
    }
}

/// Progress callback shared between the UI and background tasks.
pub type ProgressFn = std::sync::Arc<dyn Fn(OperationProgress) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_driver_lenient_fields() {
        let json = r#"[
            {"name": "nvidia", "package": "nvidia-dkms", "installed": "true", "unknown": 5},
            {"name": "r8168", "package": "r8168", "installed": 0, "category": "Network"},
            {"name": "broadcom", "package": "broadcom-wl", "installed": null}
        ]"#;
        let drivers: Vec<CatalogDriver> = serde_json::from_str(json).unwrap();
        assert!(drivers[0].installed);
        assert!(!drivers[1].installed);
        assert_eq!(drivers[1].category, "Network");
        assert!(!drivers[2].installed);
        assert_eq!(drivers[2].category, "");
    }

    #[test]
    fn test_mhwd_source_prefix() {
        let mut d = CatalogDriver::default();
        d.source = "mhwd-nonfree".into();
        assert!(d.uses_mhwd());
        d.source = "pacman".into();
        assert!(!d.uses_mhwd());
        assert!(DriverSource::MhwdFree.is_mhwd());
        assert!(!DriverSource::Firmware.is_mhwd());
    }

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(OperationProgress::new(1.7, "x").fraction, 1.0);
        assert_eq!(OperationProgress::new(-0.2, "x").fraction, 0.0);
    }
}
