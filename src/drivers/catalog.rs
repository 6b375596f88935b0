//! Script-driven driver catalog and hardware-detected drivers.
//!
//! The drivers script writes its catalog to [`CATALOG_JSON`]; the hardware
//! detection script prints its JSON on stdout.

use crate::error::AppError;
use crate::models::{CatalogDriver, DetectedDriver};
use crate::system::command::{CommandRunner, CommandSpec, DETECT_SCRIPT_TIMEOUT, DRIVERS_SCRIPT_TIMEOUT};
use serde_json::Value;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const CATALOG_JSON: &str = "/tmp/drivers_list.json";
pub const DRIVERS_SCRIPT_NAME: &str = "list_drivers.sh";
pub const DETECT_SCRIPT_NAME: &str = "hardware_detect.sh";

const FALLBACK_DRIVERS_SCRIPT: &str = "#!/bin/bash\n\
# Minimal drivers list script\n\
echo \"[]\" > /tmp/drivers_list.json\n\
echo \"[]\"\n";

const FALLBACK_DETECT_SCRIPT: &str = "#!/bin/bash\n\
# Minimal hardware detection script\n\
echo \"[]\"\n";

/// Drivers sharing a category, in first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogGroup {
    pub category: String,
    pub drivers: Vec<CatalogDriver>,
}

/// Detected drivers sharing a device key (`id`, else `device`).
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceGroup {
    pub device: String,
    pub drivers: Vec<DetectedDriver>,
}

fn materialize(name: &str, content: &str) -> Result<PathBuf, AppError> {
    let path = std::env::temp_dir().join(name);
    std::fs::write(&path, content)?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    log::info!("[Drivers] Created minimal script at {}", path.display());
    Ok(path)
}

fn resolve_script(override_path: Option<&Path>, data_dir: &Path, name: &str, fallback: &str) -> Result<PathBuf, AppError> {
    if let Some(path) = override_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        log::warn!("[Drivers] Configured script {} does not exist", path.display());
    }
    let bundled = data_dir.join(name);
    if bundled.exists() {
        return Ok(bundled);
    }
    materialize(name, fallback)
}

/// Settings override, then `<data_dir>/list_drivers.sh`, then a minimal
/// script in the temp dir.
pub fn resolve_drivers_script(override_path: Option<&Path>, data_dir: &Path) -> Result<PathBuf, AppError> {
    resolve_script(override_path, data_dir, DRIVERS_SCRIPT_NAME, FALLBACK_DRIVERS_SCRIPT)
}

pub fn resolve_detect_script(override_path: Option<&Path>, data_dir: &Path) -> Result<PathBuf, AppError> {
    resolve_script(override_path, data_dir, DETECT_SCRIPT_NAME, FALLBACK_DETECT_SCRIPT)
}

/// Catalog entries from JSON text. Anything but an array is treated as
/// empty; malformed entries are dropped.
pub fn parse_catalog(json: &str) -> Result<Vec<CatalogDriver>, AppError> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Array(items) = value else {
        log::warn!("[Drivers] Catalog JSON is not an array");
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<CatalogDriver>(item) {
            Ok(driver) => Some(driver),
            Err(e) => {
                log::debug!("[Drivers] Dropping malformed catalog entry: {}", e);
                None
            }
        })
        .collect())
}

pub fn group_by_category(drivers: Vec<CatalogDriver>) -> Vec<CatalogGroup> {
    let mut groups: Vec<CatalogGroup> = Vec::new();
    for driver in drivers {
        let category = if driver.category.trim().is_empty() {
            "unknown".to_string()
        } else {
            driver.category.clone()
        };
        match groups.iter_mut().find(|g| g.category == category) {
            Some(group) => group.drivers.push(driver),
            None => groups.push(CatalogGroup {
                category,
                drivers: vec![driver],
            }),
        }
    }
    groups
}

/// Run the drivers script, then read and group [`CATALOG_JSON`].
pub async fn fetch_catalog(runner: &dyn CommandRunner, script: &Path, json_path: &Path) -> Result<Vec<CatalogGroup>, AppError> {
    let spec = CommandSpec::new("bash")
        .arg(script.to_string_lossy().into_owned())
        .timeout(DRIVERS_SCRIPT_TIMEOUT);
    let output = runner.run(spec).await?;
    if !output.success() {
        log::warn!(
            "[Drivers] Drivers script exited with {}: {}",
            output.code(),
            output.stderr_tail(3)
        );
    }

    if !json_path.exists() {
        log::warn!("[Drivers] {} missing, writing empty catalog", json_path.display());
        std::fs::write(json_path, "[]")?;
    }
    let content = std::fs::read_to_string(json_path)?;
    let drivers = parse_catalog(&content)?;
    log::info!("[Drivers] Catalog has {} drivers", drivers.len());
    Ok(group_by_category(drivers))
}

/// Detected drivers from the detection script's stdout. Entries need both a
/// name and a package.
pub fn parse_detected(stdout: &str) -> Vec<DetectedDriver> {
    let items = match serde_json::from_str::<Value>(stdout) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            log::error!("[Drivers] Hardware detection output is not a list");
            return Vec::new();
        }
        Err(e) => {
            log::error!("[Drivers] JSON decode error from hardware detection: {}", e);
            return Vec::new();
        }
    };
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<DetectedDriver>(item).ok())
        .filter(|d| !d.name.is_empty() && !d.package.is_empty())
        .collect()
}

pub async fn fetch_detected(runner: &dyn CommandRunner, script: &Path) -> Vec<DetectedDriver> {
    let spec = CommandSpec::new("bash")
        .arg(script.to_string_lossy().into_owned())
        .timeout(DETECT_SCRIPT_TIMEOUT);
    let output = match runner.run(spec).await {
        Ok(output) => output,
        Err(e) => {
            log::error!("[Drivers] Hardware detection failed: {}", e);
            return Vec::new();
        }
    };
    if !output.success() {
        log::error!(
            "[Drivers] Hardware detection script failed with code {}: {}",
            output.code(),
            output.stderr_tail(3)
        );
        return Vec::new();
    }
    if output.stdout.trim().is_empty() {
        log::warn!("[Drivers] Hardware detection script produced no output");
        return Vec::new();
    }
    let detected = parse_detected(&output.stdout);
    log::info!("[Drivers] Loaded {} detected hardware drivers", detected.len());
    detected
}

pub fn group_by_device(detected: &[DetectedDriver]) -> Vec<DeviceGroup> {
    let mut groups: Vec<DeviceGroup> = Vec::new();
    for driver in detected {
        let key = driver
            .id
            .as_deref()
            .or(driver.device.as_deref())
            .filter(|k| !k.is_empty())
            .unwrap_or("unknown")
            .to_string();
        match groups.iter_mut().find(|g| g.device == key) {
            Some(group) => group.drivers.push(driver.clone()),
            None => groups.push(DeviceGroup {
                device: key,
                drivers: vec![driver.clone()],
            }),
        }
    }
    groups
}

fn matches(driver: &CatalogDriver, needle: &str) -> bool {
    [
        &driver.name,
        &driver.description,
        &driver.package,
        &driver.driver,
        &driver.category,
        &driver.category_label,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}

/// Case-insensitive substring search. Blank text matches nothing.
pub fn search<'a>(drivers: impl IntoIterator<Item = &'a CatalogDriver>, text: &str) -> Vec<CatalogDriver> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    drivers
        .into_iter()
        .filter(|d| matches(d, &needle))
        .cloned()
        .collect()
}

pub fn search_groups(groups: &[CatalogGroup], text: &str) -> Vec<CatalogDriver> {
    search(groups.iter().flat_map(|g| g.drivers.iter()), text)
}

pub fn search_catalog_file(path: &Path, text: &str) -> Result<Vec<CatalogDriver>, AppError> {
    let content = std::fs::read_to_string(path)?;
    let drivers = parse_catalog(&content)?;
    Ok(search(&drivers, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {"name": "nvidia-dkms", "package": "nvidia-dkms", "category": "Gpu", "description": "NVIDIA proprietary driver", "installed": "true", "driver": "nvidia"},
        {"name": "r8168", "package": "r8168", "category": "Network", "description": "Realtek ethernet", "installed": false},
        {"name": "mystery", "package": "mystery"},
        {"name": "nouveau", "package": "xf86-video-nouveau", "category": "Gpu", "description": "Open source NVIDIA", "installed": 0}
    ]"#;

    #[test]
    fn test_parse_and_group_preserves_order() {
        let groups = group_by_category(parse_catalog(CATALOG).unwrap());
        let names: Vec<&str> = groups.iter().map(|g| g.category.as_str()).collect();
        assert_eq!(names, vec!["Gpu", "Network", "unknown"]);
        assert_eq!(groups[0].drivers.len(), 2);
        assert!(groups[0].drivers[0].installed);
        assert!(!groups[0].drivers[1].installed);
    }

    #[test]
    fn test_non_array_catalog_is_empty() {
        assert!(parse_catalog(r#"{"name": "x"}"#).unwrap().is_empty());
        assert!(parse_catalog("not json").is_err());
    }

    #[test]
    fn test_search_fields() {
        let drivers = parse_catalog(CATALOG).unwrap();
        let hits = search(&drivers, "  NVIDIA ");
        assert_eq!(hits.len(), 2);
        assert_eq!(search(&drivers, "realtek").len(), 1);
        assert!(search(&drivers, "   ").is_empty());
        assert!(search(&drivers, "zzz").is_empty());
    }

    #[test]
    fn test_search_catalog_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drivers_list.json");
        std::fs::write(&path, CATALOG).unwrap();
        assert_eq!(search_catalog_file(&path, "r8168").unwrap().len(), 1);
        assert!(search_catalog_file(&dir.path().join("missing.json"), "x").is_err());
    }

    #[test]
    fn test_parse_detected_requires_name_and_package() {
        let stdout = r#"[
            {"id": "10de:1b80", "name": "nvidia", "package": "nvidia-dkms"},
            {"id": "10de:1b80", "name": "nouveau", "package": ""},
            {"device": "Wireless", "name": "iwlwifi", "package": "linux-firmware"},
            "garbage"
        ]"#;
        let detected = parse_detected(stdout);
        assert_eq!(detected.len(), 2);
        assert!(parse_detected("Script executed\n[]").is_empty());
        assert!(parse_detected(r#"{"a": 1}"#).is_empty());
    }

    #[test]
    fn test_group_by_device() {
        let detected = vec![
            DetectedDriver { id: Some("a".into()), name: "x".into(), package: "x".into(), ..Default::default() },
            DetectedDriver { device: Some("dev".into()), name: "y".into(), package: "y".into(), ..Default::default() },
            DetectedDriver { name: "z".into(), package: "z".into(), ..Default::default() },
            DetectedDriver { id: Some("a".into()), name: "w".into(), package: "w".into(), ..Default::default() },
        ];
        let groups = group_by_device(&detected);
        let keys: Vec<&str> = groups.iter().map(|g| g.device.as_str()).collect();
        assert_eq!(keys, vec!["a", "dev", "unknown"]);
        assert_eq!(groups[0].drivers.len(), 2);
    }

    #[test]
    fn test_resolve_prefers_override() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("custom.sh");
        std::fs::write(&custom, "#!/bin/bash\n").unwrap();
        let resolved = resolve_drivers_script(Some(&custom), dir.path()).unwrap();
        assert_eq!(resolved, custom);

        std::fs::write(dir.path().join(DRIVERS_SCRIPT_NAME), "#!/bin/bash\n").unwrap();
        let resolved = resolve_drivers_script(None, dir.path()).unwrap();
        assert_eq!(resolved, dir.path().join(DRIVERS_SCRIPT_NAME));
    }
}
