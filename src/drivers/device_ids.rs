//! Kernel module drivers matched by PCI id.
//!
//! Layout: `<data_dir>/device-ids/<module>/{category,pkg,description,pci.ids}`.

use super::{category_label, read_lines, read_trimmed, subdirectories, DriverLister};
use crate::error::AppError;
use crate::models::{DriverEntry, DriverSource};
use std::path::Path;

/// Metadata of one module directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleInfo {
    pub module: String,
    pub category: String,
    pub package: String,
    pub description: String,
    pub pci_ids: Vec<String>,
}

/// Read a module directory. Missing metadata files are an error; a missing
/// `pci.ids` means the module matches nothing.
pub fn read_module(dir: &Path, module: &str) -> Result<ModuleInfo, AppError> {
    Ok(ModuleInfo {
        module: module.to_string(),
        category: read_trimmed(&dir.join("category"))?,
        package: read_trimmed(&dir.join("pkg"))?,
        description: read_trimmed(&dir.join("description"))?,
        pci_ids: read_lines(&dir.join("pci.ids")),
    })
}

/// Whether any `vendor:device` id shows up in the `lspci -nn` lines.
pub fn matches_pci_devices(pci_ids: &[String], lspci_lines: &[String]) -> bool {
    let lines: Vec<String> = lspci_lines.iter().map(|l| l.to_lowercase()).collect();
    pci_ids.iter().any(|id| {
        let mut parts = id.split(':');
        let (Some(vendor), Some(device)) = (parts.next(), parts.next()) else {
            return false;
        };
        let pattern = format!("{}:{}", vendor.trim(), device.trim()).to_lowercase();
        lines.iter().any(|line| line.contains(&pattern))
    })
}

pub async fn list(lister: &DriverLister) -> Result<Vec<DriverEntry>, AppError> {
    let base = lister.data_dir().join("device-ids");
    if !base.is_dir() {
        log::debug!("[Drivers] No device-ids directory at {}", base.display());
        return Ok(Vec::new());
    }

    let lspci = lister.pci_devices().await;
    let mut drivers = Vec::new();

    for module in subdirectories(&base)? {
        let info = match read_module(&base.join(&module), &module) {
            Ok(info) => info,
            Err(e) => {
                log::error!("[Drivers] Skipping module {}: {}", module, e);
                continue;
            }
        };

        let installed = lister.system().is_package_installed(&info.package).await;
        drivers.push(DriverEntry {
            compatible: matches_pci_devices(&info.pci_ids, &lspci),
            loaded: lister.is_module_loaded(&info.module),
            installed,
            category_label: category_label(&info.category),
            name: info.module,
            package: info.package,
            description: info.description,
            category: info.category,
            source: DriverSource::DeviceIds,
            firmware_files: Vec::new(),
        });
    }

    Ok(drivers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pci_id_match_is_case_insensitive() {
        let lspci = lines(&["01:00.0 VGA compatible controller [0300]: NVIDIA Corporation GP104 [10DE:1B80] (rev a1)"]);
        assert!(matches_pci_devices(&lines(&["10de:1b80"]), &lspci));
        assert!(!matches_pci_devices(&lines(&["10de:1c03"]), &lspci));
    }

    #[test]
    fn test_pci_id_extra_fields_ignored() {
        let lspci = lines(&["00:1f.3 Audio device [0403]: Intel Corporation [8086:a348]"]);
        assert!(matches_pci_devices(&lines(&["8086:a348:ffff"]), &lspci));
        assert!(!matches_pci_devices(&lines(&["8086"]), &lspci));
        assert!(!matches_pci_devices(&[], &lspci));
    }

    #[test]
    fn test_read_module_requires_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("category"), "Network Star\n").unwrap();
        std::fs::write(dir.path().join("pkg"), "r8168\n").unwrap();
        assert!(read_module(dir.path(), "r8168").is_err());

        std::fs::write(dir.path().join("description"), "Realtek driver\n").unwrap();
        let info = read_module(dir.path(), "r8168").unwrap();
        assert_eq!(info.package, "r8168");
        assert_eq!(info.category, "Network Star");
        assert!(info.pci_ids.is_empty());
    }
}
