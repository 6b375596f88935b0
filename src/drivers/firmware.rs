//! Firmware packages matched against failed firmware loads in the kernel log.

use super::{category_label, read_lines, read_trimmed, subdirectories, DriverLister};
use crate::error::AppError;
use crate::models::{DriverEntry, DriverSource};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static FAILED_LOAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"firmware: failed to load (\S+)").expect("static firmware regex"));

const LISTED_FILES: usize = 5;

/// Firmware names the kernel failed to load, from `dmesg` lines.
pub fn missing_firmware(dmesg: &[String]) -> Vec<String> {
    let mut missing: Vec<String> = dmesg
        .iter()
        .filter(|line| line.contains("firmware") && line.contains("failed"))
        .filter_map(|line| FAILED_LOAD_RE.captures(line))
        .map(|caps| caps[1].to_string())
        .collect();
    missing.sort();
    missing.dedup();
    missing
}

/// Whether any missing firmware name appears in the package's file list.
pub fn provides_missing(files: &[String], missing: &[String]) -> bool {
    let files: Vec<String> = files.iter().map(|f| f.to_lowercase()).collect();
    missing.iter().any(|name| {
        let name = name.to_lowercase();
        files.iter().any(|f| f.contains(&name))
    })
}

fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

/// Package description with the hardware note and a short file list appended.
pub fn build_description(base: &str, files: &[String], compatible: bool) -> String {
    let mut description = base.to_string();
    if compatible {
        description.push_str("\n\nThis firmware is required by your hardware.");
    }
    if !files.is_empty() {
        description.push_str("\n\nIncluded firmware files:");
        for file in files.iter().take(LISTED_FILES) {
            description.push_str("\n- ");
            description.push_str(basename(file));
        }
        if files.len() > LISTED_FILES {
            description.push_str(&format!("\n- ... ({} more)", files.len() - LISTED_FILES));
        }
    }
    description
}

pub async fn list(lister: &DriverLister) -> Result<Vec<DriverEntry>, AppError> {
    let base = lister.data_dir().join("firmware");
    if !base.is_dir() {
        log::debug!("[Drivers] No firmware directory at {}", base.display());
        return Ok(Vec::new());
    }

    let missing = missing_firmware(&lister.kernel_messages().await);
    if !missing.is_empty() {
        log::info!("[Drivers] Kernel reported {} missing firmware files", missing.len());
    }

    let mut drivers = Vec::new();
    for package in subdirectories(&base)? {
        let dir = base.join(&package);
        let (category, description) = match (
            read_trimmed(&dir.join("category")),
            read_trimmed(&dir.join("description")),
        ) {
            (Ok(c), Ok(d)) => (c, d),
            (Err(e), _) | (_, Err(e)) => {
                log::error!("[Drivers] Skipping firmware {}: {}", package, e);
                continue;
            }
        };
        let files = read_lines(&dir.join(&package));
        let compatible = provides_missing(&files, &missing);

        let category = if compatible && !category.split_whitespace().any(|w| w == "Star") {
            format!("{} Star", category)
        } else {
            category
        };

        let installed = lister.system().is_package_installed(&package).await;
        drivers.push(DriverEntry {
            name: package.clone(),
            description: build_description(&description, &files, compatible),
            category_label: category_label(&category),
            category,
            package,
            compatible,
            installed,
            loaded: false,
            source: DriverSource::Firmware,
            firmware_files: files,
        });
    }

    Ok(drivers)
}
