//! Printer, scanner and Bluetooth packages offered regardless of hardware.

use super::{category_label, DriverLister};
use crate::error::AppError;
use crate::models::{DriverEntry, DriverSource};

/// `(package, category, description)`
pub const STANDALONE_PACKAGES: &[(&str, &str, &str)] = &[
    ("cups", "Printer", "CUPS printing system (Common Unix Printing System)"),
    ("hplip", "Printer", "HP Linux Imaging and Printing - drivers for HP printers"),
    ("gutenprint", "Printer", "High quality drivers for many printers"),
    ("foomatic-db", "Printer", "Foomatic database - support for many printers"),
    ("sane", "Scanner", "Scanner Access Now Easy - scanner interface for Linux"),
    ("xsane", "Scanner", "Graphical interface for SANE"),
    ("bluez", "Bluetooth", "Bluetooth protocol stack for Linux"),
    ("blueman", "Bluetooth", "Graphical Bluetooth manager"),
];

pub async fn list(lister: &DriverLister) -> Result<Vec<DriverEntry>, AppError> {
    let mut drivers = Vec::with_capacity(STANDALONE_PACKAGES.len());
    for (package, category, description) in STANDALONE_PACKAGES {
        let installed = lister.system().is_package_installed(package).await;
        drivers.push(DriverEntry {
            name: package.to_string(),
            package: package.to_string(),
            description: description.to_string(),
            category: category.to_string(),
            category_label: category_label(category),
            compatible: true,
            installed,
            loaded: installed,
            source: DriverSource::Standalone,
            firmware_files: Vec::new(),
        });
    }
    Ok(drivers)
}
