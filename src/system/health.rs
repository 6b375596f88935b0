/// Dependency Health Check
///
/// Silent checks for the external tools the pages shell out to.
/// Reports missing required and optional tools and the packages that
/// provide them.

use super::command::{command_exists, CommandRunner};
use serde::{Deserialize, Serialize};

/// Tools without which hardware listing or package operations fail outright.
pub const REQUIRED_TOOLS: &[&str] = &["lspci", "lscpu", "pkexec", "pacman"];

/// Tools that enable individual features.
pub const OPTIONAL_TOOLS: &[&str] = &["inxi", "mhwd", "mhwd-kernel", "glxinfo", "jq"];

/// Health status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Every required and optional tool is installed
    Excellent,
    /// Required tools present, some optional ones missing
    Good,
    /// A required tool is missing
    Poor,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Excellent => "Excellent",
            HealthStatus::Good => "Good",
            HealthStatus::Poor => "Poor",
        }
    }

    pub fn needs_fix(&self) -> bool {
        matches!(self, HealthStatus::Poor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub missing_required: Vec<String>,
    pub missing_optional: Vec<String>,
    pub aur_helper: Option<String>,
    pub message: String,
}

impl Default for HealthReport {
    fn default() -> Self {
        HealthReport {
            status: HealthStatus::Excellent,
            missing_required: Vec::new(),
            missing_optional: Vec::new(),
            aur_helper: None,
            message: "All dependencies and tools installed".to_string(),
        }
    }
}

impl HealthReport {
    /// Classify from the lists of missing tools.
    pub fn from_missing(
        missing_required: Vec<String>,
        missing_optional: Vec<String>,
        aur_helper: Option<String>,
    ) -> Self {
        let (status, message) = if !missing_required.is_empty() {
            (
                HealthStatus::Poor,
                format!("Missing required tools: {}", missing_required.join(", ")),
            )
        } else if !missing_optional.is_empty() || aur_helper.is_none() {
            let mut missing = missing_optional.clone();
            if aur_helper.is_none() {
                missing.push("yay/paru".to_string());
            }
            (
                HealthStatus::Good,
                format!("Ready (optional tools missing: {})", missing.join(", ")),
            )
        } else {
            (
                HealthStatus::Excellent,
                "All dependencies and tools installed".to_string(),
            )
        };
        HealthReport {
            status,
            missing_required,
            missing_optional,
            aur_helper,
            message,
        }
    }

    /// Repository packages that provide the missing tools.
    pub fn fix_packages(&self) -> Vec<String> {
        let mut packages: Vec<String> = Vec::new();
        for tool in self.missing_required.iter().chain(self.missing_optional.iter()) {
            if let Some(pkg) = providing_package(tool) {
                if !packages.iter().any(|p| p == pkg) {
                    packages.push(pkg.to_string());
                }
            }
        }
        packages
    }
}

/// Package that ships `tool` on Arch-family systems. `pacman` and the MHWD
/// tools are distribution base components and are not offered.
pub fn providing_package(tool: &str) -> Option<&'static str> {
    match tool {
        "lspci" => Some("pciutils"),
        "lscpu" => Some("util-linux"),
        "pkexec" => Some("polkit"),
        "inxi" => Some("inxi"),
        "glxinfo" => Some("mesa-utils"),
        "jq" => Some("jq"),
        _ => None,
    }
}

pub struct HealthManager;

impl HealthManager {
    /// Perform a silent dependency check
    pub async fn check_system_health(runner: &dyn CommandRunner) -> HealthReport {
        let mut missing_required = Vec::new();
        for tool in REQUIRED_TOOLS {
            if !command_exists(runner, tool).await {
                missing_required.push(tool.to_string());
            }
        }

        let mut missing_optional = Vec::new();
        for tool in OPTIONAL_TOOLS {
            if !command_exists(runner, tool).await {
                missing_optional.push(tool.to_string());
            }
        }

        let mut aur_helper = None;
        for helper in ["yay", "paru"] {
            if command_exists(runner, helper).await {
                aur_helper = Some(helper.to_string());
                break;
            }
        }

        let report = HealthReport::from_missing(missing_required, missing_optional, aur_helper);
        log::info!("[Health] {}: {}", report.status.as_str(), report.message);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_needs_fix() {
        assert!(HealthStatus::Poor.needs_fix());
        assert!(!HealthStatus::Good.needs_fix());
        assert!(!HealthStatus::Excellent.needs_fix());
    }

    #[test]
    fn test_missing_required_is_poor() {
        let report = HealthReport::from_missing(vec!["lspci".into()], vec![], Some("yay".into()));
        assert_eq!(report.status, HealthStatus::Poor);
        assert!(report.message.contains("lspci"));
    }

    #[test]
    fn test_missing_aur_helper_is_good() {
        let report = HealthReport::from_missing(vec![], vec![], None);
        assert_eq!(report.status, HealthStatus::Good);
        assert!(report.message.contains("yay/paru"));
    }

    #[test]
    fn test_fix_packages_dedupes_and_skips_base_tools() {
        let report = HealthReport::from_missing(
            vec!["lspci".into(), "pacman".into()],
            vec!["glxinfo".into(), "mhwd".into(), "jq".into()],
            None,
        );
        assert_eq!(report.fix_packages(), vec!["pciutils", "mesa-utils", "jq"]);
    }
}
