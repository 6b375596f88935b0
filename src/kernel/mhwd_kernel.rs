//! Manjaro kernels through `mhwd-kernel`.

use super::parser::parse_pacman_info;
use crate::config::InstallHistory;
use crate::error::AppError;
use crate::models::{KernelStatus, MhwdKernel, OperationProgress, ProgressFn};
use crate::system::command::{CommandSpec, PACKAGE_OP_TIMEOUT, QUERY_TIMEOUT};
use crate::system::{validate_package_name, SystemImpl};
use crate::{log_info, log_parsed};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::path::PathBuf;

static LIST_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\* )?linux[0-9a-zA-Z._-]+").expect("static mhwd-kernel line regex"));
static PACKAGE_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"linux[0-9a-zA-Z-]*").expect("static mhwd-kernel package regex"));
static VERSION_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.-]").expect("static version split regex"));

/// Kernel package names from `mhwd-kernel -l` or `-li`, sorted and unique.
pub fn parse_mhwd_kernel_list(text: &str) -> Vec<String> {
    let mut names: Vec<String> = text
        .lines()
        .filter(|line| LIST_LINE_RE.is_match(line))
        .filter_map(|line| {
            let line = line.trim_start();
            let line = line.strip_prefix("* ").unwrap_or(line);
            line.split_whitespace().next().map(str::to_string)
        })
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Package of the running kernel from `mhwd-kernel -li`.
pub fn running_package(li_text: &str) -> Option<String> {
    let line = li_text
        .lines()
        .find(|line| line.to_lowercase().contains("running"))?;
    PACKAGE_TOKEN_RE.find(line).map(|m| m.as_str().to_string())
}

/// `linux61` -> `6.1`, `linux515` -> `5.15`, `linux6` -> `6.0`.
pub fn base_version_from_name(name: &str) -> Option<String> {
    let digits: String = name
        .strip_prefix("linux")?
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let mut chars = digits.chars();
    let major = chars.next()?;
    let minor: String = chars.collect();
    if minor.is_empty() {
        Some(format!("{}.0", major))
    } else {
        Some(format!("{}.{}", major, minor))
    }
}

/// Status for every kernel that is either available or installed.
pub fn classify(
    available: &[String],
    installed: &[String],
    running: Option<&str>,
    uname: &str,
) -> Vec<(String, KernelStatus)> {
    let mut all: Vec<String> = available.iter().chain(installed.iter()).cloned().collect();
    all.sort();
    all.dedup();

    all.into_iter()
        .map(|name| {
            let status = if installed.contains(&name) {
                let in_use = match running {
                    Some(running) => running == name,
                    None => base_version_from_name(&name)
                        .map_or(false, |base| uname.starts_with(&base)),
                };
                if in_use {
                    KernelStatus::InUse
                } else {
                    KernelStatus::Installed
                }
            } else {
                KernelStatus::Available
            };
            (name, status)
        })
        .collect()
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum VersionPart {
    Number(u64),
    Text(String),
}

fn version_key(version: &str) -> Vec<VersionPart> {
    if version.is_empty() {
        return Vec::new();
    }
    VERSION_SPLIT_RE
        .split(version)
        .map(|part| match part.parse::<u64>() {
            Ok(n) => VersionPart::Number(n),
            Err(_) => VersionPart::Text(part.to_string()),
        })
        .collect()
}

/// Descending version order; numeric parts compare as numbers and empty
/// versions sort last.
pub fn compare_versions_desc(a: &str, b: &str) -> Ordering {
    version_key(b).cmp(&version_key(a))
}

/// Progress for one `mhwd-kernel -i` output line.
pub fn install_step_fraction(line: &str, current: f32) -> f32 {
    if line.contains("Downloading") {
        0.3
    } else if line.contains("Installing") {
        0.6
    } else if line.contains("Configuring") {
        0.8
    } else {
        current
    }
}

fn apply_info(kernel: &mut MhwdKernel, text: &str) {
    let info = parse_pacman_info(text);
    let get = |key: &str| info.get(key).cloned().unwrap_or_default();
    kernel.version = get("Version");
    kernel.repository = get("Repository");
    kernel.build_date = get("Build Date");
    kernel.description = get("Description");
}

pub struct MhwdKernelManager {
    system: SystemImpl,
    history_path: PathBuf,
    aur_preference: Option<String>,
}

impl MhwdKernelManager {
    pub fn new(system: SystemImpl, history_path: impl Into<PathBuf>) -> Self {
        MhwdKernelManager {
            system,
            history_path: history_path.into(),
            aur_preference: None,
        }
    }

    pub fn with_aur_preference(mut self, preference: Option<String>) -> Self {
        self.aur_preference = preference;
        self
    }

    pub async fn is_available(&self) -> bool {
        self.system.command_exists("mhwd-kernel").await
    }

    async fn mhwd_kernel(&self, flag: &str) -> Result<String, AppError> {
        let spec = CommandSpec::new("mhwd-kernel")
            .arg(flag)
            .timeout(QUERY_TIMEOUT)
            .c_locale();
        let output = self.system.runner().run(spec).await?;
        if !output.success() {
            return Err(AppError::OsCommand {
                cmd: format!("mhwd-kernel {}", flag),
                reason: output.stderr_tail(2),
            });
        }
        Ok(output.stdout)
    }

    async fn package_info(&self, name: &str, aur_helper: Option<&str>) -> Option<String> {
        let mut candidates = vec![
            CommandSpec::new("pacman").args(["-Qi", name]),
            CommandSpec::new("pacman").args(["-Si", name]),
        ];
        if let Some(helper) = aur_helper {
            candidates.push(CommandSpec::new(helper).args(["-Si", name]));
        }
        for spec in candidates {
            match self.system.runner().run(spec.timeout(QUERY_TIMEOUT).c_locale()).await {
                Ok(out) if out.success() && !out.stdout.trim().is_empty() => return Some(out.stdout),
                _ => continue,
            }
        }
        None
    }

    /// The current kernel (running package, else `uname -r`) and every
    /// known kernel, newest version first.
    pub async fn list(&self) -> Result<(String, Vec<MhwdKernel>), AppError> {
        let available = parse_mhwd_kernel_list(&self.mhwd_kernel("-l").await?);
        let li = self.mhwd_kernel("-li").await?;
        let installed = parse_mhwd_kernel_list(&li);
        let running = running_package(&li);
        let uname = self.system.uname_r().await;
        let aur_helper = self.system.detect_aur_helper(self.aur_preference.as_deref()).await;

        let mut kernels = Vec::new();
        for (name, status) in classify(&available, &installed, running.as_deref(), &uname) {
            let mut kernel = MhwdKernel {
                name,
                version: String::new(),
                status,
                repository: String::new(),
                build_date: String::new(),
                description: String::new(),
            };
            match self.package_info(&kernel.name, aur_helper.as_deref()).await {
                Some(text) => apply_info(&mut kernel, &text),
                None => log::debug!("[Kernel] No package info for {}", kernel.name),
            }
            kernels.push(kernel);
        }
        kernels.sort_by(|a, b| compare_versions_desc(&a.version, &b.version));

        log_info!("[Kernel] mhwd-kernel lists {} kernels", kernels.len());
        Ok((running.unwrap_or(uname), kernels))
    }

    /// `pkexec mhwd-kernel -i <name>`, mapping known output steps to progress.
    pub async fn install(&self, name: &str, progress: ProgressFn) -> Result<(), AppError> {
        validate_package_name(name)?;
        log_parsed!("Installing kernel {} with mhwd-kernel", name);
        progress(OperationProgress::new(0.1, format!("Installing {}...", name)));

        let mut fraction = 0.1_f32;
        let sink_progress = progress.clone();
        let sink = Box::new(move |line: &str| {
            let line = line.trim();
            if line.is_empty() {
                return;
            }
            log::info!("[Install] {}", line);
            fraction = install_step_fraction(line, fraction);
            sink_progress(OperationProgress::new(fraction, line));
        });

        let spec = CommandSpec::new("mhwd-kernel")
            .args(["-i", name])
            .timeout(PACKAGE_OP_TIMEOUT)
            .privileged();
        let output = self.system.runner().run_streaming(spec, sink).await?;
        if !output.success() {
            let msg = format!("Kernel {} installation failed: {}", name, output.stderr.trim());
            progress(OperationProgress::new(1.0, msg.clone()));
            return Err(AppError::OsCommand {
                cmd: format!("mhwd-kernel -i {}", name),
                reason: msg,
            });
        }

        let version = self.system.installed_version(name).await.unwrap_or_default();
        if let Err(e) = InstallHistory::load(&self.history_path).append(name, &version) {
            log::warn!("[Kernel] Failed to record {} in kernel history: {}", name, e);
        }
        progress(OperationProgress::new(
            1.0,
            format!("Kernel {} installation succeeded. Please reboot to use the new kernel.", name),
        ));
        Ok(())
    }

    /// `pkexec mhwd-kernel -r <name>`. The running kernel is refused.
    pub async fn remove(&self, name: &str) -> Result<(), AppError> {
        validate_package_name(name)?;
        let li = self.mhwd_kernel("-li").await?;
        if running_package(&li).as_deref() == Some(name) {
            return Err(AppError::InvalidInput(format!(
                "Kernel {} is currently running and cannot be removed",
                name
            )));
        }
        log_parsed!("Removing kernel {} with mhwd-kernel", name);
        let spec = CommandSpec::new("mhwd-kernel")
            .args(["-r", name])
            .timeout(PACKAGE_OP_TIMEOUT)
            .privileged();
        let output = self.system.runner().run(spec).await?;
        if output.success() {
            Ok(())
        } else {
            Err(AppError::OsCommand {
                cmd: format!("mhwd-kernel -r {}", name),
                reason: format!("exit code {}: {}", output.code(), output.stderr_tail(3)),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = "Currently running: 6.6.36-1-MANJARO (linux66)\n\
The following kernels are installed in your system:\n\
   * linux61\n   * linux66\n   * linux610-rt\n";

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_mhwd_kernel_list(LIST), names(&["linux61", "linux610-rt", "linux66"]));
        assert!(parse_mhwd_kernel_list("").is_empty());
        assert_eq!(parse_mhwd_kernel_list("linux66 \n  * linux66\n"), names(&["linux66"]));
    }

    #[test]
    fn test_running_package() {
        assert_eq!(running_package(LIST).as_deref(), Some("linux66"));
        assert_eq!(running_package("nothing here"), None);
    }

    #[test]
    fn test_base_version() {
        assert_eq!(base_version_from_name("linux61").as_deref(), Some("6.1"));
        assert_eq!(base_version_from_name("linux515").as_deref(), Some("5.15"));
        assert_eq!(base_version_from_name("linux610").as_deref(), Some("6.10"));
        assert_eq!(base_version_from_name("linux6").as_deref(), Some("6.0"));
        assert_eq!(base_version_from_name("linux").as_deref(), None);
        assert_eq!(base_version_from_name("linux-lts").as_deref(), None);
    }

    #[test]
    fn test_classify() {
        let available = names(&["linux61", "linux66", "linux69"]);
        let installed = names(&["linux61", "linux66"]);
        let statuses = classify(&available, &installed, Some("linux66"), "6.6.36-1-MANJARO");
        assert_eq!(
            statuses,
            vec![
                ("linux61".to_string(), KernelStatus::Installed),
                ("linux66".to_string(), KernelStatus::InUse),
                ("linux69".to_string(), KernelStatus::Available),
            ]
        );

        let statuses = classify(&available, &installed, None, "6.1.96-1-MANJARO");
        assert_eq!(statuses[0].1, KernelStatus::InUse);
        assert_eq!(statuses[1].1, KernelStatus::Installed);
    }

    #[test]
    fn test_version_order() {
        let mut versions = vec!["6.1.96-1", "", "6.10.2-1", "6.6.36-1"];
        versions.sort_by(|a, b| compare_versions_desc(a, b));
        assert_eq!(versions, vec!["6.10.2-1", "6.6.36-1", "6.1.96-1", ""]);
    }

    #[test]
    fn test_install_step_fraction() {
        assert_eq!(install_step_fraction("Downloading linux66...", 0.1), 0.3);
        assert_eq!(install_step_fraction(":: Installing linux66", 0.3), 0.6);
        assert_eq!(install_step_fraction("Configuring grub", 0.6), 0.8);
        assert_eq!(install_step_fraction("(1/2) checking keys", 0.6), 0.6);
    }
}
