/// System module: command execution, validated package operations, disk
/// space and dependency checks

pub mod command;
pub mod disk;
pub mod health;

pub use command::{command_exists, CommandOutput, CommandRunner, CommandSpec, LineSink, SystemRunner};

use crate::error::AppError;
use crate::models::{OperationProgress, ProgressFn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Logging macros for convenient access
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        log::info!("{}", msg);
    }}
}

#[macro_export]
macro_rules! log_parsed {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        // Use target="parsed" for high-level events
        log::info!(target: "parsed", "{}", msg);
    }}
}

static PACKAGE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9@_+][a-z0-9@._+\-]*$").expect("static package name regex")
});

/// Reject anything pacman would not accept as a package name, including
/// leading dashes that would be read as flags.
pub fn validate_package_name(name: &str) -> Result<(), AppError> {
    if PACKAGE_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "Package name contains invalid characters: '{}'",
            name
        )))
    }
}

/// Package manager operations on top of a [`CommandRunner`].
///
/// Package names are always passed as separate argv entries, never through a
/// shell.
#[derive(Clone)]
pub struct SystemImpl {
    runner: Arc<dyn CommandRunner>,
}

impl SystemImpl {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        SystemImpl { runner }
    }

    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        self.runner.clone()
    }

    /// `pkexec pacman -S --noconfirm -- <names>`, streaming stdout to `sink`.
    pub async fn install_packages(
        &self,
        names: &[String],
        sink: LineSink,
    ) -> Result<CommandOutput, AppError> {
        for name in names {
            validate_package_name(name)?;
        }
        log_parsed!("Installing packages: {}", names.join(" "));
        let spec = CommandSpec::new("pacman")
            .args(["-S", "--noconfirm", "--"])
            .args(names.iter().cloned())
            .timeout(command::PACKAGE_OP_TIMEOUT)
            .privileged();
        let output = self.runner.run_streaming(spec, sink).await?;
        log_output("pacman install", &output);
        Ok(output)
    }

    /// `pkexec pacman -Rns --noconfirm -- <name>`
    pub async fn remove_package(&self, name: &str) -> Result<(), AppError> {
        validate_package_name(name)?;
        log_parsed!("Removing package: {}", name);
        let spec = CommandSpec::new("pacman")
            .args(["-Rns", "--noconfirm", "--", name])
            .timeout(command::PACKAGE_OP_TIMEOUT)
            .privileged();
        let output = self.runner.run(spec).await?;
        log_output("pacman uninstall", &output);
        if output.success() {
            Ok(())
        } else {
            Err(AppError::OsCommand {
                cmd: format!("pacman -Rns {}", name),
                reason: format!("exit code {}: {}", output.code(), output.stderr_tail(3)),
            })
        }
    }

    /// `pacman -Q <name>` exit status.
    pub async fn is_package_installed(&self, name: &str) -> bool {
        self.query_ok(&["-Q", name]).await
    }

    /// `pacman -Si <name>` exit status.
    pub async fn package_exists_in_repos(&self, name: &str) -> bool {
        self.query_ok(&["-Si", name]).await
    }

    /// Installed version as reported by `pacman -Q`, if installed.
    pub async fn installed_version(&self, name: &str) -> Option<String> {
        let spec = CommandSpec::new("pacman")
            .args(["-Q", name])
            .timeout(command::QUERY_TIMEOUT)
            .c_locale();
        let output = self.runner.run(spec).await.ok()?;
        if !output.success() {
            return None;
        }
        output
            .stdout
            .split_whitespace()
            .nth(1)
            .map(|v| v.to_string())
    }

    async fn query_ok(&self, args: &[&str]) -> bool {
        if args.last().map_or(true, |name| validate_package_name(name).is_err()) {
            return false;
        }
        let spec = CommandSpec::new("pacman")
            .args(args.iter().copied())
            .timeout(command::QUERY_TIMEOUT);
        matches!(self.runner.run(spec).await, Ok(output) if output.success())
    }

    /// Preferred helper first, then yay, then paru.
    pub async fn detect_aur_helper(&self, preference: Option<&str>) -> Option<String> {
        let mut candidates: Vec<&str> = Vec::new();
        if let Some(pref) = preference {
            candidates.push(pref);
        }
        for helper in ["yay", "paru"] {
            if !candidates.contains(&helper) {
                candidates.push(helper);
            }
        }
        for helper in candidates {
            if command_exists(self.runner.as_ref(), helper).await {
                return Some(helper.to_string());
            }
        }
        None
    }

    pub async fn command_exists(&self, name: &str) -> bool {
        command_exists(self.runner.as_ref(), name).await
    }

    /// `uname -r`, or "Unknown".
    pub async fn uname_r(&self) -> String {
        let spec = CommandSpec::new("uname").arg("-r").timeout(command::QUICK_TIMEOUT);
        match self.runner.run(spec).await {
            Ok(out) if out.success() => out.stdout.trim().to_string(),
            Ok(out) => {
                log_info!("[System] uname -r exited with {}", out.code());
                "Unknown".to_string()
            }
            Err(e) => {
                log_info!("[System] Failed to get running kernel: {}", e);
                "Unknown".to_string()
            }
        }
    }
}

/// Streamed install lines as progress: line `i` maps to
/// `min(0.2 + i * 0.005, 0.8)` with the first 70 characters as the message.
pub fn install_progress_sink(progress: ProgressFn) -> LineSink {
    let mut index: usize = 0;
    Box::new(move |line: &str| {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        log::info!("[Install] {}", line);
        let fraction = install_fraction(index);
        let head: String = line.chars().take(70).collect();
        progress(OperationProgress::new(fraction, format!("Installing: {}...", head)));
        index += 1;
    })
}

pub fn install_fraction(line_index: usize) -> f32 {
    (0.2 + line_index as f32 * 0.005).min(0.8)
}

fn log_output(label: &str, output: &CommandOutput) {
    if !output.stdout.is_empty() {
        log::debug!("[{}] stdout: {}", label, output.stdout);
    }
    if !output.stderr.is_empty() {
        log::info!("[{}] stderr: {}", label, output.stderr);
    }
}
