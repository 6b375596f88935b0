//! Print the kernel report the Kernel & Mesa page is built from.
//!
//! The report is also written to /tmp/kernel_data.json.

use anyhow::{bail, Context};
use driver_manager::config::loader::kernel_history_path;
use driver_manager::log_collector::StderrLogger;
use driver_manager::models::KernelPackage;
use driver_manager::system::{CommandRunner, SystemImpl, SystemRunner};
use driver_manager::KernelManager;
use std::sync::Arc;

const OUTPUT_PATH: &str = "/tmp/kernel_data.json";

fn print_section(title: &str, kernels: &[KernelPackage]) {
    println!("{} ({}):", title, kernels.len());
    for kernel in kernels {
        let mut flags = Vec::new();
        if kernel.is_installed {
            flags.push("installed");
        }
        if kernel.is_running {
            flags.push("running");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!("  {:<28} {:<24}{}", kernel.name, kernel.version, flags);
    }
    println!();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = StderrLogger::install(log::LevelFilter::Warn);

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());
    let history_path = kernel_history_path().context("Failed to resolve kernel history path")?;
    let manager = KernelManager::new(SystemImpl::new(runner), history_path);

    println!("=== Kernel Diagnostic ===");
    let report = manager.kernels_report(false).await;

    println!("Current kernel: {}", report.current_running_uname);
    println!();
    print_section("Installed kernels", &report.installed_packages);
    print_section("Official kernels", &report.official_available);
    print_section("AUR kernels", &report.aur_available);

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize kernel report")?;
    println!("{}", json);

    std::fs::write(OUTPUT_PATH, &json).with_context(|| format!("Failed to write {}", OUTPUT_PATH))?;
    println!("Saved report to {}", OUTPUT_PATH);

    if let Some(error) = &report.error {
        bail!("Kernel report incomplete: {}", error);
    }
    Ok(())
}
