//! Kernel manager integration tests against scripted pacman/AUR output.

mod common;

use common::{failed, ok, plenty_of_space, ScriptedRunner};
use driver_manager::config::InstallHistory;
use driver_manager::models::{KernelSource, KernelStatus, OperationProgress, ProgressFn};
use driver_manager::system::command::AUR_BUILD_TIMEOUT;
use driver_manager::system::{CommandRunner, SystemImpl};
use driver_manager::{AppError, KernelManager, MhwdKernelManager};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const UNAME: &str = "6.9.7-arch1-1\n";

const INSTALLED: &str = "bash 5.2.026-2
linux 6.9.7-1
linux-headers 6.9.7-1
linux-firmware 20240610-1
linux-lts 6.6.36-1
";

const OFFICIAL: &str = "core/linux 6.9.7-1 [installed]
    The Linux kernel and modules
core/linux-lts 6.6.36-1 [installed]
    The LTS Linux kernel and modules
extra/linux-zen 6.9.7.zen1-1
    The Linux ZEN kernel and modules
extra/linux-zen-headers 6.9.7.zen1-1
    Headers and scripts for building modules for the Linux ZEN kernel
";

const AUR: &str = "aur/linux-xanmod 6.9.7-1 (+12 0.50)
    The Linux kernel and modules with Xanmod patches
aur/linux-xanmod-headers 6.9.7-1 (+12 0.50)
    Headers for linux-xanmod
";

fn base_runner() -> ScriptedRunner {
    ScriptedRunner::new()
        .respond_ok("uname -r", UNAME)
        .respond_ok("pacman -Q", INSTALLED)
        .respond_ok("pacman -Ss ^linux", OFFICIAL)
}

fn manager(runner: &Arc<ScriptedRunner>, dir: &tempfile::TempDir) -> KernelManager {
    let runner: Arc<dyn CommandRunner> = runner.clone();
    KernelManager::new(SystemImpl::new(runner), dir.path().join("kernel_history.json"))
}

fn recorder() -> (ProgressFn, Arc<Mutex<Vec<OperationProgress>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let progress: ProgressFn = Arc::new(move |p| sink.lock().unwrap().push(p));
    (progress, seen)
}

#[tokio::test]
async fn test_report_merges_installed_flags() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(base_runner());
    let report = manager(&runner, &dir).kernels_report(false).await;

    assert!(report.error.is_none());
    assert_eq!(report.current_running_uname, "6.9.7-arch1-1");

    let names: Vec<&str> = report.official_available.iter().map(|k| k.name.as_str()).collect();
    assert_eq!(names, vec!["linux", "linux-lts", "linux-zen"]);
    let linux = &report.official_available[0];
    assert!(linux.is_installed);
    assert!(linux.is_running);
    assert!(report.official_available[1].is_installed);
    assert!(!report.official_available[2].is_installed);

    // no helper on PATH, so no AUR section
    assert!(report.aur_available.is_empty());
    assert_eq!(report.running_kernel().map(|k| k.name.as_str()), Some("linux"));
}

#[tokio::test]
async fn test_aur_kernels_with_helper() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(base_runner().with_tools(&["paru"]).respond_ok("paru -Ss linux", AUR));
    let report = manager(&runner, &dir).kernels_report(false).await;

    assert_eq!(report.aur_available.len(), 1);
    assert_eq!(report.aur_available[0].name, "linux-xanmod");
    assert_eq!(report.aur_available[0].source, KernelSource::Aur);
    assert!(runner.was_called("which yay"));
}

#[tokio::test]
async fn test_report_is_cached_within_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(base_runner());
    let manager = manager(&runner, &dir).with_cache_ttl(Duration::from_secs(60));

    let first = manager.kernels_report(true).await;
    let second = manager.kernels_report(true).await;
    assert_eq!(first, second);
    assert_eq!(runner.count("pacman -Ss ^linux"), 1);

    // bypassing the cache rebuilds
    manager.kernels_report(false).await;
    assert_eq!(runner.count("pacman -Ss ^linux"), 2);

    manager.invalidate_cache();
    assert!(!manager.has_cached_report());
}

#[tokio::test]
async fn test_zero_ttl_never_serves_cache() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(base_runner());
    let manager = manager(&runner, &dir).with_cache_ttl(Duration::ZERO);

    manager.kernels_report(true).await;
    manager.kernels_report(true).await;
    assert_eq!(runner.count("pacman -Ss ^linux"), 2);
}

#[tokio::test]
async fn test_error_report_is_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(base_runner());
    runner.set("pacman -Q", failed(1, "error: could not open database"));
    let manager = manager(&runner, &dir);

    let report = manager.kernels_report(true).await;
    assert!(report.error.as_deref().unwrap_or_default().contains("could not open database"));
    assert!(report.official_available.is_empty());
    assert!(!manager.has_cached_report());

    runner.set("pacman -Q", common::ok(INSTALLED));
    let report = manager.kernels_report(true).await;
    assert!(report.error.is_none());
    assert!(manager.has_cached_report());
}

#[tokio::test]
async fn test_fallback_search_when_nothing_matches() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        base_runner()
            .respond_ok("pacman -Ss ^linux", "")
            .respond_ok("pacman -Ss linux", "extra/linux-rt 6.8.2.rt11-1\n    Realtime kernel\n"),
    );
    let report = manager(&runner, &dir).kernels_report(false).await;
    let names: Vec<&str> = report.official_available.iter().map(|k| k.name.as_str()).collect();
    assert_eq!(names, vec!["linux-rt"]);
}

#[tokio::test]
async fn test_install_official_kernel_with_headers() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        plenty_of_space(base_runner(), &["/", "/boot"])
            .respond_ok("pacman -Si linux-zen-headers", "Name : linux-zen-headers\n")
            .respond_ok(
                "pkexec pacman -S --noconfirm -- linux-zen linux-zen-headers",
                "resolving dependencies...\n(1/2) installing linux-zen\n(2/2) installing linux-zen-headers\n",
            )
            .respond_ok("pacman -Q linux-zen", "linux-zen 6.9.7.zen1-1\n"),
    );
    let manager = manager(&runner, &dir);
    let (progress, seen) = recorder();

    manager.install_kernel("linux-zen", progress).await.unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen.iter().any(|p| p.message.starts_with("Installing: (1/2)")));
    let last = seen.last().unwrap();
    assert_eq!(last.fraction, 1.0);
    assert_eq!(last.message, "Kernel linux-zen installed. Reboot required.");
    assert!(seen.windows(2).all(|w| w[0].fraction <= w[1].fraction));

    let history = manager.history();
    assert_eq!(history.entries().len(), 1);
    assert_eq!(history.entries()[0].name, "linux-zen");
    assert_eq!(history.entries()[0].version, "6.9.7.zen1-1");
}

#[tokio::test]
async fn test_install_aur_kernel_allows_long_builds() {
    let dir = tempfile::tempdir().unwrap();
    let timeouts = Arc::new(Mutex::new(Vec::new()));
    let seen_timeouts = timeouts.clone();
    let runner = Arc::new(
        plenty_of_space(base_runner().with_tools(&["paru"]), &["/", "/boot"]).handler("paru", move |spec| {
            if spec.args.first().map(String::as_str) == Some("-Ss") {
                return ok(AUR);
            }
            seen_timeouts.lock().unwrap().push(spec.timeout);
            ok("==> Making package: linux-xanmod 6.9.7-1\n")
        }),
    );
    let (progress, _seen) = recorder();

    manager(&runner, &dir).install_kernel("linux-xanmod", progress).await.unwrap();

    assert!(runner.was_called("paru -S --noconfirm linux-xanmod"));
    assert_eq!(*timeouts.lock().unwrap(), vec![Some(AUR_BUILD_TIMEOUT)]);
    assert!(AUR_BUILD_TIMEOUT > Duration::from_secs(300));
}

#[tokio::test]
async fn test_install_without_headers_installs_kernel_only() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        plenty_of_space(base_runner(), &["/", "/boot"])
            .respond_ok("pkexec pacman -S --noconfirm -- linux-lts", "installing linux-lts\n"),
    );
    let (progress, _seen) = recorder();
    manager(&runner, &dir).install_kernel("linux-lts", progress).await.unwrap();
    assert!(runner.was_called("pkexec pacman -S --noconfirm -- linux-lts"));
}

#[tokio::test]
async fn test_install_refused_on_low_disk_space() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        base_runner()
            .respond_ok("df -BG --output=avail /", "Avail\n 40G\n")
            .respond_ok("df -BG --output=avail /boot", "Avail\n 0G\n"),
    );
    let (progress, seen) = recorder();
    let err = manager(&runner, &dir).install_kernel("linux-zen", progress).await.unwrap_err();

    assert!(matches!(err, AppError::InsufficientDiskSpace { ref path, .. } if path == "/boot"));
    assert_eq!(seen.lock().unwrap()[0].message, "Error: Not enough disk space");
    assert!(!runner.calls().iter().any(|c| c.starts_with("pkexec")));
}

#[tokio::test]
async fn test_install_unknown_kernel_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(plenty_of_space(base_runner(), &["/", "/boot"]));
    let (progress, _seen) = recorder();
    let err = manager(&runner, &dir).install_kernel("linux-nonexistent", progress).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_install_rejects_flag_like_names() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(base_runner());
    let (progress, _seen) = recorder();
    let err = manager(&runner, &dir).install_kernel("--overwrite", progress).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_failed_transaction_is_not_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        plenty_of_space(base_runner(), &["/", "/boot"])
            .respond("pkexec pacman -S --noconfirm -- linux-lts", failed(1, "error: failed to commit transaction")),
    );
    let manager = manager(&runner, &dir);
    let (progress, seen) = recorder();

    assert!(manager.install_kernel("linux-lts", progress).await.is_err());
    assert_eq!(seen.lock().unwrap().last().unwrap().message, "Error: Installation failed (code 1)");
    assert!(manager.history().entries().is_empty());
}

#[tokio::test]
async fn test_rollback_needs_two_entries() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(base_runner());
    let manager = manager(&runner, &dir);
    InstallHistory::load(dir.path().join("kernel_history.json"))
        .append("linux-zen", "6.9.7.zen1-1")
        .unwrap();

    let (progress, seen) = recorder();
    let err = manager.rollback_kernel(progress).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(err.user_message(), "No previous kernel version in history for rollback");
    assert!(seen.lock().unwrap()[0].message.starts_with("Error: No previous kernel"));
}

#[tokio::test]
async fn test_rollback_reinstalls_previous_kernel() {
    let dir = tempfile::tempdir().unwrap();
    let history_path = dir.path().join("kernel_history.json");
    let mut history = InstallHistory::load(&history_path);
    history.append("linux-lts", "6.6.36-1").unwrap();
    history.append("linux-zen", "6.9.7.zen1-1").unwrap();

    let runner = Arc::new(
        plenty_of_space(base_runner(), &["/", "/boot"])
            .respond_ok("pkexec pacman -S --noconfirm -- linux-lts", "reinstalling linux-lts\n")
            .respond_ok("pacman -Q linux-lts", "linux-lts 6.6.36-1\n"),
    );
    let manager = manager(&runner, &dir);
    let (progress, _seen) = recorder();

    manager.rollback_kernel(progress).await.unwrap();

    assert!(runner.was_called("pkexec pacman -S --noconfirm -- linux-lts"));
    let names: Vec<String> = manager.history().entries().iter().map(|e| e.name.clone()).collect();
    assert_eq!(names, vec!["linux-lts", "linux-zen", "linux-lts"]);
}

#[tokio::test]
async fn test_remove_refuses_running_kernel() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(base_runner());
    let err = manager(&runner, &dir).remove_kernel("linux").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert!(!runner.calls().iter().any(|c| c.starts_with("pkexec")));
}

#[tokio::test]
async fn test_remove_kernel_and_headers() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        base_runner()
            .respond_ok("pacman -Q linux-lts-headers", "linux-lts-headers 6.6.36-1\n")
            .respond_ok("pkexec pacman -Rns --noconfirm -- linux-lts-headers", "")
            .respond_ok("pkexec pacman -Rns --noconfirm -- linux-lts", ""),
    );
    manager(&runner, &dir).remove_kernel("linux-lts").await.unwrap();

    let removals: Vec<String> = runner
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("pkexec"))
        .collect();
    assert_eq!(
        removals,
        vec![
            "pkexec pacman -Rns --noconfirm -- linux-lts-headers",
            "pkexec pacman -Rns --noconfirm -- linux-lts",
        ]
    );
}

#[tokio::test]
async fn test_remove_not_installed_kernel() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(base_runner());
    let err = manager(&runner, &dir).remove_kernel("linux-zen").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_mhwd_kernel_unavailable_without_binary() {
    let dir = tempfile::tempdir().unwrap();
    let runner: Arc<dyn CommandRunner> = Arc::new(ScriptedRunner::new());
    let manager = MhwdKernelManager::new(SystemImpl::new(runner), dir.path().join("kernel_history.json"));
    assert!(!manager.is_available().await);
}

const MHWD_AVAILABLE: &str = "Available kernels:\n   * linux61\n   * linux612\n   * linux66\n";
const MHWD_INSTALLED: &str = "Currently running: 6.6.36-1-MANJARO (linux66)
The following kernels are installed in your system:
   * linux61
   * linux66
";

fn mhwd_runner() -> ScriptedRunner {
    ScriptedRunner::new()
        .with_tools(&["mhwd-kernel", "yay"])
        .respond_ok("mhwd-kernel -l", MHWD_AVAILABLE)
        .respond_ok("mhwd-kernel -li", MHWD_INSTALLED)
        .respond_ok("uname -r", "6.6.36-1-MANJARO\n")
        .respond_ok(
            "pacman -Qi linux61",
            "Name            : linux61\nVersion         : 6.1.96-1\nDescription     : The Linux61 kernel and modules\n",
        )
        .respond_ok(
            "pacman -Qi linux66",
            "Name            : linux66\nVersion         : 6.6.36-1\nBuild Date      : Thu 27 Jun 2024\n",
        )
        .respond_ok(
            "yay -Si linux612",
            "Repository      : core\nName            : linux612\nVersion         : 6.12.1-1\n",
        )
}

fn mhwd_manager(runner: &Arc<ScriptedRunner>, dir: &tempfile::TempDir) -> MhwdKernelManager {
    let runner: Arc<dyn CommandRunner> = runner.clone();
    MhwdKernelManager::new(SystemImpl::new(runner), dir.path().join("kernel_history.json"))
}

#[tokio::test]
async fn test_mhwd_list_sorts_newest_first_with_package_info() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(mhwd_runner());
    let manager = mhwd_manager(&runner, &dir);
    assert!(manager.is_available().await);

    let (current, kernels) = manager.list().await.unwrap();

    assert_eq!(current, "linux66");
    let rows: Vec<(&str, &str, KernelStatus)> = kernels
        .iter()
        .map(|k| (k.name.as_str(), k.version.as_str(), k.status))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("linux612", "6.12.1-1", KernelStatus::Available),
            ("linux66", "6.6.36-1", KernelStatus::InUse),
            ("linux61", "6.1.96-1", KernelStatus::Installed),
        ]
    );
    assert_eq!(kernels[0].repository, "core");
    assert_eq!(kernels[1].build_date, "Thu 27 Jun 2024");
    assert_eq!(kernels[2].description, "The Linux61 kernel and modules");
    // The AUR helper is resolved once per listing, not once per kernel.
    assert_eq!(runner.count("which yay"), 1);
}

#[tokio::test]
async fn test_mhwd_install_reports_steps_and_records_history() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        mhwd_runner()
            .respond_ok(
                "pkexec mhwd-kernel -i linux612",
                "Downloading linux612...\n\nInstalling linux612...\nConfiguring grub...\n",
            )
            .respond_ok("pacman -Q linux612", "linux612 6.12.1-1\n"),
    );
    let (progress, seen) = recorder();

    mhwd_manager(&runner, &dir).install("linux612", progress).await.unwrap();

    let fractions: Vec<f32> = seen.lock().unwrap().iter().map(|p| p.fraction).collect();
    assert_eq!(fractions, vec![0.1, 0.3, 0.6, 0.8, 1.0]);
    assert!(seen.lock().unwrap().last().unwrap().message.contains("reboot"));

    let history = InstallHistory::load(dir.path().join("kernel_history.json"));
    assert_eq!(history.entries().len(), 1);
    assert_eq!(history.entries()[0].name, "linux612");
    assert_eq!(history.entries()[0].version, "6.12.1-1");
}

#[tokio::test]
async fn test_mhwd_failed_install_is_not_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        mhwd_runner().respond("pkexec mhwd-kernel -i linux612", failed(1, "error: target not found")),
    );
    let (progress, seen) = recorder();

    let err = mhwd_manager(&runner, &dir).install("linux612", progress).await.unwrap_err();

    assert!(matches!(err, AppError::OsCommand { .. }));
    assert_eq!(seen.lock().unwrap().last().unwrap().fraction, 1.0);
    assert!(InstallHistory::load(dir.path().join("kernel_history.json")).entries().is_empty());
}

#[tokio::test]
async fn test_mhwd_remove_refuses_running_kernel() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(mhwd_runner().respond_ok("pkexec mhwd-kernel -r linux61", ""));
    let manager = mhwd_manager(&runner, &dir);

    let err = manager.remove("linux66").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert!(err.user_message().contains("Kernel linux66 is currently running and cannot be removed"));
    assert!(!runner.was_called("pkexec mhwd-kernel -r linux66"));

    manager.remove("linux61").await.unwrap();
    assert!(runner.was_called("pkexec mhwd-kernel -r linux61"));
}
