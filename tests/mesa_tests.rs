//! Mesa detection, install and rollback against scripted commands.

mod common;

use common::{failed, ok, plenty_of_space, ScriptedRunner};
use driver_manager::config::InstallHistory;
use driver_manager::mesa::{ERROR_VERSION, UNKNOWN_VERSION};
use driver_manager::models::ProgressFn;
use driver_manager::system::command::AUR_BUILD_TIMEOUT;
use driver_manager::system::{CommandRunner, SystemImpl};
use driver_manager::{AppError, MesaManager};
use std::sync::{Arc, Mutex};

const GLXINFO: &str = "name of display: :0
display: :0  screen: 0
OpenGL vendor string: AMD
OpenGL version string: 4.6 (Compatibility Profile) Mesa 24.1.2-arch1.1
";

fn manager(runner: &Arc<ScriptedRunner>, dir: &tempfile::TempDir) -> MesaManager {
    let runner: Arc<dyn CommandRunner> = runner.clone();
    MesaManager::new(SystemImpl::new(runner), dir.path().join("mesa_history.json"))
}

fn no_progress() -> ProgressFn {
    Arc::new(|_| {})
}

#[tokio::test]
async fn test_detect_current_mesa() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::new().respond_ok("glxinfo -B", GLXINFO));
    let mesa = manager(&runner, &dir);

    assert!(mesa.current_mesa().is_none());
    assert_eq!(mesa.detect_current_mesa().await, "24.1.2");
    assert_eq!(mesa.current_mesa().as_deref(), Some("24.1.2"));
}

#[tokio::test]
async fn test_detect_without_mesa_line_is_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        ScriptedRunner::new().respond_ok("glxinfo -B", "OpenGL version string: 4.6.0 NVIDIA 550.90.07\n"),
    );
    assert_eq!(manager(&runner, &dir).detect_current_mesa().await, UNKNOWN_VERSION);

    let runner = Arc::new(ScriptedRunner::new().respond("glxinfo -B", failed(1, "unable to open display")));
    assert_eq!(manager(&runner, &dir).detect_current_mesa().await, UNKNOWN_VERSION);
    assert_ne!(UNKNOWN_VERSION, ERROR_VERSION);
}

#[tokio::test]
async fn test_install_stable_with_multilib_records_history() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        plenty_of_space(ScriptedRunner::new(), &["/"])
            .respond_ok(
                "pkexec pacman -S --noconfirm -- mesa lib32-mesa",
                "resolving dependencies...\n(2/2) installing lib32-mesa\n",
            )
            .respond_ok("glxinfo -B", GLXINFO),
    );
    let mesa = manager(&runner, &dir);

    mesa.install_mesa(false, true, no_progress()).await.unwrap();

    let history = InstallHistory::load(dir.path().join("mesa_history.json"));
    let latest = history.latest().unwrap();
    assert_eq!(latest.name, "mesa");
    assert_eq!(latest.version, "24.1.2");
}

#[tokio::test]
async fn test_install_git_uses_aur_helper() {
    let dir = tempfile::tempdir().unwrap();
    let timeouts = Arc::new(Mutex::new(Vec::new()));
    let seen_timeouts = timeouts.clone();
    let runner = Arc::new(
        plenty_of_space(ScriptedRunner::new().with_tools(&["paru"]), &["/"])
            .handler("paru", move |spec| {
                seen_timeouts.lock().unwrap().push(spec.timeout);
                ok("")
            })
            .respond_ok("glxinfo -B", GLXINFO),
    );
    manager(&runner, &dir).install_mesa(true, false, no_progress()).await.unwrap();

    assert!(runner.was_called("paru -S --noconfirm mesa-git"));
    assert_eq!(*timeouts.lock().unwrap(), vec![Some(AUR_BUILD_TIMEOUT)]);
    let history = InstallHistory::load(dir.path().join("mesa_history.json"));
    assert_eq!(history.latest().unwrap().name, "mesa-git");
}

#[tokio::test]
async fn test_install_git_without_helper_fails() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(plenty_of_space(ScriptedRunner::new(), &["/"]));
    let err = manager(&runner, &dir)
        .install_mesa(true, false, no_progress())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MissingTool(_)));
    assert!(err.user_message().contains("yay or paru"));
}

#[tokio::test]
async fn test_failed_install_is_not_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        plenty_of_space(ScriptedRunner::new(), &["/"])
            .respond("pkexec pacman -S --noconfirm -- mesa", failed(1, "error: failed to commit transaction")),
    );
    assert!(manager(&runner, &dir).install_mesa(false, false, no_progress()).await.is_err());
    assert!(!dir.path().join("mesa_history.json").exists());
}

#[tokio::test]
async fn test_install_refused_on_low_disk_space() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::new().respond("df -BG --output=avail /", ok("Avail\n  0G\n")));
    let err = manager(&runner, &dir)
        .install_mesa(false, false, no_progress())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientDiskSpace { .. }));
    assert!(!runner.calls().iter().any(|c| c.starts_with("pkexec")));
}

#[tokio::test]
async fn test_rollback_requires_two_entries() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::new());
    let err = manager(&runner, &dir).rollback_mesa(no_progress()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(err.user_message(), "No previous Mesa version in history for rollback");
}

#[tokio::test]
async fn test_rollback_reinstalls_previous_flavour_with_multilib() {
    let dir = tempfile::tempdir().unwrap();
    let mut history = InstallHistory::load(dir.path().join("mesa_history.json"));
    history.append("mesa", "24.1.2").unwrap();
    history.append("mesa-git", "24.2.0").unwrap();

    let runner = Arc::new(
        plenty_of_space(ScriptedRunner::new(), &["/"])
            .respond_ok("pacman -Q lib32-mesa-git", "lib32-mesa-git 24.2.0-1\n")
            .respond_ok("pkexec pacman -S --noconfirm -- mesa lib32-mesa", "")
            .respond_ok("glxinfo -B", GLXINFO),
    );
    manager(&runner, &dir).rollback_mesa(no_progress()).await.unwrap();

    assert!(runner.was_called("pkexec pacman -S --noconfirm -- mesa lib32-mesa"));
    let history = InstallHistory::load(dir.path().join("mesa_history.json"));
    assert_eq!(history.entries().len(), 3);
    assert_eq!(history.latest().unwrap().name, "mesa");
}
