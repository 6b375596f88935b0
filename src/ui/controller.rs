//! AppController: Central UI orchestrator for Driver Manager
//!
//! Holds the settings, the command runner and the managers. Every external
//! operation is spawned as a tokio task; results come back to the egui loop as
//! [`AppEvent`] values.

use crate::config::{loader, AppState, SettingsManager};
use crate::drivers::catalog::{self, CatalogGroup, DeviceGroup};
use crate::drivers::installer::DriverInstaller;
use crate::drivers::DriverLister;
use crate::error::{AppError, PackageError};
use crate::hardware::{HardwareDetector, HardwareSnapshot};
use crate::kernel::{KernelManager, MhwdKernelManager};
use crate::log_info;
use crate::mesa::MesaManager;
use crate::models::{CatalogDriver, KernelsReport, MhwdKernel, OperationProgress};
use crate::system::health::{HealthManager, HealthReport};
use crate::system::{install_progress_sink, CommandRunner, SystemImpl, SystemRunner};
use crate::ui::threading::{send_event, spawn_operation};
use crate::LogCollector;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;

/// Long-running, state-changing operations. Only one runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    InstallKernel,
    RemoveKernel,
    RollbackKernel,
    InstallMesa,
    RollbackMesa,
    InstallDriver,
    RemoveDriver,
    FixDependencies,
}

impl Operation {
    pub fn label(&self) -> &'static str {
        match self {
            Operation::InstallKernel => "Install kernel",
            Operation::RemoveKernel => "Remove kernel",
            Operation::RollbackKernel => "Kernel rollback",
            Operation::InstallMesa => "Install Mesa",
            Operation::RollbackMesa => "Mesa rollback",
            Operation::InstallDriver => "Install driver",
            Operation::RemoveDriver => "Remove driver",
            Operation::FixDependencies => "Install missing tools",
        }
    }

    pub fn affects_kernels(&self) -> bool {
        matches!(
            self,
            Operation::InstallKernel | Operation::RemoveKernel | Operation::RollbackKernel
        )
    }

    pub fn affects_mesa(&self) -> bool {
        matches!(self, Operation::InstallMesa | Operation::RollbackMesa)
    }

    pub fn affects_drivers(&self) -> bool {
        matches!(self, Operation::InstallDriver | Operation::RemoveDriver)
    }
}

/// Which tool manages kernels on this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelBackend {
    Pacman,
    Mhwd,
}

/// Everything the driver installer page renders.
#[derive(Debug, Clone, Default)]
pub struct DriversData {
    pub groups: Vec<CatalogGroup>,
    pub detected: Vec<DeviceGroup>,
}

impl DriversData {
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.drivers.is_empty()) && self.detected.is_empty()
    }

    pub fn driver_count(&self) -> usize {
        self.groups.iter().map(|g| g.drivers.len()).sum()
    }
}

/// Represents discrete events emitted from background tasks
#[derive(Clone, Debug)]
pub enum AppEvent {
    Status(String),
    Log(String),
    Progress { op: Operation, fraction: f32, message: String },
    HardwareLoaded(Box<HardwareSnapshot>),
    HardwareFailed(String),
    DriversLoaded(DriversData),
    DriversFailed(String),
    KernelsLoaded(KernelsReport),
    MhwdKernelsLoaded { current: String, kernels: Vec<MhwdKernel> },
    MesaDetected(String),
    OperationFinished { op: Operation, success: bool, message: String },
    HealthChecked(HealthReport),
}

/// On-disk locations the controller reads and writes.
#[derive(Debug, Clone)]
pub struct ControllerPaths {
    pub settings: PathBuf,
    pub kernel_history: PathBuf,
    pub mesa_history: PathBuf,
    pub catalog_json: PathBuf,
}

impl ControllerPaths {
    pub fn from_config_dirs() -> Result<Self, AppError> {
        Ok(ControllerPaths {
            settings: loader::settings_path()?,
            kernel_history: loader::kernel_history_path()?,
            mesa_history: loader::mesa_history_path()?,
            catalog_json: PathBuf::from(catalog::CATALOG_JSON),
        })
    }

    /// All files under one directory.
    pub fn in_dir(dir: &Path) -> Self {
        ControllerPaths {
            settings: dir.join("settings.json"),
            kernel_history: dir.join("kernel_history.json"),
            mesa_history: dir.join("mesa_history.json"),
            catalog_json: dir.join("drivers_list.json"),
        }
    }
}

/// Managers configured from the current settings. Rebuilt when a setting
/// they depend on changes.
#[derive(Clone)]
struct Managers {
    kernel: Arc<KernelManager>,
    mhwd_kernel: Arc<MhwdKernelManager>,
    mesa: Arc<MesaManager>,
    drivers: Arc<DriverLister>,
    installer: Arc<DriverInstaller>,
}

impl Managers {
    fn build(runner: &Arc<dyn CommandRunner>, state: &AppState, paths: &ControllerPaths) -> Self {
        let system = SystemImpl::new(runner.clone());
        let aur = state.aur_helper_preference().map(str::to_string);
        Managers {
            kernel: Arc::new(
                KernelManager::new(system.clone(), paths.kernel_history.clone())
                    .with_cache_ttl(Duration::from_secs(state.kernel_cache_ttl_secs))
                    .with_aur_preference(aur.clone()),
            ),
            mhwd_kernel: Arc::new(
                MhwdKernelManager::new(system.clone(), paths.kernel_history.clone())
                    .with_aur_preference(aur.clone()),
            ),
            mesa: Arc::new(
                MesaManager::new(system.clone(), paths.mesa_history.clone()).with_aur_preference(aur),
            ),
            drivers: Arc::new(DriverLister::new(system).with_data_dir(&state.drivers_data_dir)),
            installer: Arc::new(DriverInstaller::new(runner.clone())),
        }
    }

    fn depends_on_changed(before: &AppState, after: &AppState) -> bool {
        before.preferred_aur_helper != after.preferred_aur_helper
            || before.kernel_cache_ttl_secs != after.kernel_cache_ttl_secs
            || before.drivers_data_dir != after.drivers_data_dir
    }
}

/// Central state manager for AppController
pub struct AppController {
    /// Thread-safe application state
    pub settings: Arc<RwLock<AppState>>,
    pub runner: Arc<dyn CommandRunner>,
    /// Channel for UI events
    pub event_tx: mpsc::Sender<AppEvent>,
    pub log_collector: Option<Arc<LogCollector>>,
    paths: ControllerPaths,
    managers: RwLock<Managers>,
    hardware: Arc<tokio::sync::Mutex<HardwareDetector>>,
    busy: Arc<AtomicBool>,
}

impl AppController {
    /// Initialize AppController with production dependencies
    pub fn new(
        event_tx: mpsc::Sender<AppEvent>,
        log_collector: Option<Arc<LogCollector>>,
    ) -> Result<Self, AppError> {
        log_info!("[AppController] Initializing AppController");
        let paths = ControllerPaths::from_config_dirs()?;
        let state = SettingsManager::load_from(&paths.settings);
        log_info!("[AppController] Settings loaded from {}", paths.settings.display());
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());
        let hardware = HardwareDetector::new(runner.clone());
        Ok(Self::with_parts(runner, hardware, state, paths, event_tx, log_collector))
    }

    /// Controller over an arbitrary runner and hardware detector.
    pub fn with_parts(
        runner: Arc<dyn CommandRunner>,
        hardware: HardwareDetector,
        state: AppState,
        paths: ControllerPaths,
        event_tx: mpsc::Sender<AppEvent>,
        log_collector: Option<Arc<LogCollector>>,
    ) -> Self {
        let managers = Managers::build(&runner, &state, &paths);
        AppController {
            settings: Arc::new(RwLock::new(state)),
            runner,
            event_tx,
            log_collector,
            paths,
            managers: RwLock::new(managers),
            hardware: Arc::new(tokio::sync::Mutex::new(hardware)),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get current application state
    pub fn get_state(&self) -> Result<AppState, String> {
        self.settings
            .read()
            .map(|state| state.clone())
            .map_err(|e| format!("Failed to read state: {}", e))
    }

    /// Update application state and persist it
    pub fn update_state<F>(&self, f: F) -> Result<(), String>
    where
        F: FnOnce(&mut AppState),
    {
        let (before, after) = {
            let mut state = self
                .settings
                .write()
                .map_err(|e| format!("Failed to write state: {}", e))?;
            let before = state.clone();
            f(&mut state);
            (before, state.clone())
        };

        if Managers::depends_on_changed(&before, &after) {
            log_info!("[AppController] Package settings changed, rebuilding managers");
            let rebuilt = Managers::build(&self.runner, &after, &self.paths);
            *self.managers.write().unwrap_or_else(|e| e.into_inner()) = rebuilt;
        }

        SettingsManager::save_to(&after, &self.paths.settings).map_err(|e| {
            log::error!("[AppController] Failed to persist state: {}", e);
            format!("Failed to save state: {}", e)
        })
    }

    /// Reset all application state to defaults
    pub fn reset_to_defaults(&self) -> Result<(), String> {
        self.update_state(|state| *state = AppState::default())?;
        log_info!("[AppController] Application state reset to defaults");
        Ok(())
    }

    pub fn settings_path(&self) -> &Path {
        &self.paths.settings
    }

    /// True while an install, removal or rollback is running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn managers(&self) -> Managers {
        self.managers.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn state_or_default(&self) -> AppState {
        self.get_state().unwrap_or_else(|e| {
            log::warn!("[AppController] {}", e);
            AppState::default()
        })
    }

    // ------------------------------------------------------------------
    // Hardware
    // ------------------------------------------------------------------

    pub fn refresh_hardware(&self) {
        let hardware = self.hardware.clone();
        let tx = self.event_tx.clone();
        send_event(&tx, AppEvent::Status("Loading hardware information...".to_string()));

        tokio::spawn(async move {
            let result = hardware.lock().await.detect().await;
            let event = match result {
                Ok(snapshot) => AppEvent::HardwareLoaded(Box::new(snapshot)),
                Err(e) => {
                    log::error!("[AppController] Hardware detection failed: {}", e);
                    AppEvent::HardwareFailed(e.user_message())
                }
            };
            let _ = tx.send(event).await;
        });
    }

    pub fn check_health(&self) {
        let runner = self.runner.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let report = HealthManager::check_system_health(runner.as_ref()).await;
            log_info!("[AppController] System health: {}", report.message);
            let _ = tx.send(AppEvent::HealthChecked(report)).await;
        });
    }

    /// Install the packages providing missing tools.
    pub fn fix_dependencies(&self, packages: Vec<String>) -> bool {
        if packages.is_empty() {
            return false;
        }
        let system = SystemImpl::new(self.runner.clone());
        spawn_operation(Operation::FixDependencies, &self.busy, self.event_tx.clone(), move |progress| async move {
            progress(OperationProgress::new(0.1, format!("Installing {}...", packages.join(", "))));
            let output = system
                .install_packages(&packages, install_progress_sink(progress.clone()))
                .await?;
            if !output.success() {
                return Err(PackageError::TransactionFailed {
                    package: packages.join(" "),
                    code: output.code(),
                }
                .into());
            }
            progress(OperationProgress::new(1.0, "Missing tools installed"));
            Ok(format!("Installed {}", packages.join(", ")))
        })
    }

    // ------------------------------------------------------------------
    // Drivers
    // ------------------------------------------------------------------

    pub fn refresh_drivers(&self) {
        let state = self.state_or_default();
        let managers = self.managers();
        let runner = self.runner.clone();
        let catalog_json = self.paths.catalog_json.clone();
        let tx = self.event_tx.clone();
        send_event(&tx, AppEvent::Status("Loading drivers...".to_string()));

        tokio::spawn(async move {
            let event = match load_drivers(runner.as_ref(), &state, &managers.drivers, &catalog_json).await {
                Ok(data) => {
                    log_info!(
                        "[AppController] Loaded {} drivers, {} detected devices",
                        data.driver_count(),
                        data.detected.len()
                    );
                    AppEvent::DriversLoaded(data)
                }
                Err(e) => {
                    log::error!("[AppController] Loading drivers failed: {}", e);
                    AppEvent::DriversFailed(e.user_message())
                }
            };
            let _ = tx.send(event).await;
        });
    }

    pub fn install_driver(&self, driver: CatalogDriver) -> bool {
        let installer = self.managers().installer;
        spawn_operation(Operation::InstallDriver, &self.busy, self.event_tx.clone(), move |progress| async move {
            progress(OperationProgress::new(0.2, format!("Installing {}...", driver.package)));
            installer.install(&driver.package, &driver.source).await?;
            progress(OperationProgress::new(1.0, format!("{} installed", driver.package)));
            Ok(format!("Driver {} installed successfully.", driver.name))
        })
    }

    pub fn remove_driver(&self, driver: CatalogDriver) -> bool {
        let installer = self.managers().installer;
        spawn_operation(Operation::RemoveDriver, &self.busy, self.event_tx.clone(), move |progress| async move {
            progress(OperationProgress::new(0.2, format!("Removing {}...", driver.package)));
            installer.remove(&driver.package, &driver.source).await?;
            progress(OperationProgress::new(1.0, format!("{} removed", driver.package)));
            Ok(format!("Driver {} removed successfully.", driver.name))
        })
    }

    // ------------------------------------------------------------------
    // Kernels
    // ------------------------------------------------------------------

    /// Load the kernel lists. mhwd-kernel is used when preferred and present;
    /// `force` bypasses the report cache.
    pub fn refresh_kernels(&self, force: bool) {
        let prefer_mhwd = self.state_or_default().prefer_mhwd_kernel;
        let managers = self.managers();
        let tx = self.event_tx.clone();
        send_event(&tx, AppEvent::Status("Loading kernels...".to_string()));

        tokio::spawn(async move {
            if prefer_mhwd && managers.mhwd_kernel.is_available().await {
                match managers.mhwd_kernel.list().await {
                    Ok((current, kernels)) => {
                        let _ = tx.send(AppEvent::MhwdKernelsLoaded { current, kernels }).await;
                        return;
                    }
                    Err(e) => log::warn!("[AppController] mhwd-kernel listing failed, using pacman: {}", e),
                }
            }
            let report = managers.kernel.kernels_report(!force).await;
            let _ = tx.send(AppEvent::KernelsLoaded(report)).await;
        });
    }

    pub fn install_kernel(&self, name: String, backend: KernelBackend) -> bool {
        let managers = self.managers();
        spawn_operation(Operation::InstallKernel, &self.busy, self.event_tx.clone(), move |progress| async move {
            match backend {
                KernelBackend::Mhwd => managers.mhwd_kernel.install(&name, progress).await?,
                KernelBackend::Pacman => managers.kernel.install_kernel(&name, progress).await?,
            }
            Ok(format!("Kernel {} installed. Reboot required.", name))
        })
    }

    pub fn remove_kernel(&self, name: String, backend: KernelBackend) -> bool {
        let managers = self.managers();
        spawn_operation(Operation::RemoveKernel, &self.busy, self.event_tx.clone(), move |progress| async move {
            progress(OperationProgress::new(0.3, format!("Removing {}...", name)));
            match backend {
                KernelBackend::Mhwd => managers.mhwd_kernel.remove(&name).await?,
                KernelBackend::Pacman => managers.kernel.remove_kernel(&name).await?,
            }
            progress(OperationProgress::new(1.0, format!("Kernel {} removed", name)));
            Ok(format!("Kernel {} removed.", name))
        })
    }

    pub fn rollback_kernel(&self) -> bool {
        let kernel = self.managers().kernel;
        spawn_operation(Operation::RollbackKernel, &self.busy, self.event_tx.clone(), move |progress| async move {
            kernel.rollback_kernel(progress).await?;
            Ok("Kernel rollback finished. Reboot required.".to_string())
        })
    }

    // ------------------------------------------------------------------
    // Mesa
    // ------------------------------------------------------------------

    pub fn detect_mesa(&self) {
        let mesa = self.managers().mesa;
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let version = mesa.detect_current_mesa().await;
            let _ = tx.send(AppEvent::MesaDetected(version)).await;
        });
    }

    pub fn install_mesa(&self, use_git: bool, use_multilib: bool) -> bool {
        let mesa = self.managers().mesa;
        spawn_operation(Operation::InstallMesa, &self.busy, self.event_tx.clone(), move |progress| async move {
            mesa.install_mesa(use_git, use_multilib, progress).await?;
            let version = mesa.current_mesa().unwrap_or_else(|| crate::mesa::UNKNOWN_VERSION.to_string());
            Ok(format!("Mesa {} installed. Reboot recommended.", version))
        })
    }

    pub fn rollback_mesa(&self) -> bool {
        let mesa = self.managers().mesa;
        spawn_operation(Operation::RollbackMesa, &self.busy, self.event_tx.clone(), move |progress| async move {
            mesa.rollback_mesa(progress).await?;
            Ok("Mesa rollback finished. Reboot recommended.".to_string())
        })
    }

    /// Names recorded in the kernel and Mesa histories, newest last.
    pub fn history_names(&self) -> (Vec<String>, Vec<String>) {
        let managers = self.managers();
        let names = |entries: &[crate::config::HistoryEntry]| {
            entries.iter().map(|e| e.name.clone()).collect::<Vec<_>>()
        };
        (
            names(managers.kernel.history().entries()),
            names(managers.mesa.history().entries()),
        )
    }
}

/// Catalog from the drivers script merged with the built-in lister, plus the
/// hardware-detected drivers. Lister entries whose package the catalog
/// already has are skipped; incompatible ones only show when enabled in the
/// settings.
pub async fn load_drivers(
    runner: &dyn CommandRunner,
    state: &AppState,
    lister: &DriverLister,
    catalog_json: &Path,
) -> Result<DriversData, AppError> {
    let data_dir = Path::new(&state.drivers_data_dir);

    let script = catalog::resolve_drivers_script(state.drivers_script_path.as_deref().map(Path::new), data_dir)?;
    let catalog_result = catalog::fetch_catalog(runner, &script, catalog_json).await;

    let listed = lister.list_all().await;
    let mut drivers: Vec<CatalogDriver> = match catalog_result {
        Ok(groups) => groups.into_iter().flat_map(|g| g.drivers).collect(),
        Err(e) if listed.is_empty() => return Err(e),
        Err(e) => {
            log::warn!("[Drivers] Drivers script failed, showing built-in sources only: {}", e);
            Vec::new()
        }
    };

    for entry in listed
        .iter()
        .filter(|e| e.compatible || state.show_incompatible_drivers)
    {
        if !drivers.iter().any(|d| d.package == entry.package) {
            drivers.push(CatalogDriver::from(entry));
        }
    }

    let detect_script =
        catalog::resolve_detect_script(state.hardware_detect_script_path.as_deref().map(Path::new), data_dir)?;
    let detected = catalog::fetch_detected(runner, &detect_script).await;

    Ok(DriversData {
        groups: catalog::group_by_category(drivers),
        detected: catalog::group_by_device(&detected),
    })
}
