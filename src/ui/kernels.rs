/// Kernel & Mesa View
///
/// Shows the running kernel, the kernel lists (pacman/AUR groups or the
/// mhwd-kernel list), install/remove/rollback actions, and the Mesa section.

use crate::models::{KernelPackage, KernelStatus, KernelsReport, MhwdKernel};
use crate::ui::app::OperationStatus;
use crate::ui::controller::{AppController, KernelBackend};
use crate::ui::widgets::{
    progress_row, section_header, status_badge, COLOR_ACCENT, COLOR_CRITICAL, COLOR_MUTED, COLOR_OK,
    COLOR_WARN,
};
use eframe::egui;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Kernels as listed by mhwd-kernel.
#[derive(Debug, Clone, Default)]
pub struct MhwdListing {
    pub current: String,
    pub kernels: Vec<MhwdKernel>,
}

/// A state-changing action waiting for confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelAction {
    Install(String, KernelBackend),
    Remove(String, KernelBackend),
    Rollback,
    InstallMesa { use_git: bool, use_multilib: bool },
    RollbackMesa,
}

impl KernelAction {
    pub fn title(&self) -> &'static str {
        match self {
            KernelAction::Install(..) => "Install kernel",
            KernelAction::Remove(..) => "Remove kernel",
            KernelAction::Rollback => "Roll back kernel",
            KernelAction::InstallMesa { .. } => "Update Mesa",
            KernelAction::RollbackMesa => "Revert Mesa",
        }
    }

    pub fn prompt(&self, kernel_history: &[String], mesa_history: &[String]) -> String {
        let previous = |history: &[String]| {
            history
                .len()
                .checked_sub(2)
                .and_then(|i| history.get(i))
                .cloned()
                .unwrap_or_else(|| "the previous version".to_string())
        };
        match self {
            KernelAction::Install(name, _) => format!("Install {}? A reboot is required afterwards.", name),
            KernelAction::Remove(name, _) => format!("Remove {} and its headers?", name),
            KernelAction::Rollback => format!("Reinstall {}?", previous(kernel_history)),
            KernelAction::InstallMesa { use_git: true, .. } => {
                "Install mesa-git from the AUR? Development builds can be unstable.".to_string()
            }
            KernelAction::InstallMesa { .. } => "Install the stable Mesa packages?".to_string(),
            KernelAction::RollbackMesa => format!("Reinstall {}?", previous(mesa_history)),
        }
    }
}

#[derive(Default)]
pub struct KernelsPageState {
    pub report: Option<KernelsReport>,
    pub mhwd: Option<MhwdListing>,
    pub error: Option<String>,
    pub loading: bool,
    pub mesa_version: Option<String>,
    pub mesa_requested: bool,
    pub mesa_use_git: bool,
    pub mesa_multilib: bool,
    pub kernel_history: Vec<String>,
    pub mesa_history: Vec<String>,
    pub pending: Option<KernelAction>,
}

impl KernelsPageState {
    pub fn has_data(&self) -> bool {
        self.report.is_some() || self.mhwd.is_some()
    }

    pub fn current_kernel(&self) -> Option<&str> {
        if let Some(listing) = &self.mhwd {
            return Some(listing.current.as_str());
        }
        self.report.as_ref().map(|r| r.current_running_uname.as_str())
    }
}

fn request_refresh(state: &mut KernelsPageState, controller: &Arc<RwLock<AppController>>, force: bool) {
    if let Ok(guard) = controller.try_read() {
        state.loading = true;
        guard.refresh_kernels(force);
    }
}

/// Render the Kernel & Mesa tab
pub fn render_kernels(
    ui: &mut egui::Ui,
    state: &mut KernelsPageState,
    progress: Option<&OperationStatus>,
    controller: &Arc<RwLock<AppController>>,
) {
    if !state.has_data() && state.error.is_none() && !state.loading {
        request_refresh(state, controller, false);
    }
    if !state.mesa_requested {
        if let Ok(guard) = controller.try_read() {
            state.mesa_requested = true;
            guard.detect_mesa();
        }
    }
    let busy = controller.try_read().map(|c| c.is_busy()).unwrap_or(true);

    ui.horizontal(|ui| {
        ui.heading("Kernel & Mesa");
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.add_enabled(!state.loading, egui::Button::new("Refresh")).clicked() {
                request_refresh(state, controller, true);
            }
            if state.loading {
                ui.spinner();
            }
        });
    });
    ui.colored_label(
        COLOR_WARN,
        "Warning: changing the kernel or Mesa can leave the system unstable. Keep a known-good kernel installed.",
    );
    ui.separator();

    if let Some(status) = progress {
        progress_row(ui, Some(status.fraction), &status.message);
        ui.add_space(4.0);
    }

    let mut action = None;
    egui::ScrollArea::vertical().id_source("kernels_scroll").show(ui, |ui| {
        ui.horizontal(|ui| {
            ui.strong("Current kernel:");
            ui.label(state.current_kernel().unwrap_or("Detecting..."));
        });

        if let Some(err) = state.error.clone() {
            egui::Frame::group(ui.style()).show(ui, |ui| {
                ui.colored_label(COLOR_CRITICAL, format!("Error loading kernels: {}", err));
                if ui.button("Retry").clicked() {
                    state.error = None;
                    request_refresh(state, controller, true);
                }
            });
        }

        if let Some(listing) = &state.mhwd {
            action = action.take().or(mhwd_section(ui, listing, busy));
        } else if let Some(report) = &state.report {
            action = action.take().or(pacman_sections(ui, report, busy));
        } else if state.error.is_none() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Loading kernels...");
            });
        }

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            let can_rollback = !busy && state.kernel_history.len() >= 2;
            if ui
                .add_enabled(can_rollback, egui::Button::new("Roll back kernel"))
                .on_disabled_hover_text("Needs at least two kernel installs in the history")
                .clicked()
            {
                action = Some(KernelAction::Rollback);
            }
        });

        ui.add_space(12.0);
        action = action.take().or(mesa_section(ui, state, busy));
    });

    if action.is_some() {
        state.pending = action;
    }
    render_confirm_window(ui.ctx(), state, controller);
}

fn kernel_row(ui: &mut egui::Ui, kernel: &KernelPackage, busy: bool) -> Option<KernelAction> {
    let mut action = None;
    ui.horizontal(|ui| {
        ui.strong(&kernel.name);
        ui.label(&kernel.version);
        if kernel.is_running {
            status_badge(ui, "In use", COLOR_OK);
        } else if kernel.is_installed {
            status_badge(ui, "Installed", COLOR_ACCENT);
        }
        if let Some(repo) = &kernel.repository {
            ui.colored_label(COLOR_MUTED, repo);
        }
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if !kernel.is_installed {
                if ui.add_enabled(!busy, egui::Button::new("Install")).clicked() {
                    action = Some(KernelAction::Install(kernel.name.clone(), KernelBackend::Pacman));
                }
            } else if !kernel.is_running
                && ui.add_enabled(!busy, egui::Button::new("Remove")).clicked()
            {
                action = Some(KernelAction::Remove(kernel.name.clone(), KernelBackend::Pacman));
            }
        });
    });
    if !kernel.description.is_empty() {
        ui.colored_label(COLOR_MUTED, &kernel.description);
    }
    ui.separator();
    action
}

fn kernel_group(
    ui: &mut egui::Ui,
    title: &str,
    kernels: &[KernelPackage],
    open: bool,
    busy: bool,
) -> Option<KernelAction> {
    let mut action = None;
    egui::CollapsingHeader::new(format!("{} ({})", title, kernels.len()))
        .id_source(title)
        .default_open(open)
        .show(ui, |ui| {
            if kernels.is_empty() {
                ui.colored_label(COLOR_MUTED, "None found");
            }
            for kernel in kernels {
                if let Some(a) = kernel_row(ui, kernel, busy) {
                    action = Some(a);
                }
            }
        });
    action
}

fn pacman_sections(ui: &mut egui::Ui, report: &KernelsReport, busy: bool) -> Option<KernelAction> {
    section_header(ui, "Kernels");
    ui.colored_label(
        COLOR_MUTED,
        format!("Updated {}", report.timestamp.format("%H:%M:%S")),
    );
    let installed = kernel_group(ui, "Installed", &report.installed_packages, true, busy);
    let official = kernel_group(ui, "Official repositories", &report.official_available, true, busy);
    let aur = kernel_group(ui, "AUR", &report.aur_available, false, busy);
    installed.or(official).or(aur)
}

fn mhwd_status_color(status: KernelStatus) -> egui::Color32 {
    match status {
        KernelStatus::InUse => COLOR_OK,
        KernelStatus::Installed => COLOR_ACCENT,
        KernelStatus::Available => COLOR_MUTED,
    }
}

fn mhwd_section(ui: &mut egui::Ui, listing: &MhwdListing, busy: bool) -> Option<KernelAction> {
    section_header(ui, "Kernels (mhwd-kernel)");
    let mut action = None;
    if listing.kernels.is_empty() {
        ui.colored_label(COLOR_MUTED, "mhwd-kernel listed no kernels");
    }
    for kernel in &listing.kernels {
        ui.horizontal(|ui| {
            ui.strong(&kernel.name);
            ui.label(&kernel.version);
            status_badge(ui, kernel.status.label(), mhwd_status_color(kernel.status));
            if !kernel.repository.is_empty() {
                ui.colored_label(COLOR_MUTED, &kernel.repository);
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                match kernel.status {
                    KernelStatus::Available => {
                        if ui.add_enabled(!busy, egui::Button::new("Install")).clicked() {
                            action = Some(KernelAction::Install(kernel.name.clone(), KernelBackend::Mhwd));
                        }
                    }
                    KernelStatus::Installed => {
                        if ui.add_enabled(!busy, egui::Button::new("Remove")).clicked() {
                            action = Some(KernelAction::Remove(kernel.name.clone(), KernelBackend::Mhwd));
                        }
                    }
                    KernelStatus::InUse => {}
                }
            });
        });
        if !kernel.description.is_empty() || !kernel.build_date.is_empty() {
            let mut details = kernel.description.clone();
            if !kernel.build_date.is_empty() {
                if !details.is_empty() {
                    details.push_str(" | ");
                }
                details.push_str(&format!("Built {}", kernel.build_date));
            }
            ui.colored_label(COLOR_MUTED, details);
        }
        ui.separator();
    }
    action
}

fn mesa_section(ui: &mut egui::Ui, state: &mut KernelsPageState, busy: bool) -> Option<KernelAction> {
    section_header(ui, "Mesa");
    let mut action = None;
    ui.horizontal(|ui| {
        ui.strong("Current Mesa version:");
        match &state.mesa_version {
            Some(version) => ui.label(version),
            None => ui.spinner(),
        };
    });

    ui.horizontal(|ui| {
        ui.radio_value(&mut state.mesa_use_git, false, "Stable");
        ui.radio_value(&mut state.mesa_use_git, true, "Git (AUR)");
        ui.checkbox(&mut state.mesa_multilib, "Include 32-bit libraries (multilib)");
    });
    if state.mesa_use_git {
        ui.colored_label(COLOR_WARN, "mesa-git builds from source and may be unstable.");
    }

    ui.horizontal(|ui| {
        if ui.add_enabled(!busy, egui::Button::new("Update Mesa")).clicked() {
            action = Some(KernelAction::InstallMesa {
                use_git: state.mesa_use_git,
                use_multilib: state.mesa_multilib,
            });
        }
        let can_revert = !busy && state.mesa_history.len() >= 2;
        if ui
            .add_enabled(can_revert, egui::Button::new("Revert Mesa"))
            .on_disabled_hover_text("Needs at least two Mesa installs in the history")
            .clicked()
        {
            action = Some(KernelAction::RollbackMesa);
        }
    });
    action
}

fn render_confirm_window(
    ctx: &egui::Context,
    state: &mut KernelsPageState,
    controller: &Arc<RwLock<AppController>>,
) {
    let Some(pending) = state.pending.clone() else {
        return;
    };
    let mut decision = None;
    egui::Window::new(pending.title())
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label(pending.prompt(&state.kernel_history, &state.mesa_history));
            ui.colored_label(COLOR_ACCENT, "You will be asked for your password.");
            ui.horizontal(|ui| {
                if ui.button("Confirm").clicked() {
                    decision = Some(true);
                }
                if ui.button("Cancel").clicked() {
                    decision = Some(false);
                }
            });
        });

    match decision {
        Some(true) => {
            state.pending = None;
            let Ok(guard) = controller.try_read() else {
                return;
            };
            match pending {
                KernelAction::Install(name, backend) => guard.install_kernel(name, backend),
                KernelAction::Remove(name, backend) => guard.remove_kernel(name, backend),
                KernelAction::Rollback => guard.rollback_kernel(),
                KernelAction::InstallMesa { use_git, use_multilib } => guard.install_mesa(use_git, use_multilib),
                KernelAction::RollbackMesa => guard.rollback_mesa(),
            };
        }
        Some(false) => state.pending = None,
        None => {}
    }
}
