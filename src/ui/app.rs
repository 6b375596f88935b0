/// Main App Orchestrator and UI State Management
///
/// This module provides the central application state and the eframe::App implementation
/// for the egui-based frontend. It manages tab routing, async event processing, and
/// delegates to the page modules for rendering.

use crate::system::health::HealthReport;
use crate::ui::controller::{AppController, AppEvent, Operation};
use crate::ui::drivers::DriversPageState;
use crate::ui::hardware::HardwarePageState;
use crate::ui::kernels::{KernelsPageState, MhwdListing};
use crate::ui::settings::SettingsUIState;
use eframe::egui;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const MAX_LOG_LINES: usize = 500;
const IDLE_REPAINT_INTERVAL: Duration = Duration::from_millis(500);

/// Tab identifiers for navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Hardware,
    KernelMesa,
    Drivers,
    Settings,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Hardware, Tab::KernelMesa, Tab::Drivers, Tab::Settings];

    pub fn label(&self) -> &'static str {
        match self {
            Tab::Hardware => "Hardware Information",
            Tab::KernelMesa => "Kernel & Mesa",
            Tab::Drivers => "Driver Installer",
            Tab::Settings => "Settings",
        }
    }
}

/// Latest progress report of the running (or last) operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationStatus {
    pub op: Operation,
    pub fraction: f32,
    pub message: String,
    pub finished: bool,
}

/// Transient UI state - state that doesn't persist across sessions
pub struct UIState {
    /// Dirty flag: set when data changes, cleared after render
    pub needs_repaint: bool,
    pub last_repaint_time: Instant,
    pub active_tab: Tab,

    /// Latest status line from background tasks
    pub status_line: String,
    /// Recent log lines, oldest first
    pub log_lines: VecDeque<String>,
    pub show_log: bool,

    pub error_message: Option<String>,
    pub success_message: Option<String>,
    pub info_message: Option<String>,

    pub operation: Option<OperationStatus>,
    pub health: Option<HealthReport>,

    pub hardware: HardwarePageState,
    pub drivers: DriversPageState,
    pub kernels: KernelsPageState,
    pub settings_ui_state: SettingsUIState,

    /// Cached theme index to avoid recalculating visuals
    pub cached_theme_idx: Option<usize>,
    pub cached_font_size: Option<f32>,
}

impl Default for UIState {
    fn default() -> Self {
        Self {
            needs_repaint: true,
            last_repaint_time: Instant::now(),
            active_tab: Tab::default(),
            status_line: String::new(),
            log_lines: VecDeque::with_capacity(MAX_LOG_LINES),
            show_log: false,
            error_message: None,
            success_message: None,
            info_message: None,
            operation: None,
            health: None,
            hardware: HardwarePageState::default(),
            drivers: DriversPageState::default(),
            kernels: KernelsPageState::default(),
            settings_ui_state: SettingsUIState::default(),
            cached_theme_idx: None,
            cached_font_size: None,
        }
    }
}

impl UIState {
    pub fn push_log(&mut self, line: String) {
        self.log_lines.push_back(line);
        while self.log_lines.len() > MAX_LOG_LINES {
            self.log_lines.pop_front();
        }
    }

    /// Progress of the current operation when `filter` accepts it.
    pub fn progress_for(&self, filter: impl Fn(&Operation) -> bool) -> Option<&OperationStatus> {
        self.operation.as_ref().filter(|status| filter(&status.op))
    }

    /// Apply one background event. Returns follow-up refreshes the caller
    /// should trigger on the controller.
    pub fn apply_event(&mut self, event: AppEvent) -> Vec<Refresh> {
        let mut follow_up = Vec::new();
        match event {
            AppEvent::Status(status) => {
                self.status_line = status;
            }
            AppEvent::Log(line) => {
                self.push_log(line);
            }
            AppEvent::Progress { op, fraction, message } => {
                self.status_line = message.clone();
                self.operation = Some(OperationStatus {
                    op,
                    fraction,
                    message,
                    finished: false,
                });
            }
            AppEvent::HardwareLoaded(snapshot) => {
                self.hardware.loading = false;
                self.hardware.error = None;
                self.hardware.snapshot = Some(*snapshot);
                self.status_line = "Hardware information loaded".to_string();
            }
            AppEvent::HardwareFailed(msg) => {
                self.hardware.loading = false;
                self.hardware.error = Some(msg);
                self.status_line = "Hardware detection failed".to_string();
            }
            AppEvent::DriversLoaded(data) => {
                self.status_line = format!("{} drivers available", data.driver_count());
                self.drivers.loading = false;
                self.drivers.error = None;
                self.drivers.data = Some(data);
            }
            AppEvent::DriversFailed(msg) => {
                self.drivers.loading = false;
                self.drivers.error = Some(msg);
            }
            AppEvent::KernelsLoaded(report) => {
                self.kernels.loading = false;
                self.kernels.error = report.error.clone();
                self.kernels.mhwd = None;
                self.kernels.report = Some(report);
                self.status_line = "Kernel list updated".to_string();
                follow_up.push(Refresh::History);
            }
            AppEvent::MhwdKernelsLoaded { current, kernels } => {
                self.kernels.loading = false;
                self.kernels.error = None;
                self.kernels.report = None;
                self.kernels.mhwd = Some(MhwdListing { current, kernels });
                self.status_line = "Kernel list updated".to_string();
                follow_up.push(Refresh::History);
            }
            AppEvent::MesaDetected(version) => {
                self.kernels.mesa_version = Some(version);
            }
            AppEvent::OperationFinished { op, success, message } => {
                self.operation = Some(OperationStatus {
                    op,
                    fraction: 1.0,
                    message: message.clone(),
                    finished: true,
                });
                self.status_line = message.clone();
                if success {
                    self.success_message = Some(message);
                } else {
                    self.error_message = Some(format!("{} failed: {}", op.label(), message));
                }
                if op.affects_kernels() {
                    self.kernels.loading = true;
                    follow_up.push(Refresh::Kernels);
                }
                if op.affects_mesa() {
                    follow_up.push(Refresh::Mesa);
                    follow_up.push(Refresh::History);
                }
                if op.affects_drivers() {
                    self.drivers.loading = true;
                    follow_up.push(Refresh::Drivers);
                }
                if op == Operation::FixDependencies {
                    follow_up.push(Refresh::Health);
                }
            }
            AppEvent::HealthChecked(report) => {
                if report.status.needs_fix() {
                    self.info_message = Some(report.message.clone());
                }
                self.health = Some(report);
            }
        }
        self.needs_repaint = true;
        follow_up
    }
}

/// Controller calls requested by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Kernels,
    Mesa,
    Drivers,
    Health,
    History,
}

/// Main application UI
pub struct AppUI {
    pub controller: Arc<RwLock<AppController>>,
    pub ui_state: UIState,
    /// Channel receiver for background events
    pub event_rx: Option<tokio::sync::mpsc::Receiver<AppEvent>>,
}

impl AppUI {
    pub fn new(
        controller: Arc<RwLock<AppController>>,
        event_rx: Option<tokio::sync::mpsc::Receiver<AppEvent>>,
    ) -> Self {
        Self {
            controller,
            ui_state: UIState::default(),
            event_rx,
        }
    }

    /// Process all pending events from the channel
    fn process_events(&mut self) {
        let mut follow_ups = Vec::new();
        if let Some(ref mut rx) = self.event_rx {
            while let Ok(event) = rx.try_recv() {
                follow_ups.extend(self.ui_state.apply_event(event));
            }
        }
        if follow_ups.is_empty() {
            return;
        }
        follow_ups.dedup();

        let Ok(controller) = self.controller.try_read() else {
            return;
        };
        for refresh in follow_ups {
            match refresh {
                Refresh::Kernels => controller.refresh_kernels(true),
                Refresh::Mesa => controller.detect_mesa(),
                Refresh::Drivers => controller.refresh_drivers(),
                Refresh::Health => controller.check_health(),
                Refresh::History => {
                    let (kernels, mesa) = controller.history_names();
                    self.ui_state.kernels.kernel_history = kernels;
                    self.ui_state.kernels.mesa_history = mesa;
                }
            }
        }
    }

    /// Render the top navigation bar (tab selector)
    fn render_top_nav(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_nav").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Driver Manager");
                ui.separator();
                for tab in Tab::ALL {
                    let selected = self.ui_state.active_tab == tab;
                    if ui.selectable_label(selected, tab.label()).clicked() {
                        self.ui_state.active_tab = tab;
                    }
                }
            });
        });
    }

    /// Render transient messages (errors, success, info)
    fn render_messages(&mut self, ctx: &egui::Context) {
        if let Some(msg) = self.ui_state.error_message.clone() {
            egui::TopBottomPanel::top("error_panel").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.colored_label(super::widgets::COLOR_CRITICAL, format!("Error: {}", msg));
                    if ui.button("Dismiss").clicked() {
                        self.ui_state.error_message = None;
                    }
                });
            });
        }

        if let Some(msg) = self.ui_state.success_message.clone() {
            egui::TopBottomPanel::top("success_panel").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.colored_label(super::widgets::COLOR_OK, msg);
                    if ui.button("Dismiss").clicked() {
                        self.ui_state.success_message = None;
                    }
                });
            });
        }

        if let Some(msg) = self.ui_state.info_message.clone() {
            egui::TopBottomPanel::top("info_panel").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.colored_label(super::widgets::COLOR_ACCENT, msg);
                    if ui.button("Details").clicked() {
                        self.ui_state.active_tab = Tab::Settings;
                    }
                    if ui.button("Dismiss").clicked() {
                        self.ui_state.info_message = None;
                    }
                });
            });
        }
    }

    /// Status line plus a collapsible view of recent log lines
    fn render_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let busy = self
                    .controller
                    .try_read()
                    .map(|c| c.is_busy())
                    .unwrap_or(false);
                if busy {
                    ui.spinner();
                }
                ui.label(self.ui_state.status_line.as_str());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let label = if self.ui_state.show_log { "Hide log" } else { "Show log" };
                    if ui.small_button(label).clicked() {
                        self.ui_state.show_log = !self.ui_state.show_log;
                    }
                });
            });
            if self.ui_state.show_log {
                egui::ScrollArea::vertical()
                    .max_height(160.0)
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for line in &self.ui_state.log_lines {
                            ui.monospace(line.as_str());
                        }
                    });
            }
        });
    }

    /// Render the central content based on active tab
    fn render_content(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let controller = self.controller.clone();
            let state = &mut self.ui_state;
            match state.active_tab {
                Tab::Hardware => {
                    super::hardware::render_hardware(ui, &mut state.hardware, &controller);
                }
                Tab::KernelMesa => {
                    let progress = state
                        .progress_for(|op| op.affects_kernels() || op.affects_mesa())
                        .cloned();
                    super::kernels::render_kernels(ui, &mut state.kernels, progress.as_ref(), &controller);
                }
                Tab::Drivers => {
                    let progress = state.progress_for(Operation::affects_drivers).cloned();
                    super::drivers::render_drivers(ui, &mut state.drivers, progress.as_ref(), &controller);
                }
                Tab::Settings => {
                    super::settings::render_settings(
                        ui,
                        &mut state.settings_ui_state,
                        state.health.as_ref(),
                        &controller,
                    );
                }
            }
        });
    }

    /// Apply theme and scale from controller state
    ///
    /// Only re-applies when the theme index or font size actually changed.
    fn apply_theme_from_state(&mut self, ctx: &egui::Context) {
        let Ok(guard) = self.controller.try_read() else {
            return;
        };
        let Ok(state) = guard.get_state() else {
            return;
        };

        if self.ui_state.cached_theme_idx != Some(state.theme_idx) {
            let visuals = match state.theme_idx {
                1 => egui::Visuals::light(),
                _ => Self::dark_visuals(),
            };
            ctx.set_visuals(visuals);
            self.ui_state.cached_theme_idx = Some(state.theme_idx);
        }

        if state.ui_font_size > 0.0 && self.ui_state.cached_font_size != Some(state.ui_font_size) {
            // Baseline: 14pt maps to egui's default scale
            ctx.set_pixels_per_point(state.ui_font_size / 14.0);
            self.ui_state.cached_font_size = Some(state.ui_font_size);
        }
    }

    /// Dark visuals with the app accent colors
    fn dark_visuals() -> egui::Visuals {
        let mut visuals = egui::Visuals::dark();
        let dark_bg = egui::Color32::from_rgb(0x1c, 0x1f, 0x24);
        let accent = super::widgets::COLOR_ACCENT;

        visuals.panel_fill = dark_bg;
        visuals.window_fill = dark_bg;
        visuals.selection.bg_fill = egui::Color32::from_rgb(0x2d, 0x4f, 0x6c);
        visuals.selection.stroke.color = accent;
        visuals.hyperlink_color = accent;
        visuals.widgets.hovered.bg_fill = egui::Color32::from_rgb(0x2c, 0x2f, 0x34);
        visuals
    }
}

impl eframe::App for AppUI {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.apply_theme_from_state(ctx);

        // Process all pending async events (sets needs_repaint flag on data changes)
        self.process_events();

        // Adaptive repainting: immediate on data change, slow fallback otherwise
        let busy = self
            .controller
            .try_read()
            .map(|c| c.is_busy())
            .unwrap_or(false);
        if self.ui_state.needs_repaint {
            ctx.request_repaint();
            self.ui_state.needs_repaint = false;
            self.ui_state.last_repaint_time = Instant::now();
        } else if busy || self.ui_state.last_repaint_time.elapsed() > IDLE_REPAINT_INTERVAL {
            ctx.request_repaint_after(IDLE_REPAINT_INTERVAL);
            self.ui_state.last_repaint_time = Instant::now();
        }

        self.render_top_nav(ctx);
        self.render_messages(ctx);
        self.render_status_bar(ctx);
        self.render_content(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KernelsReport;

    #[test]
    fn test_tab_labels() {
        let labels: Vec<&str> = Tab::ALL.iter().map(Tab::label).collect();
        assert_eq!(
            labels,
            vec!["Hardware Information", "Kernel & Mesa", "Driver Installer", "Settings"]
        );
        assert_eq!(Tab::default(), Tab::Hardware);
    }

    #[test]
    fn test_log_is_capped() {
        let mut state = UIState::default();
        for i in 0..(MAX_LOG_LINES + 10) {
            state.apply_event(AppEvent::Log(format!("line {}", i)));
        }
        assert_eq!(state.log_lines.len(), MAX_LOG_LINES);
        assert_eq!(state.log_lines.front().map(String::as_str), Some("line 10"));
    }

    #[test]
    fn test_failed_kernel_install_sets_error_and_refreshes() {
        let mut state = UIState::default();
        let follow_up = state.apply_event(AppEvent::OperationFinished {
            op: Operation::InstallKernel,
            success: false,
            message: "Package transaction failed".to_string(),
        });
        assert_eq!(follow_up, vec![Refresh::Kernels]);
        assert!(state.success_message.is_none());
        assert_eq!(
            state.error_message.as_deref(),
            Some("Install kernel failed: Package transaction failed")
        );
        assert!(state.operation.as_ref().is_some_and(|s| s.finished));
    }

    #[test]
    fn test_kernel_report_error_surfaces_on_page() {
        let mut state = UIState::default();
        state.kernels.loading = true;
        let report = KernelsReport::empty_with_error("6.9.1-arch1-1".to_string(), "pacman failed".to_string());
        let follow_up = state.apply_event(AppEvent::KernelsLoaded(report));
        assert_eq!(follow_up, vec![Refresh::History]);
        assert!(!state.kernels.loading);
        assert_eq!(state.kernels.error.as_deref(), Some("pacman failed"));
    }

    #[test]
    fn test_progress_filter_by_page() {
        let mut state = UIState::default();
        state.apply_event(AppEvent::Progress {
            op: Operation::InstallDriver,
            fraction: 0.2,
            message: "Installing...".to_string(),
        });
        assert!(state.progress_for(Operation::affects_drivers).is_some());
        assert!(state.progress_for(Operation::affects_kernels).is_none());
    }
}
