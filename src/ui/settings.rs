use crate::config::AppState;
use crate::system::health::{HealthReport, HealthStatus};
use crate::ui::controller::AppController;
use crate::ui::widgets::{section_header, status_badge, COLOR_CRITICAL, COLOR_MUTED, COLOR_OK, COLOR_WARN};
/// Settings View
///
/// Edits `AppState` in place and persists every change through the
/// controller. Also shows the dependency health check.
use eframe::egui;
use std::sync::Arc;
use tokio::sync::RwLock;

const AUR_HELPERS: [&str; 3] = ["auto", "yay", "paru"];
const THEMES: [&str; 2] = ["Dark", "Light"];

/// Persistent settings state for rendering
#[derive(Clone, Default)]
pub struct SettingsUIState {
    /// Working copy of the settings, loaded on first render
    pub draft: Option<AppState>,
    pub drivers_script: String,
    pub detect_script: String,
    pub save_error: Option<String>,
}

impl SettingsUIState {
    fn load(&mut self, state: AppState) {
        self.drivers_script = state.drivers_script_path.clone().unwrap_or_default();
        self.detect_script = state.hardware_detect_script_path.clone().unwrap_or_default();
        self.draft = Some(state);
    }
}

/// Empty text clears an override.
pub fn optional_path(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn health_color(status: HealthStatus) -> egui::Color32 {
    match status {
        HealthStatus::Excellent => COLOR_OK,
        HealthStatus::Good => COLOR_WARN,
        HealthStatus::Poor => COLOR_CRITICAL,
    }
}

/// Render the Settings tab
pub fn render_settings(
    ui: &mut egui::Ui,
    app_ui_state: &mut SettingsUIState,
    health: Option<&HealthReport>,
    controller: &Arc<RwLock<AppController>>,
) {
    ui.heading("Settings");
    ui.separator();

    // Load current settings from controller on first frame only
    if app_ui_state.draft.is_none() {
        if let Ok(guard) = controller.try_read() {
            if let Ok(state) = guard.get_state() {
                app_ui_state.load(state);
            }
        }
    }

    let mut changed = false;
    let mut reset = false;

    egui::ScrollArea::vertical().show(ui, |ui| {
        if let Some(draft) = app_ui_state.draft.as_mut() {
            ui.group(|ui| {
                section_header(ui, "Appearance");
                egui::Grid::new("settings_appearance").num_columns(2).show(ui, |ui| {
                    ui.label("Theme:");
                    egui::ComboBox::from_id_source("theme_combo")
                        .selected_text(*THEMES.get(draft.theme_idx).unwrap_or(&THEMES[0]))
                        .show_ui(ui, |ui| {
                            for (idx, name) in THEMES.iter().enumerate() {
                                changed |= ui.selectable_value(&mut draft.theme_idx, idx, *name).changed();
                            }
                        });
                    ui.end_row();

                    ui.label("Font size:");
                    changed |= ui
                        .add(egui::Slider::new(&mut draft.ui_font_size, 10.0..=22.0).step_by(1.0).suffix(" pt"))
                        .changed();
                    ui.end_row();
                });
            });

            ui.add_space(8.0);
            ui.group(|ui| {
                section_header(ui, "Packages & Kernels");
                egui::Grid::new("settings_packages").num_columns(2).show(ui, |ui| {
                    ui.label("AUR helper:");
                    egui::ComboBox::from_id_source("aur_helper_combo")
                        .selected_text(draft.preferred_aur_helper.clone())
                        .show_ui(ui, |ui| {
                            for helper in AUR_HELPERS {
                                changed |= ui
                                    .selectable_value(&mut draft.preferred_aur_helper, helper.to_string(), helper)
                                    .changed();
                            }
                        });
                    ui.end_row();

                    ui.label("Kernel list cache:");
                    changed |= ui
                        .add(
                            egui::DragValue::new(&mut draft.kernel_cache_ttl_secs)
                                .clamp_range(0..=3600)
                                .suffix(" s"),
                        )
                        .changed();
                    ui.end_row();
                });
                changed |= ui
                    .checkbox(&mut draft.prefer_mhwd_kernel, "Use mhwd-kernel when available")
                    .changed();
            });

            ui.add_space(8.0);
            ui.group(|ui| {
                section_header(ui, "Drivers");
                changed |= ui
                    .checkbox(
                        &mut draft.show_incompatible_drivers,
                        "Show drivers that do not match the detected hardware",
                    )
                    .changed();
                egui::Grid::new("settings_drivers").num_columns(2).show(ui, |ui| {
                    ui.label("Drivers data directory:");
                    changed |= ui.text_edit_singleline(&mut draft.drivers_data_dir).lost_focus();
                    ui.end_row();

                    ui.label("Drivers script:");
                    if ui
                        .add(egui::TextEdit::singleline(&mut app_ui_state.drivers_script).hint_text("bundled"))
                        .lost_focus()
                    {
                        draft.drivers_script_path = optional_path(&app_ui_state.drivers_script);
                        changed = true;
                    }
                    ui.end_row();

                    ui.label("Hardware detection script:");
                    if ui
                        .add(egui::TextEdit::singleline(&mut app_ui_state.detect_script).hint_text("bundled"))
                        .lost_focus()
                    {
                        draft.hardware_detect_script_path = optional_path(&app_ui_state.detect_script);
                        changed = true;
                    }
                    ui.end_row();
                });
            });

            ui.add_space(8.0);
            ui.group(|ui| {
                section_header(ui, "Debug");
                changed |= ui
                    .checkbox(&mut draft.debug_logging, "Debug logging (applies on next start)")
                    .changed();
                if let Ok(guard) = controller.try_read() {
                    ui.colored_label(COLOR_MUTED, format!("Settings file: {}", guard.settings_path().display()));
                    if let Some(collector) = &guard.log_collector {
                        ui.colored_label(
                            COLOR_MUTED,
                            format!("Session log: {}", collector.session_log_path().display()),
                        );
                    }
                }
            });

            ui.add_space(8.0);
            if ui.button("Reset to Defaults").clicked() {
                reset = true;
            }
        }

        ui.add_space(8.0);
        render_health(ui, health, controller);
    });

    if let Some(err) = &app_ui_state.save_error {
        ui.colored_label(COLOR_CRITICAL, err);
    }

    let Ok(guard) = controller.try_read() else {
        return;
    };
    if reset {
        app_ui_state.save_error = guard.reset_to_defaults().err();
        app_ui_state.draft = None;
    } else if changed {
        if let Some(draft) = app_ui_state.draft.clone() {
            app_ui_state.save_error = guard.update_state(move |state| *state = draft).err();
        }
    }
}

fn render_health(ui: &mut egui::Ui, health: Option<&HealthReport>, controller: &Arc<RwLock<AppController>>) {
    ui.group(|ui| {
        section_header(ui, "System Health");
        let Some(report) = health else {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Checking required tools...");
            });
            return;
        };
        ui.horizontal(|ui| {
            status_badge(ui, report.status.as_str(), health_color(report.status));
            ui.label(&report.message);
        });
        ui.label(format!(
            "AUR helper: {}",
            report.aur_helper.as_deref().unwrap_or("none found")
        ));

        let fix = report.fix_packages();
        let busy = controller.try_read().map(|c| c.is_busy()).unwrap_or(true);
        ui.horizontal(|ui| {
            if ui.button("Check again").clicked() {
                if let Ok(guard) = controller.try_read() {
                    guard.check_health();
                }
            }
            if !fix.is_empty()
                && ui
                    .add_enabled(!busy, egui::Button::new(format!("Install {}", fix.join(", "))))
                    .clicked()
            {
                if let Ok(guard) = controller.try_read() {
                    guard.fix_dependencies(fix.clone());
                }
            }
        });
    });
}
