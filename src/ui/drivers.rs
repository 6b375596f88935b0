/// Driver Installer View
///
/// Category sidebar on the left ("Detected" first when the detection script
/// found devices), a searchable driver table on the right, and confirmation
/// and info dialogs for install/remove.

use crate::drivers::catalog::{self, CatalogGroup};
use crate::drivers::installer::DriverAction;
use crate::models::CatalogDriver;
use crate::ui::app::OperationStatus;
use crate::ui::controller::{AppController, DriversData};
use crate::ui::widgets::{progress_row, status_badge, COLOR_ACCENT, COLOR_CRITICAL, COLOR_MUTED, COLOR_OK};
use eframe::egui;
use egui_extras::{Column, TableBuilder};
use std::sync::Arc;
use tokio::sync::RwLock;

pub const DETECTED_CATEGORY: &str = "Detected";

#[derive(Default)]
pub struct DriversPageState {
    pub data: Option<DriversData>,
    pub error: Option<String>,
    pub loading: bool,
    pub search: String,
    pub selected_category: Option<String>,
    /// Driver shown in the info window
    pub info_driver: Option<CatalogDriver>,
    /// Install/remove waiting for confirmation
    pub pending: Option<(DriverAction, CatalogDriver)>,
}

/// Sidebar label for a catalog group.
pub fn group_label(group: &CatalogGroup) -> String {
    group
        .drivers
        .iter()
        .map(|d| d.category_label.trim())
        .find(|label| !label.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| crate::drivers::category_label(&group.category))
}

/// Sidebar entries as `(key, label, count)`.
pub fn sidebar_entries(data: &DriversData) -> Vec<(String, String, usize)> {
    let mut entries = Vec::new();
    if !data.detected.is_empty() {
        let count = data.detected.iter().map(|g| g.drivers.len()).sum();
        entries.push((DETECTED_CATEGORY.to_string(), DETECTED_CATEGORY.to_string(), count));
    }
    for group in &data.groups {
        entries.push((group.category.clone(), group_label(group), group.drivers.len()));
    }
    entries
}

/// Rows to show for the current search text or selected category.
pub fn visible_drivers(data: &DriversData, search: &str, category: Option<&str>) -> Vec<CatalogDriver> {
    let detected: Vec<CatalogDriver> = data
        .detected
        .iter()
        .flat_map(|g| g.drivers.iter().map(CatalogDriver::from))
        .collect();

    if !search.trim().is_empty() {
        let mut rows = catalog::search(detected.iter(), search);
        for driver in catalog::search_groups(&data.groups, search) {
            if !rows.iter().any(|r| r.package == driver.package) {
                rows.push(driver);
            }
        }
        return rows;
    }

    match category {
        Some(DETECTED_CATEGORY) => detected,
        Some(name) => data
            .groups
            .iter()
            .find(|g| g.category == name)
            .map(|g| g.drivers.clone())
            .unwrap_or_default(),
        None => Vec::new(),
    }
}

fn request_refresh(state: &mut DriversPageState, controller: &Arc<RwLock<AppController>>) {
    if let Ok(guard) = controller.try_read() {
        state.loading = true;
        guard.refresh_drivers();
    }
}

enum RowAction {
    Info(CatalogDriver),
    Confirm(DriverAction, CatalogDriver),
}

/// Render the Driver Installer tab
pub fn render_drivers(
    ui: &mut egui::Ui,
    state: &mut DriversPageState,
    progress: Option<&OperationStatus>,
    controller: &Arc<RwLock<AppController>>,
) {
    if state.data.is_none() && state.error.is_none() && !state.loading {
        request_refresh(state, controller);
    }
    let busy = controller.try_read().map(|c| c.is_busy()).unwrap_or(true);

    ui.horizontal(|ui| {
        ui.heading("Driver Installer");
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.add_enabled(!state.loading, egui::Button::new("Refresh")).clicked() {
                request_refresh(state, controller);
            }
            ui.add(
                egui::TextEdit::singleline(&mut state.search)
                    .hint_text("Search drivers...")
                    .desired_width(220.0),
            );
        });
    });
    ui.separator();

    if let Some(status) = progress {
        progress_row(ui, Some(status.fraction), &status.message);
        ui.add_space(4.0);
    }

    if let Some(err) = state.error.clone() {
        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.colored_label(COLOR_CRITICAL, "Error loading drivers");
            ui.label(err);
            if ui.button("Retry").clicked() {
                state.error = None;
                request_refresh(state, controller);
            }
        });
        return;
    }

    let Some(data) = state.data.as_ref() else {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Loading drivers...");
        });
        return;
    };

    if data.is_empty() {
        ui.add_space(24.0);
        ui.vertical_centered(|ui| {
            ui.label(egui::RichText::new("No drivers found").heading());
            ui.colored_label(
                COLOR_MUTED,
                "The driver scripts returned nothing and no built-in source matched this hardware.",
            );
        });
        return;
    }

    let entries = sidebar_entries(data);
    let selected = state
        .selected_category
        .clone()
        .filter(|key| entries.iter().any(|(k, _, _)| k == key))
        .or_else(|| entries.first().map(|(k, _, _)| k.clone()));
    let rows = visible_drivers(data, &state.search, selected.as_deref());
    let searching = !state.search.trim().is_empty();

    let mut clicked_category = None;
    let mut action = None;

    ui.horizontal_top(|ui| {
        egui::ScrollArea::vertical()
            .id_source("driver_categories")
            .max_width(200.0)
            .show(ui, |ui| {
                ui.set_min_width(180.0);
                for (key, label, count) in &entries {
                    let is_selected = !searching && selected.as_deref() == Some(key.as_str());
                    if ui
                        .selectable_label(is_selected, format!("{} ({})", label, count))
                        .clicked()
                    {
                        clicked_category = Some(key.clone());
                    }
                }
            });

        ui.separator();

        ui.vertical(|ui| {
            if searching {
                ui.label(format!("{} results for \"{}\"", rows.len(), state.search.trim()));
            }
            if rows.is_empty() {
                ui.colored_label(COLOR_MUTED, "No drivers match.");
                return;
            }
            action = driver_table(ui, &rows, busy);
        });
    });

    if let Some(key) = clicked_category {
        state.search.clear();
        state.selected_category = Some(key);
    }
    match action {
        Some(RowAction::Info(driver)) => state.info_driver = Some(driver),
        Some(RowAction::Confirm(act, driver)) => state.pending = Some((act, driver)),
        None => {}
    }

    render_info_window(ui.ctx(), state);
    render_confirm_window(ui.ctx(), state, controller);
}

fn driver_table(ui: &mut egui::Ui, rows: &[CatalogDriver], busy: bool) -> Option<RowAction> {
    let mut action = None;
    TableBuilder::new(ui)
        .striped(true)
        .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
        .column(Column::initial(180.0).at_least(120.0).resizable(true))
        .column(Column::remainder().at_least(200.0).clip(true))
        .column(Column::exact(90.0))
        .column(Column::exact(150.0))
        .header(22.0, |mut header| {
            header.col(|ui| {
                ui.strong("Driver");
            });
            header.col(|ui| {
                ui.strong("Description");
            });
            header.col(|ui| {
                ui.strong("Status");
            });
            header.col(|ui| {
                ui.strong("Actions");
            });
        })
        .body(|mut body| {
            for driver in rows {
                body.row(30.0, |mut row| {
                    row.col(|ui| {
                        ui.vertical(|ui| {
                            ui.label(&driver.name);
                            ui.small(&driver.package);
                        });
                    });
                    row.col(|ui| {
                        let first_line = driver.description.lines().next().unwrap_or_default();
                        ui.label(first_line).on_hover_text(&driver.description);
                    });
                    row.col(|ui| {
                        if driver.installed {
                            status_badge(ui, "Installed", COLOR_OK);
                        } else {
                            status_badge(ui, "Available", COLOR_MUTED);
                        }
                    });
                    row.col(|ui| {
                        if ui.small_button("Info").clicked() {
                            action = Some(RowAction::Info(driver.clone()));
                        }
                        let (verb, act) = if driver.installed {
                            ("Remove", DriverAction::Remove)
                        } else {
                            ("Install", DriverAction::Install)
                        };
                        if ui.add_enabled(!busy, egui::Button::new(verb).small()).clicked() {
                            action = Some(RowAction::Confirm(act, driver.clone()));
                        }
                    });
                });
            }
        });
    action
}

fn render_info_window(ctx: &egui::Context, state: &mut DriversPageState) {
    let Some(driver) = state.info_driver.clone() else {
        return;
    };
    let mut open = true;
    egui::Window::new("Driver Information")
        .collapsible(false)
        .resizable(true)
        .default_width(420.0)
        .open(&mut open)
        .show(ctx, |ui| {
            egui::Grid::new("driver_info").num_columns(2).show(ui, |ui| {
                ui.strong("Name");
                ui.label(&driver.name);
                ui.end_row();
                ui.strong("Package");
                ui.label(&driver.package);
                ui.end_row();
                ui.strong("Category");
                let label = if driver.category_label.is_empty() {
                    crate::drivers::category_label(&driver.category)
                } else {
                    driver.category_label.clone()
                };
                ui.label(label);
                ui.end_row();
                if !driver.driver.is_empty() {
                    ui.strong("Kernel module");
                    ui.label(&driver.driver);
                    ui.end_row();
                }
                ui.strong("Source");
                ui.label(if driver.source.is_empty() { "script" } else { driver.source.as_str() });
                ui.end_row();
                ui.strong("Status");
                ui.label(if driver.installed { "Installed" } else { "Not installed" });
                ui.end_row();
            });
            ui.separator();
            egui::ScrollArea::vertical().max_height(240.0).show(ui, |ui| {
                ui.label(&driver.description);
            });
        });
    if !open {
        state.info_driver = None;
    }
}

fn render_confirm_window(
    ctx: &egui::Context,
    state: &mut DriversPageState,
    controller: &Arc<RwLock<AppController>>,
) {
    let Some((action, driver)) = state.pending.clone() else {
        return;
    };
    let mut decision = None;
    egui::Window::new(format!("{} driver", action.verb()))
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label(format!(
                "{} {} ({})?",
                action.verb(),
                driver.name,
                driver.package
            ));
            if action == DriverAction::Remove {
                ui.colored_label(COLOR_CRITICAL, "Removing a driver in use can break hardware support.");
            }
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
            if let Ok(guard) = controller.try_read() {
                match action {
                    DriverAction::Install => guard.install_driver(driver),
                    DriverAction::Remove => guard.remove_driver(driver),
                };
            }
        }
        Some(false) => state.pending = None,
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::catalog::DeviceGroup;
    use crate::models::DetectedDriver;

    fn driver(name: &str, category: &str, label: &str) -> CatalogDriver {
        CatalogDriver {
            name: name.to_string(),
            package: name.to_string(),
            category: category.to_string(),
            category_label: label.to_string(),
            description: format!("{} driver", name),
            ..Default::default()
        }
    }

    fn sample() -> DriversData {
        DriversData {
            groups: vec![
                CatalogGroup {
                    category: "gpu".to_string(),
                    drivers: vec![driver("nvidia-dkms", "gpu", "Video Card")],
                },
                CatalogGroup {
                    category: "Printer".to_string(),
                    drivers: vec![driver("cups", "Printer", ""), driver("hplip", "Printer", "")],
                },
            ],
            detected: vec![DeviceGroup {
                device: "10de:1c82".to_string(),
                drivers: vec![DetectedDriver {
                    device: Some("10de:1c82".to_string()),
                    name: "Nvidia".to_string(),
                    package: "nvidia-dkms".to_string(),
                    description: "Proprietary driver".to_string(),
                    ..Default::default()
                }],
            }],
        }
    }

    #[test]
    fn test_sidebar_puts_detected_first() {
        let entries = sidebar_entries(&sample());
        let labels: Vec<&str> = entries.iter().map(|(_, label, _)| label.as_str()).collect();
        assert_eq!(labels, vec!["Detected", "Video Card", "Printer"]);
        assert_eq!(entries[2].2, 2);
    }

    #[test]
    fn test_visible_drivers_by_category() {
        let data = sample();
        let rows = visible_drivers(&data, "", Some("Printer"));
        assert_eq!(rows.len(), 2);
        let detected = visible_drivers(&data, "", Some(DETECTED_CATEGORY));
        assert_eq!(detected[0].package, "nvidia-dkms");
        assert!(visible_drivers(&data, "", Some("missing")).is_empty());
    }

    #[test]
    fn test_search_merges_detected_and_catalog_without_duplicates() {
        let rows = visible_drivers(&sample(), "NVIDIA", Some("Printer"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].package, "nvidia-dkms");
    }
}
