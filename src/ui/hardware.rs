/// Hardware Information View
///
/// System summary at the top, then every inxi category with its items as
/// collapsible key/value groups.

use crate::hardware::{
    category_display_name, format_size, item_title, key_display, value_to_display, HardwareSnapshot,
    SystemSummary,
};
use crate::ui::controller::AppController;
use crate::ui::widgets::{key_value_row, section_header, usage_bar, COLOR_CRITICAL, COLOR_MUTED};
use eframe::egui;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct HardwarePageState {
    pub snapshot: Option<HardwareSnapshot>,
    pub error: Option<String>,
    pub loading: bool,
    /// inxi category shown on the right
    pub selected_category: Option<String>,
}

fn request_refresh(state: &mut HardwarePageState, controller: &Arc<RwLock<AppController>>) {
    if let Ok(guard) = controller.try_read() {
        state.loading = true;
        guard.refresh_hardware();
    }
}

/// Render the Hardware Information tab
pub fn render_hardware(
    ui: &mut egui::Ui,
    state: &mut HardwarePageState,
    controller: &Arc<RwLock<AppController>>,
) {
    ui.horizontal(|ui| {
        ui.heading("Hardware Information");
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.add_enabled(!state.loading, egui::Button::new("Refresh")).clicked() {
                request_refresh(state, controller);
            }
            if state.loading {
                ui.spinner();
            }
        });
    });
    ui.separator();

    if let Some(err) = state.error.clone() {
        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.colored_label(COLOR_CRITICAL, "Error loading hardware information");
            ui.label(err);
            if ui.button("Retry").clicked() {
                state.error = None;
                request_refresh(state, controller);
            }
        });
        ui.add_space(8.0);
    }

    let Some(snapshot) = state.snapshot.as_ref() else {
        if state.loading || state.error.is_none() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Collecting hardware information, this may take a moment...");
            });
        }
        return;
    };

    render_summary(ui, &snapshot.summary);
    ui.add_space(8.0);

    if snapshot.report.is_empty() {
        ui.colored_label(COLOR_MUTED, "inxi reported no hardware categories.");
        return;
    }

    let selected = state
        .selected_category
        .clone()
        .filter(|name| snapshot.report.get(name).is_some())
        .or_else(|| snapshot.report.categories.first().map(|c| c.name.clone()));

    let mut clicked = None;
    ui.horizontal_top(|ui| {
        egui::ScrollArea::vertical()
            .id_source("hw_categories")
            .max_width(200.0)
            .show(ui, |ui| {
                ui.set_min_width(180.0);
                for category in &snapshot.report.categories {
                    let is_selected = selected.as_deref() == Some(category.name.as_str());
                    let label = category_display_name(&category.name);
                    if ui.selectable_label(is_selected, label).clicked() {
                        clicked = Some(category.name.clone());
                    }
                }
            });

        ui.separator();

        egui::ScrollArea::vertical()
            .id_source("hw_items")
            .show(ui, |ui| {
                let Some(name) = selected.as_deref() else {
                    return;
                };
                let Some(items) = snapshot.report.get(name) else {
                    return;
                };
                section_header(ui, &category_display_name(name));
                if items.is_empty() {
                    ui.colored_label(COLOR_MUTED, "No information available");
                }
                for (index, item) in items.iter().enumerate() {
                    egui::CollapsingHeader::new(item_title(item, name, index))
                        .id_source((name, index))
                        .default_open(items.len() <= 4)
                        .show(ui, |ui| {
                            egui::Grid::new((name, index, "grid"))
                                .num_columns(2)
                                .striped(true)
                                .show(ui, |ui| {
                                    for (key, value) in item {
                                        key_value_row(ui, &key_display(key), &value_to_display(value));
                                    }
                                });
                        });
                }
            });
    });

    if clicked.is_some() {
        state.selected_category = clicked;
    }
}

/// Summary grid: OS, kernel, install date, CPU, memory, GPU, disk
fn render_summary(ui: &mut egui::Ui, summary: &SystemSummary) {
    egui::Frame::group(ui.style()).show(ui, |ui| {
        section_header(ui, "System Summary");
        egui::Grid::new("hw_summary")
            .num_columns(2)
            .spacing([16.0, 6.0])
            .show(ui, |ui| {
                key_value_row(ui, "Operating System", &summary.os_name);
                key_value_row(ui, "Kernel", &summary.kernel);
                key_value_row(
                    ui,
                    "Installed",
                    summary.install_date.as_deref().unwrap_or("Unknown"),
                );
                key_value_row(ui, "Processor", &summary.cpu);

                ui.strong("Memory");
                match &summary.memory {
                    Some(memory) => usage_bar(ui, memory, 320.0),
                    None => {
                        ui.label("Unknown");
                    }
                }
                ui.end_row();

                key_value_row(ui, "Graphics", summary.gpu.as_deref().unwrap_or("Unknown"));

                ui.strong("Disk (/)");
                match &summary.storage {
                    Some(storage) => {
                        ui.vertical(|ui| {
                            usage_bar(ui, &storage.usage(), 320.0);
                            ui.label(format!(
                                "{}: {} total, {} free",
                                storage.device,
                                format_size(storage.total_bytes),
                                format_size(storage.free_bytes)
                            ));
                        });
                    }
                    None => {
                        ui.label("Unknown");
                    }
                }
                ui.end_row();
            });
    });
}
