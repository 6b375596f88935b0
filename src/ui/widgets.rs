/// Custom egui Widgets
///
/// Small building blocks shared by the pages:
/// - usage_bar: Filled bar colored by usage level (memory, disk)
/// - status_badge: Rounded label for installed/available/in-use states
/// - progress_row: Progress bar with a status line for running operations
/// - key_value_row: Two-column label pair used by the hardware page

use crate::hardware::{format_size, UsageLevel, UsageSummary};
use eframe::egui;
use egui::{Color32, RichText, Rounding, Stroke, Vec2};

pub const COLOR_OK: Color32 = Color32::from_rgb(0x98, 0xbe, 0x65);
pub const COLOR_WARN: Color32 = Color32::from_rgb(0xda, 0x85, 0x48);
pub const COLOR_CRITICAL: Color32 = Color32::from_rgb(0xff, 0x6c, 0x6b);
pub const COLOR_ACCENT: Color32 = Color32::from_rgb(0x51, 0xaf, 0xef);
pub const COLOR_MUTED: Color32 = Color32::from_gray(140);

/// Fill color for a usage level.
pub fn usage_color(level: UsageLevel) -> Color32 {
    match level {
        UsageLevel::Unknown => COLOR_MUTED,
        UsageLevel::Low => COLOR_OK,
        UsageLevel::Medium => COLOR_WARN,
        UsageLevel::High => COLOR_CRITICAL,
    }
}

/// Draws a horizontal usage bar with "used / total (N%)" text
///
/// # Arguments
/// * `ui` - egui Ui context
/// * `usage` - Used and total bytes
/// * `width` - Bar width in points
pub fn usage_bar(ui: &mut egui::Ui, usage: &UsageSummary, width: f32) {
    let fraction = usage.fraction();
    let color = usage_color(usage.level());
    let (rect, _response) = ui.allocate_exact_size(Vec2::new(width, 18.0), egui::Sense::hover());
    let painter = ui.painter_at(rect);

    painter.rect_filled(rect, Rounding::same(4.0), Color32::from_gray(45));
    let mut filled = rect;
    filled.set_width(rect.width() * fraction);
    painter.rect_filled(filled, Rounding::same(4.0), color);
    painter.rect_stroke(rect, Rounding::same(4.0), Stroke::new(1.0, Color32::from_gray(90)));

    painter.text(
        rect.center(),
        egui::Align2::CENTER_CENTER,
        format!(
            "{} / {} ({:.0}%)",
            format_size(usage.used_bytes),
            format_size(usage.total_bytes),
            usage.percent()
        ),
        egui::FontId::proportional(11.0),
        Color32::WHITE,
    );
}

/// Small rounded badge with colored text
pub fn status_badge(ui: &mut egui::Ui, text: &str, color: Color32) -> egui::Response {
    egui::Frame::none()
        .stroke(Stroke::new(1.0, color))
        .rounding(Rounding::same(8.0))
        .inner_margin(egui::Margin::symmetric(6.0, 1.0))
        .show(ui, |ui| ui.label(RichText::new(text).small().color(color)))
        .response
}

/// Progress bar plus the latest status message. Hidden when `fraction` is
/// `None` and the message is empty.
pub fn progress_row(ui: &mut egui::Ui, fraction: Option<f32>, message: &str) {
    if fraction.is_none() && message.is_empty() {
        return;
    }
    ui.vertical(|ui| {
        if let Some(fraction) = fraction {
            ui.add(
                egui::ProgressBar::new(fraction.clamp(0.0, 1.0))
                    .show_percentage()
                    .animate(fraction < 1.0),
            );
        }
        if !message.is_empty() {
            let color = if message.starts_with("Error") {
                COLOR_CRITICAL
            } else {
                COLOR_MUTED
            };
            ui.label(RichText::new(message).color(color));
        }
    });
}

/// Bold key with a wrapped value, for inside an `egui::Grid`.
pub fn key_value_row(ui: &mut egui::Ui, key: &str, value: &str) {
    ui.label(RichText::new(key).strong());
    ui.add(egui::Label::new(value).wrap(true));
    ui.end_row();
}

/// Header used at the top of each section.
pub fn section_header(ui: &mut egui::Ui, title: &str) {
    ui.add_space(4.0);
    ui.label(RichText::new(title).heading().color(COLOR_ACCENT));
    ui.separator();
}
