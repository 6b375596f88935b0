//! Display names and titles for inxi categories and their items.

use serde_json::Value;

/// Human-friendly name for an inxi category key.
pub fn category_display_name(name: &str) -> String {
    let mapped = match name {
        "System" => "System Information",
        "CPU" => "Processor (CPU)",
        "Graphics" => "Graphics / GPU",
        "Audio" => "Audio Devices",
        "Network" => "Network Interfaces",
        "Drives" => "Storage Devices",
        "Partition" => "Partitions",
        "Usb" | "USB" => "USB Devices",
        "Sensors" => "Sensors",
        "Memory" => "Memory Details",
        "Machine" => "Machine Info",
        "Info" => "Processes & System Load",
        "Battery" => "Battery Status",
        "RAID" => "RAID Arrays",
        "Swap" => "Swap Details",
        "Bluetooth" => "Bluetooth Devices",
        "Repos" => "Software Repositories",
        other => return title_case(&other.replace('_', " ")),
    };
    mapped.to_string()
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// "Partitions" -> "Partition", "Drives" -> "Drive", "CPU" -> "CPU"
pub fn singular(name: &str) -> &str {
    let name = name.strip_suffix('s').unwrap_or(name);
    name.strip_suffix("es").unwrap_or(name)
}

/// Row label for an item key: `raw-size` -> `Raw Size`.
pub fn key_display(key: &str) -> String {
    title_case(&key.replace(['_', '-'], " "))
}

const TITLE_KEYS: &[&str] = &["model", "Device", "name", "ID", "IF", "type", "vendor"];

/// Group title for item `index` of `category`, e.g. `"Drive 2: Samsung SSD 970"`.
pub fn item_title(item: &serde_json::Map<String, Value>, category: &str, index: usize) -> String {
    let base = singular(category);
    let title = TITLE_KEYS.iter().find_map(|key| {
        item.get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    });

    let Some(mut title) = title.map(str::to_string) else {
        return format!("{} {}", base, index + 1);
    };

    if let Some(vendor) = item.get("vendor").and_then(Value::as_str).map(str::trim) {
        if !vendor.is_empty() {
            title = title.replace(vendor, "");
        }
    }
    let title = title.trim_matches(|c: char| c == ' ' || c == '[' || c == ']');
    if title.is_empty() {
        format!("{} {}", base, index + 1)
    } else {
        format!("{} {}: {}", base, index + 1, title)
    }
}

/// Render a JSON value as one display line. Long lists are summarized and
/// `{value, unit}` pairs are joined.
pub fn value_to_display(value: &Value) -> String {
    match value {
        Value::Null => "N/A".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) if items.len() > 3 => format!(
            "{} items: {}...",
            items.len(),
            items[..2].iter().map(value_to_display).collect::<Vec<_>>().join(", ")
        ),
        Value::Array(items) => items
            .iter()
            .map(value_to_display)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) if map.contains_key("value") && map.contains_key("unit") => format!(
            "{} {}",
            map.get("value").map(value_to_display).unwrap_or_default(),
            map.get("unit").map(value_to_display).unwrap_or_default()
        ),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, value_to_display(v)))
            .collect::<Vec<_>>()
            .join("; "),
    }
}
