//! One-screen system overview derived from inxi data, with fallbacks to
//! /proc, sysinfo and `df` when inxi leaves gaps.

use super::inxi::{InxiItem, InxiReport};
use super::size::{parse_size_to_bytes, UsageSummary};
use crate::system::command::{CommandRunner, CommandSpec, QUICK_TIMEOUT};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::Path;

static GPU_VENDOR_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(Advanced Micro Devices \[AMD/ATI\]|NVIDIA Corporation|NVIDIA|Intel Corporation)\s*")
        .expect("static gpu vendor regex")
});
static PARTITION_USED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([\d.]+\s*[KMGTPEZY]i?B?)\s*\(?([\d.]+%)?\)?").expect("static partition used regex")
});

#[derive(Debug, Clone, PartialEq)]
pub struct StorageSummary {
    pub device: String,
    pub total_bytes: f64,
    pub used_bytes: f64,
    pub free_bytes: f64,
    /// Formatted as reported, e.g. "27.0%"
    pub usage_percent: String,
}

impl StorageSummary {
    pub fn usage(&self) -> UsageSummary {
        UsageSummary {
            used_bytes: self.used_bytes,
            total_bytes: self.total_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemSummary {
    pub os_name: String,
    pub kernel: String,
    pub cpu: String,
    pub memory: Option<UsageSummary>,
    pub gpu: Option<String>,
    pub storage: Option<StorageSummary>,
    pub install_date: Option<String>,
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Size stored either as `"15.5 GiB"` or as `{"value": 15.5, "unit": "GiB"}`.
fn size_value(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::String(s) => parse_size_to_bytes(s),
        Value::Object(map) => {
            let amount = map.get("value").and_then(value_text)?;
            let unit = map.get("unit").and_then(value_text).unwrap_or_default();
            parse_size_to_bytes(&format!("{} {}", amount, unit))
        }
        _ => None,
    }
}

fn usage_from_fields(fields: &InxiItem, total_key: &str) -> Option<UsageSummary> {
    let total = size_value(fields.get(total_key))?;
    let used = match size_value(fields.get("used")) {
        Some(used) => used,
        None => total - size_value(fields.get("available"))?,
    };
    Some(UsageSummary {
        used_bytes: used,
        total_bytes: total,
    })
}

pub fn os_name(report: &InxiReport) -> String {
    report
        .first_str("System", "Distro")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn kernel_version(report: &InxiReport) -> String {
    report
        .first_str("System", "Kernel")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// `"<model> (<cores> cores)"` from the first two CPU items.
pub fn cpu_summary(report: &InxiReport) -> String {
    let items = report.get("CPU").unwrap_or(&[]);
    let model = items
        .first()
        .and_then(|i| i.get("model"))
        .and_then(value_text)
        .unwrap_or_else(|| "Unknown".to_string());
    let cores = items
        .get(1)
        .and_then(|i| i.get("cores"))
        .and_then(value_text)
        .unwrap_or_else(|| "N/A".to_string());
    format!("{} ({} cores)", model, cores)
}

/// Memory from the `Memory` section, then the `Info` section.
pub fn memory_from_inxi(report: &InxiReport) -> Option<UsageSummary> {
    if let Some(items) = report.get("Memory") {
        for item in items {
            let found = match item.get("ram") {
                Some(Value::Object(ram)) => usage_from_fields(ram, "total"),
                Some(_) => usage_from_fields(item, "total"),
                None => None,
            };
            if found.is_some() {
                return found;
            }
        }
    }

    let info = report.get("Info")?.iter().find(|item| {
        item.contains_key("Memory")
            || ["total", "used", "available"].iter().any(|k| item.contains_key(*k))
    })?;
    usage_from_fields(info, "total").or_else(|| usage_from_fields(info, "Memory"))
}

/// Memory with the full fallback chain: inxi, /proc/meminfo, sysinfo.
pub fn memory_usage(report: &InxiReport, root: &Path) -> Option<UsageSummary> {
    memory_from_inxi(report)
        .or_else(|| super::ram::read_meminfo(&root.join("proc/meminfo")))
        .or_else(super::ram::sysinfo_memory)
}

/// First VGA-class (`0300`) device as `"<vendor> <model>"`, with the
/// vendor field taken as reported and the vendor prefix stripped from the model.
pub fn gpu_summary(report: &InxiReport) -> Option<String> {
    let item = report.get("Graphics")?.iter().find(|item| {
        item.get("class-ID").and_then(Value::as_str) == Some("0300") && item.contains_key("Device")
    })?;
    let device = item.get("Device").and_then(value_text)?;
    let model = GPU_VENDOR_PREFIX_RE.replace(&device, "").trim().to_string();
    let vendor = item.get("vendor").and_then(value_text).unwrap_or_default();
    let joined = format!("{} {}", vendor, model).trim().to_string();
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn format_percent(used: f64, total: f64) -> String {
    if total > 0.0 {
        format!("{:.1}%", used / total * 100.0)
    } else {
        "N/A".to_string()
    }
}

/// Partial root-filesystem figures from the `Partition` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootPartition {
    pub device: Option<String>,
    pub total_bytes: Option<f64>,
    pub used_bytes: Option<f64>,
    pub usage_percent: Option<String>,
}

pub fn root_partition(report: &InxiReport) -> Option<RootPartition> {
    let item = report
        .get("Partition")?
        .iter()
        .find(|item| item.get("ID").and_then(Value::as_str) == Some("/"))?;

    let mut part = RootPartition {
        device: item.get("dev").and_then(value_text),
        total_bytes: size_value(item.get("raw-size")).or_else(|| size_value(item.get("size"))),
        ..Default::default()
    };
    if let Some(used) = item.get("used").and_then(Value::as_str) {
        if let Some(caps) = PARTITION_USED_RE.captures(used.trim()) {
            part.used_bytes = caps.get(1).and_then(|m| parse_size_to_bytes(m.as_str()));
            part.usage_percent = caps.get(2).map(|m| m.as_str().to_string());
        }
    }
    Some(part)
}

/// `df --output=source,size,used,avail --block-size=1 /`
pub fn parse_df_root(stdout: &str) -> Option<StorageSummary> {
    let line = stdout.lines().nth(1)?;
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return None;
    }
    let total: f64 = fields[1].parse().ok()?;
    let used: f64 = fields[2].parse().ok()?;
    let avail: f64 = fields[3].parse().ok()?;
    Some(StorageSummary {
        device: fields[0].to_string(),
        total_bytes: total,
        used_bytes: used,
        free_bytes: avail,
        usage_percent: format_percent(used, total),
    })
}

/// Combine inxi partition data with `df`, preferring inxi where complete.
pub fn merge_storage(part: Option<RootPartition>, df: Option<StorageSummary>) -> Option<StorageSummary> {
    let part = part.unwrap_or_default();
    let device = part
        .device
        .clone()
        .or_else(|| df.as_ref().map(|d| d.device.clone()))
        .unwrap_or_else(|| "Unknown".to_string());
    let total = part.total_bytes.or_else(|| df.as_ref().map(|d| d.total_bytes))?;
    let used = part.used_bytes.or_else(|| df.as_ref().map(|d| d.used_bytes))?;
    let free = match (&part.total_bytes, &part.used_bytes) {
        (Some(_), Some(_)) => (total - used).max(0.0),
        _ => df.as_ref().map(|d| d.free_bytes).unwrap_or((total - used).max(0.0)),
    };
    let usage_percent = part
        .usage_percent
        .unwrap_or_else(|| format_percent(used, total));
    Some(StorageSummary {
        device,
        total_bytes: total,
        used_bytes: used,
        free_bytes: free,
        usage_percent,
    })
}

async fn df_root(runner: &dyn CommandRunner) -> Option<StorageSummary> {
    let spec = CommandSpec::new("df")
        .args(["--output=source,size,used,avail", "--block-size=1", "/"])
        .timeout(QUICK_TIMEOUT)
        .c_locale();
    match runner.run(spec).await {
        Ok(out) if out.success() => parse_df_root(&out.stdout),
        Ok(out) => {
            log::debug!("[Hardware] df exited with {}", out.code());
            None
        }
        Err(e) => {
            log::debug!("[Hardware] df failed: {}", e);
            None
        }
    }
}

pub async fn storage_summary(report: &InxiReport, runner: &dyn CommandRunner) -> Option<StorageSummary> {
    let part = root_partition(report);
    let complete = part
        .as_ref()
        .map_or(false, |p| p.total_bytes.is_some() && p.used_bytes.is_some());
    let df = if complete { None } else { df_root(runner).await };
    merge_storage(part, df)
}

/// Build the overview; each field degrades independently.
pub async fn build_summary(
    report: &InxiReport,
    runner: &dyn CommandRunner,
    root: &Path,
) -> SystemSummary {
    SystemSummary {
        os_name: os_name(report),
        kernel: kernel_version(report),
        cpu: cpu_summary(report),
        memory: memory_usage(report, root),
        gpu: gpu_summary(report),
        storage: storage_summary(report, runner).await,
        install_date: super::install_date::detect_install_date(runner, root).await,
    }
}

/// `"<used> of <total> on <device> (<pct>)"`
pub fn storage_display(storage: &StorageSummary) -> String {
    format!(
        "{} of {} on {} ({})",
        super::size::format_size(storage.used_bytes),
        super::size::format_size(storage.total_bytes),
        storage.device,
        storage.usage_percent
    )
}
