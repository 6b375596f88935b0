//! RAM usage fallbacks for when inxi does not report memory.
//!
//! Reads `MemTotal`/`MemAvailable` from /proc/meminfo, then asks sysinfo.

use super::size::UsageSummary;
use std::fs;
use std::path::Path;

/// Parse a /proc/meminfo body into used/total bytes.
pub fn parse_meminfo(content: &str) -> Option<UsageSummary> {
    let mut total_kb: Option<f64> = None;
    let mut available_kb: Option<f64> = None;
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let key = parts.next();
        let value = parts.next().and_then(|v| v.parse::<f64>().ok());
        match key {
            Some("MemTotal:") => total_kb = value,
            Some("MemAvailable:") => available_kb = value,
            _ => {}
        }
    }
    let total = total_kb? * 1024.0;
    let available = available_kb? * 1024.0;
    Some(UsageSummary {
        used_bytes: total - available,
        total_bytes: total,
    })
}

pub fn read_meminfo(path: &Path) -> Option<UsageSummary> {
    fs::read_to_string(path).ok().and_then(|c| parse_meminfo(&c))
}

/// Memory usage via sysinfo.
pub fn sysinfo_memory() -> Option<UsageSummary> {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    let total = sys.total_memory() as f64;
    if total <= 0.0 {
        return None;
    }
    Some(UsageSummary {
        used_bytes: total - sys.available_memory() as f64,
        total_bytes: total,
    })
}
