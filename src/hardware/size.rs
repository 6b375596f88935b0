//! Human-readable size strings in inxi output, e.g. `15.52 GiB` or `1.82TiB`.

use once_cell::sync::Lazy;
use regex::Regex;

static SIZE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^([\d.]+)\s*([KMGTPEZY]i?B)").expect("static size regex"));

/// Bytes represented by `s`. K/M/G/T use powers of 1024, larger units are
/// taken at face value.
pub fn parse_size_to_bytes(s: &str) -> Option<f64> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let caps = SIZE_RE.captures(&compact)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_uppercase();
    let multiplier = match unit.chars().next() {
        Some('K') => 1024f64,
        Some('M') => 1024f64.powi(2),
        Some('G') => 1024f64.powi(3),
        Some('T') => 1024f64.powi(4),
        _ => 1.0,
    };
    Some(value * multiplier)
}

/// Decimal size formatting: `"1.5 GB"`, `"512 bytes"`.
pub fn format_size(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["kB", "MB", "GB", "TB", "PB"];
    if bytes < 1000.0 {
        return format!("{} bytes", bytes.max(0.0) as u64);
    }
    let mut value = bytes / 1000.0;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Bucket for colouring usage bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageLevel {
    Unknown,
    Low,
    Medium,
    High,
}

impl UsageLevel {
    pub fn from_percent(percent: f64) -> Self {
        if percent < 0.0 || percent.is_nan() {
            UsageLevel::Unknown
        } else if percent < 50.0 {
            UsageLevel::Low
        } else if percent < 80.0 {
            UsageLevel::Medium
        } else {
            UsageLevel::High
        }
    }
}

/// Used/total pair for memory and disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageSummary {
    pub used_bytes: f64,
    pub total_bytes: f64,
}

impl UsageSummary {
    pub fn percent(&self) -> f64 {
        if self.total_bytes <= 0.0 {
            -1.0
        } else {
            (self.used_bytes / self.total_bytes * 100.0).clamp(0.0, 100.0)
        }
    }

    pub fn fraction(&self) -> f32 {
        let pct = self.percent();
        if pct < 0.0 {
            0.0
        } else {
            (pct / 100.0) as f32
        }
    }

    pub fn level(&self) -> UsageLevel {
        UsageLevel::from_percent(self.percent())
    }

    pub fn free_bytes(&self) -> f64 {
        (self.total_bytes - self.used_bytes).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_binary_units() {
        assert_eq!(parse_size_to_bytes("1 KiB"), Some(1024.0));
        assert_eq!(parse_size_to_bytes("2 MiB"), Some(2.0 * 1024.0 * 1024.0));
        assert_eq!(parse_size_to_bytes("15.5 GiB"), Some(15.5 * 1024f64.powi(3)));
        assert_eq!(parse_size_to_bytes("1.82TiB"), Some(1.82 * 1024f64.powi(4)));
    }

    #[test]
    fn test_parse_is_case_insensitive_and_space_tolerant() {
        assert_eq!(parse_size_to_bytes("4 gib"), Some(4.0 * 1024f64.powi(3)));
        assert_eq!(parse_size_to_bytes(" 1 0 GB"), Some(10.0 * 1024f64.powi(3)));
    }

    #[test]
    fn test_parse_large_units_are_face_value() {
        assert_eq!(parse_size_to_bytes("3 PiB"), Some(3.0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_size_to_bytes(""), None);
        assert_eq!(parse_size_to_bytes("N/A"), None);
        assert_eq!(parse_size_to_bytes("12"), None);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512.0), "512 bytes");
        assert_eq!(format_size(1_500.0), "1.5 kB");
        assert_eq!(format_size(16_000_000_000.0), "16.0 GB");
        assert_eq!(format_size(2_000_000_000_000.0), "2.0 TB");
    }

    #[test]
    fn test_usage_levels() {
        assert_eq!(UsageLevel::from_percent(-1.0), UsageLevel::Unknown);
        assert_eq!(UsageLevel::from_percent(10.0), UsageLevel::Low);
        assert_eq!(UsageLevel::from_percent(50.0), UsageLevel::Medium);
        assert_eq!(UsageLevel::from_percent(80.0), UsageLevel::High);

        let usage = UsageSummary { used_bytes: 3.0, total_bytes: 4.0 };
        assert_eq!(usage.percent(), 75.0);
        assert_eq!(usage.level(), UsageLevel::Medium);
        assert_eq!(usage.free_bytes(), 1.0);
        let unknown = UsageSummary { used_bytes: 3.0, total_bytes: 0.0 };
        assert_eq!(unknown.level(), UsageLevel::Unknown);
    }
}
