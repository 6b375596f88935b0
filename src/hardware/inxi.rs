//! inxi JSON output: fetching, cleaning, and parsing into ordered categories.
//!
//! inxi prefixes every key with a sort index (`"001#1#0#CPU"`) and may leak
//! terminal colour codes into values. Both are stripped before parsing.

use crate::error::{AppError, HardwareError};
use crate::system::command::{CommandRunner, CommandSpec, INXI_TIMEOUT};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::path::Path;

static ANSI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("static ansi regex"));
static HASH_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]*#([^"]*)""#).expect("static inxi key regex"));

pub type InxiItem = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct InxiCategory {
    pub name: String,
    pub items: Vec<InxiItem>,
}

/// All inxi categories in output order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InxiReport {
    pub categories: Vec<InxiCategory>,
}

impl InxiReport {
    pub fn get(&self, name: &str) -> Option<&[InxiItem]> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.items.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// First string value stored under `key` in any item of `category`.
    pub fn first_str(&self, category: &str, key: &str) -> Option<&str> {
        self.get(category)?
            .iter()
            .find_map(|item| item.get(key).and_then(Value::as_str))
    }
}

/// Strip colour codes and `index#` key prefixes.
pub fn clean_inxi_output(raw: &str) -> String {
    let no_ansi = ANSI_RE.replace_all(raw, "");
    HASH_PREFIX_RE.replace_all(&no_ansi, "\"$1\"").into_owned()
}

fn normalize_items(value: Value) -> Vec<InxiItem> {
    match value {
        Value::Array(values) => values
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        Value::Object(map) => vec![map],
        _ => Vec::new(),
    }
}

/// Parse already-cleaned inxi JSON. The top level is an array of
/// single-category objects; repeated categories replace the earlier ones in
/// place.
pub fn parse_inxi_json(cleaned: &str) -> Result<InxiReport, HardwareError> {
    let parsed: Value = serde_json::from_str(cleaned)?;
    let Value::Array(entries) = parsed else {
        return Err(HardwareError::InxiFailed(
            "expected a JSON array at the top level".to_string(),
        ));
    };

    let mut report = InxiReport::default();
    for entry in entries {
        let Value::Object(map) = entry else { continue };
        for (name, value) in map {
            let items = normalize_items(value);
            match report.categories.iter_mut().find(|c| c.name == name) {
                Some(existing) => existing.items = items,
                None => report.categories.push(InxiCategory { name, items }),
            }
        }
    }
    Ok(report)
}

/// Character window around a JSON error position, for the log.
pub fn error_context(content: &str, line: usize, column: usize) -> String {
    let Some(text) = content.lines().nth(line.saturating_sub(1)) else {
        return String::new();
    };
    let chars: Vec<char> = text.chars().collect();
    let col = column.saturating_sub(1).min(chars.len());
    let start = col.saturating_sub(30);
    let end = (col + 30).min(chars.len());
    chars[start..end].iter().collect()
}

/// Clean and parse; on a JSON error the cleaned text is kept in
/// `<dump_dir>/inxi_problematic.json` for bug reports.
pub fn parse_raw_inxi(raw: &str, dump_dir: &Path) -> Result<InxiReport, AppError> {
    let cleaned = clean_inxi_output(raw);
    match parse_inxi_json(&cleaned) {
        Ok(report) => Ok(report),
        Err(HardwareError::InvalidInxiJson(e)) => {
            let context = error_context(&cleaned, e.line(), e.column());
            log::error!(
                "[Hardware] inxi JSON error at line {} column {}: {} (near '{}')",
                e.line(),
                e.column(),
                e,
                context
            );
            let dump = dump_dir.join("inxi_problematic.json");
            if let Err(write_err) = std::fs::write(&dump, &cleaned) {
                log::warn!("[Hardware] Could not save {}: {}", dump.display(), write_err);
            } else {
                log::info!("[Hardware] Problematic inxi output saved to {}", dump.display());
            }
            Err(AppError::Parse(format!("inxi returned invalid JSON: {}", e)))
        }
        Err(other) => Err(other.into()),
    }
}

/// Run inxi into a temporary file and parse the result.
pub async fn fetch_inxi(runner: &dyn CommandRunner) -> Result<InxiReport, AppError> {
    let output_file = tempfile::Builder::new()
        .prefix("inxi-")
        .suffix(".json")
        .tempfile()
        .map_err(|e| AppError::Io(format!("Cannot create temp file for inxi: {}", e)))?;
    let path = output_file.path().to_string_lossy().into_owned();

    let spec = CommandSpec::new("inxi")
        .args(["-FxxxzamP", "--output", "json", "--output-file", path.as_str(), "--no-host", "-z"])
        .timeout(INXI_TIMEOUT);
    let output = runner.run(spec).await?;

    let raw = std::fs::read_to_string(output_file.path()).unwrap_or_default();
    if raw.trim().is_empty() {
        let reason = if output.success() {
            "inxi produced no output".to_string()
        } else {
            format!("exit code {}: {}", output.code(), output.stderr_tail(3))
        };
        return Err(AppError::HardwareDetection(reason));
    }
    if !output.success() {
        log::warn!(
            "[Hardware] inxi exited with {} but wrote output, continuing",
            output.code()
        );
    }

    parse_raw_inxi(&raw, &std::env::temp_dir())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "[{\"000#1#0#System\":[{\"001#1#1#Kernel\":\"6.9.1-zen1-1-zen\",\"002#1#1#Distro\":\"\x1b[1;34mManjaro Linux\x1b[0m\"}]},\
        {\"005#1#0#CPU\":[{\"006#1#1#model\":\"AMD Ryzen 7 5800X\"},{\"007#1#1#cores\":8}]}]";

    #[test]
    fn test_clean_strips_prefixes_and_ansi() {
        let cleaned = clean_inxi_output(SAMPLE);
        assert!(!cleaned.contains('#'));
        assert!(!cleaned.contains('\x1b'));
        assert!(cleaned.contains("\"Distro\":\"Manjaro Linux\""));
    }

    #[test]
    fn test_parse_preserves_category_order() {
        let report = parse_inxi_json(&clean_inxi_output(SAMPLE)).unwrap();
        let names: Vec<&str> = report.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["System", "CPU"]);
        assert_eq!(report.first_str("System", "Kernel"), Some("6.9.1-zen1-1-zen"));
        assert_eq!(report.get("CPU").unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_category_replaces_in_place() {
        let json = r#"[{"A":[{"x":"1"}]},{"B":[]},{"A":[{"x":"2"}]}]"#;
        let report = parse_inxi_json(json).unwrap();
        assert_eq!(report.categories.len(), 2);
        assert_eq!(report.categories[0].name, "A");
        assert_eq!(report.first_str("A", "x"), Some("2"));
    }

    #[test]
    fn test_non_object_items_dropped() {
        let json = r#"[{"Info":[{"Memory":"16 GiB"}, "stray", 4]}, 7]"#;
        let report = parse_inxi_json(json).unwrap();
        assert_eq!(report.get("Info").unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_json_is_saved_for_inspection() {
        let dir = tempfile::tempdir().unwrap();
        let result = parse_raw_inxi("[{\"System\": [", dir.path());
        assert!(matches!(result, Err(AppError::Parse(_))));
        assert!(dir.path().join("inxi_problematic.json").exists());
    }

    #[test]
    fn test_top_level_object_rejected() {
        assert!(parse_inxi_json(r#"{"System": []}"#).is_err());
    }

    #[test]
    fn test_error_context_window() {
        let text = "a".repeat(100);
        assert_eq!(error_context(&text, 1, 50).len(), 60);
        assert_eq!(error_context(&text, 3, 1), "");
    }
}
