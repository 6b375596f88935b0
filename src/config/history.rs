//! Install history for kernels and Mesa.
//!
//! Each file is a JSON array of `{name, version, timestamp}` entries, newest
//! last. Rollback reinstalls the entry before the newest one.

use crate::error::ConfigError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Absent in files written by older releases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Local>>,
}

/// One history file, loaded eagerly.
#[derive(Debug, Clone)]
pub struct InstallHistory {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
}

impl InstallHistory {
    /// Missing or corrupt files read as an empty history.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match super::loader::load_json::<Vec<HistoryEntry>>(&path) {
            Ok(entries) => entries,
            Err(ConfigError::FileNotFound(_)) => Vec::new(),
            Err(e) => {
                log::warn!("[History] Ignoring unreadable {}: {}", path.display(), e);
                Vec::new()
            }
        };
        InstallHistory { path, entries }
    }

    /// Create the file with `[]` if it does not exist yet.
    pub fn ensure_exists(path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            super::loader::save_json(&Vec::<HistoryEntry>::new(), path)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Record a successful install and rewrite the file.
    pub fn append(&mut self, name: &str, version: &str) -> Result<(), ConfigError> {
        self.entries.push(HistoryEntry {
            name: name.to_string(),
            version: version.to_string(),
            timestamp: Some(Local::now()),
        });
        super::loader::save_json(&self.entries, &self.path)
    }

    /// The second-to-last entry; `None` with fewer than two entries.
    pub fn rollback_target(&self) -> Option<&HistoryEntry> {
        let len = self.entries.len();
        if len < 2 {
            return None;
        }
        self.entries.get(len - 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = InstallHistory::load(dir.path().join("kernel_history.json"));
        assert!(history.entries().is_empty());
        assert!(history.rollback_target().is_none());
    }

    #[test]
    fn test_append_persists_and_rollback_targets_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel_history.json");

        let mut history = InstallHistory::load(&path);
        history.append("linux-lts", "6.6.30-1").unwrap();
        assert!(history.rollback_target().is_none());
        history.append("linux-zen", "6.9.1.zen1-1").unwrap();

        let reloaded = InstallHistory::load(&path);
        assert_eq!(reloaded.entries().len(), 2);
        assert_eq!(reloaded.rollback_target().unwrap().name, "linux-lts");
        assert_eq!(reloaded.latest().unwrap().name, "linux-zen");
    }

    #[test]
    fn test_entries_without_timestamp_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesa_history.json");
        std::fs::write(&path, r#"[{"name":"mesa","version":"24.0.5"},{"name":"mesa-git"}]"#).unwrap();

        let history = InstallHistory::load(&path);
        assert_eq!(history.entries().len(), 2);
        assert_eq!(history.entries()[1].version, "");
        assert_eq!(history.rollback_target().unwrap().version, "24.0.5");
    }

    #[test]
    fn test_ensure_exists_writes_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/mesa_history.json");
        InstallHistory::ensure_exists(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
    }
}
