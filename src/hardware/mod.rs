//! Hardware information public API module.
//!
//! inxi is the primary source. The summary shown at the top of the hardware
//! page falls back to /proc, sysinfo and `df` field by field.

pub mod categories;
pub mod install_date;
pub mod inxi;
pub mod ram;
pub mod size;
pub mod summary;

pub use categories::{category_display_name, item_title, key_display, value_to_display};
pub use inxi::{InxiCategory, InxiItem, InxiReport};
pub use size::{format_size, parse_size_to_bytes, UsageLevel, UsageSummary};
pub use summary::{StorageSummary, SystemSummary};

use crate::error::AppError;
use crate::system::CommandRunner;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Everything the hardware page renders.
#[derive(Debug, Clone)]
pub struct HardwareSnapshot {
    pub report: InxiReport,
    pub summary: SystemSummary,
}

/// Runs inxi and keeps the last good result.
///
/// ```ignore
/// let mut detector = HardwareDetector::new(runner);
/// let snapshot = detector.detect().await?;
/// println!("CPU: {}", snapshot.summary.cpu);
/// ```
pub struct HardwareDetector {
    runner: Arc<dyn CommandRunner>,
    root: PathBuf,
    cached: Option<(HardwareSnapshot, Instant)>,
}

impl HardwareDetector {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        HardwareDetector {
            runner,
            root: PathBuf::from("/"),
            cached: None,
        }
    }

    /// Resolve /proc and /etc lookups under `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Run inxi and rebuild the summary. Failures leave the cache untouched.
    pub async fn detect(&mut self) -> Result<HardwareSnapshot, AppError> {
        let started = Instant::now();
        let report = inxi::fetch_inxi(self.runner.as_ref()).await?;
        let summary = summary::build_summary(&report, self.runner.as_ref(), &self.root).await;
        log::info!(
            "[Hardware] inxi reported {} categories in {:.1}s",
            report.categories.len(),
            started.elapsed().as_secs_f32()
        );
        let snapshot = HardwareSnapshot { report, summary };
        self.cached = Some((snapshot.clone(), Instant::now()));
        Ok(snapshot)
    }

    pub fn cached(&self) -> Option<&HardwareSnapshot> {
        self.cached.as_ref().map(|(snapshot, _)| snapshot)
    }

    pub fn cache_age(&self) -> Option<std::time::Duration> {
        self.cached.as_ref().map(|(_, at)| at.elapsed())
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}
