//! Best-effort operating system installation date.
//!
//! Candidates are tried in order and the first one that yields a date wins.
//! Paths are resolved under `root` so tests can point at a scratch tree.

use crate::system::command::{CommandRunner, CommandSpec, QUICK_TIMEOUT};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::time::SystemTime;

const INSTALLER_LOGS: &[&str] = &[
    "var/log/installer/syslog",
    "var/log/calamares.log",
    "var/log/ubiquity/syslog",
    "var/log/anaconda/anaconda.log",
];

const CTIME_DIRS: &[&str] = &["etc", "var/lib/dpkg", "var/lib/rpm", "usr/share/doc"];

const DATE_FORMAT: &str = "%d/%m/%Y";

pub fn format_date(date: DateTime<Local>) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn mtime(path: &Path) -> Option<DateTime<Local>> {
    let modified: SystemTime = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Local>::from(modified))
}

fn ctime(path: &Path) -> Option<DateTime<Local>> {
    let meta = std::fs::metadata(path).ok()?;
    Local.timestamp_opt(meta.ctime(), 0).single()
}

/// `2021-03-04 10:11:12 startup ...` -> `04/03/2021`
pub fn parse_dpkg_first_line(line: &str) -> Option<String> {
    let date = line.get(..10)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .map(|d| d.format(DATE_FORMAT).to_string())
}

/// Date from the `Filesystem created:` line of `tune2fs -l`.
pub fn parse_tune2fs_created(output: &str) -> Option<String> {
    let line = output
        .lines()
        .find(|l| l.trim_start().starts_with("Filesystem created:"))?;
    let value = line.split_once(':')?.1;
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&normalized, "%a %b %d %H:%M:%S %Y")
        .ok()
        .map(|dt| dt.format(DATE_FORMAT).to_string())
}

/// Device backing `/` from plain `df /` output.
pub fn parse_df_device(output: &str) -> Option<String> {
    output
        .lines()
        .nth(1)?
        .split_whitespace()
        .next()
        .map(|s| s.to_string())
}

/// Steps that only need the filesystem.
pub fn install_date_from_files(root: &Path) -> Option<String> {
    if let Some(date) = mtime(&root.join("etc/machine-id")) {
        return Some(format_date(date));
    }
    for log in INSTALLER_LOGS {
        if let Some(date) = mtime(&root.join(log)) {
            return Some(format_date(date));
        }
    }
    for dir in CTIME_DIRS {
        if let Some(date) = ctime(&root.join(dir)) {
            return Some(format_date(date));
        }
    }
    let dpkg_log = std::fs::read_to_string(root.join("var/log/dpkg.log")).ok()?;
    parse_dpkg_first_line(dpkg_log.lines().next()?)
}

async fn tune2fs_date(runner: &dyn CommandRunner) -> Option<String> {
    let df = runner
        .run(CommandSpec::new("df").arg("/").timeout(QUICK_TIMEOUT).c_locale())
        .await
        .ok()?;
    let device = parse_df_device(&df.stdout)?;
    let out = runner
        .run(
            CommandSpec::new("tune2fs")
                .args(["-l", device.as_str()])
                .timeout(QUICK_TIMEOUT)
                .c_locale(),
        )
        .await
        .ok()?;
    if !out.success() {
        return None;
    }
    parse_tune2fs_created(&out.stdout)
}

pub async fn detect_install_date(runner: &dyn CommandRunner, root: &Path) -> Option<String> {
    if let Some(date) = install_date_from_files(root) {
        return Some(date);
    }
    if let Some(date) = tune2fs_date(runner).await {
        return Some(date);
    }
    let date = ctime(root).map(format_date);
    if date.is_none() {
        log::debug!("[Hardware] Installation date could not be determined");
    }
    date
}
