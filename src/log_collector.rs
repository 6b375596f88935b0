//! Decoupled logging pipeline.
//!
//! ```text
//! log::info!() / log_parsed!()
//!     |
//! [LogCollector] (log::Log impl, never blocks the caller)
//!     | (crossbeam unbounded channel)
//! [persister thread]
//!     |               \
//! logs/<ts>.log        UI channel (bounded, try_send)
//! ```
//!
//! Every line reaches the session file even when the UI channel is full or
//! closed. `wait_for_empty` lets shutdown code block until the file has
//! caught up.

use chrono::Local;
use crossbeam_channel::{unbounded, Sender};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

enum LogMessage {
    Line(LogLine),
    Flush(std::sync::mpsc::Sender<()>),
}

/// Resolve the directory log files are written to.
pub fn get_global_logs_path() -> Result<PathBuf, String> {
    crate::config::loader::app_config_dir()
        .map(|dir| dir.join("logs"))
        .map_err(|e| format!("Failed to resolve logs directory: {}", e))
}

/// Ensure the global logs directory exists
pub fn ensure_logs_dir_exists(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir)
        .map_err(|e| format!("Failed to create logs directory: {}", e))
}

/// A log line with metadata
#[derive(Clone, Debug)]
pub struct LogLine {
    pub message: String,
    /// "full" for detail lines, "parsed" for status lines shown in the UI
    pub log_type: String,
    pub timestamp: String,
    /// Optional progress indicator (0-100)
    pub progress: Option<u32>,
}

impl LogLine {
    pub fn new(message: String) -> Self {
        LogLine {
            message,
            log_type: "full".to_string(),
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
            progress: None,
        }
    }

    pub fn parsed(message: String) -> Self {
        LogLine {
            log_type: "parsed".to_string(),
            ..LogLine::new(message)
        }
    }

    pub fn with_progress(mut self, progress: u32) -> Self {
        self.progress = Some(progress.min(100));
        self
    }

    pub fn is_parsed(&self) -> bool {
        self.log_type == "parsed"
    }

    fn to_file_line(&self) -> String {
        let marker = if self.is_parsed() { " >>" } else { "" };
        format!("[{}]{} {}\n", self.timestamp, marker, self.message)
    }
}

/// Logger that persists every record and mirrors it to the UI.
#[derive(Clone)]
pub struct LogCollector {
    tx: Sender<LogMessage>,
    session_path: PathBuf,
    max_level: LevelFilter,
}

impl LogCollector {
    /// Create the collector and its persister thread. A fresh session file
    /// named after the current time is opened in `log_dir`.
    pub fn new(
        log_dir: PathBuf,
        ui_tx: tokio::sync::mpsc::Sender<LogLine>,
    ) -> Result<Self, String> {
        ensure_logs_dir_exists(&log_dir)?;
        let session_path = log_dir.join(format!("{}.log", Local::now().format("%Y%m%d_%H%M%S")));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&session_path)
            .map_err(|e| format!("Failed to open log file {}: {}", session_path.display(), e))?;

        let (tx, rx) = unbounded::<LogMessage>();

        // OS thread rather than a tokio task: records may arrive from any
        // runtime, or from none at all.
        std::thread::spawn(move || {
            let mut file: File = file;
            while let Ok(msg) = rx.recv() {
                match msg {
                    LogMessage::Line(line) => {
                        let _ = file.write_all(line.to_file_line().as_bytes());
                        let _ = ui_tx.try_send(line);
                    }
                    LogMessage::Flush(done) => {
                        let _ = file.flush();
                        let _ = file.sync_data();
                        let _ = done.send(());
                    }
                }
            }
            eprintln!("[Log] Persister thread shutting down");
        });

        Ok(LogCollector {
            tx,
            session_path,
            max_level: LevelFilter::Info,
        })
    }

    pub fn with_max_level(mut self, level: LevelFilter) -> Self {
        self.max_level = level;
        self
    }

    pub fn max_level(&self) -> LevelFilter {
        self.max_level
    }

    pub fn session_log_path(&self) -> &Path {
        &self.session_path
    }

    /// Send a log line (non-blocking)
    pub fn log_line(&self, line: LogLine) {
        let _ = self.tx.send(LogMessage::Line(line));
    }

    pub fn log_str(&self, message: impl Into<String>) {
        self.log_line(LogLine::new(message.into()));
    }

    /// Send a parsed (high-level) log
    pub fn log_parsed(&self, message: impl Into<String>) {
        self.log_line(LogLine::parsed(message.into()));
    }

    pub fn log_with_progress(&self, message: impl Into<String>, progress: u32) {
        self.log_line(LogLine::parsed(message.into()).with_progress(progress));
    }

    /// Wait until every line sent before this call is on disk.
    pub async fn wait_for_empty(&self) -> Result<(), String> {
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        self.tx
            .send(LogMessage::Flush(done_tx))
            .map_err(|e| format!("Failed to send flush marker: {}", e))?;

        tokio::task::spawn_blocking(move || done_rx.recv())
            .await
            .map_err(|e| format!("Flush task failed: {}", e))?
            .map_err(|e| format!("Flush signal interrupted: {}", e))
    }
}

impl Log for LogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = format!("[{}] {}", record.level(), record.args());
        if record.target() == "parsed" {
            self.log_parsed(message);
        } else {
            self.log_str(message);
        }
    }

    fn flush(&self) {}
}

/// Plain stderr logger for the command-line tools.
pub struct StderrLogger {
    pub max_level: LevelFilter,
}

impl StderrLogger {
    /// Install as the global logger. Fails if a logger is already set.
    pub fn install(max_level: LevelFilter) -> Result<(), log::SetLoggerError> {
        log::set_boxed_logger(Box::new(StderrLogger { max_level }))
            .map(|()| log::set_max_level(max_level))
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "[{}] [{}] {}",
                Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}
