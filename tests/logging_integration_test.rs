use driver_manager::{LogCollector, LogLine};
use log::{Level, LevelFilter, Log, Record};
use std::fs;
use tokio::sync::mpsc;

/// Integration test for the logging system
///
/// Tests that:
/// 1. LogCollector writes every line to the session file
/// 2. Parsed lines carry the status marker
/// 3. The UI channel receives the same lines
#[tokio::test]
async fn test_logging_integration_full_cycle() {
    let temp_dir = tempfile::tempdir().unwrap();
    let log_dir = temp_dir.path().join("logs");
    let (ui_tx, mut ui_rx) = mpsc::channel::<LogLine>(64);

    let collector = LogCollector::new(log_dir.clone(), ui_tx).expect("Failed to initialize LogCollector");

    collector.log_str("Installing linux-zen");
    collector.log_parsed("Kernel list refreshed");
    collector.log_with_progress("Downloading packages", 150);
    collector.wait_for_empty().await.expect("flush failed");

    let session = collector.session_log_path().to_path_buf();
    assert!(session.starts_with(&log_dir));
    assert_eq!(session.extension().and_then(|e| e.to_str()), Some("log"));

    let content = fs::read_to_string(&session).expect("Failed to read log file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("] Installing linux-zen"));
    assert!(lines[1].contains(" >> Kernel list refreshed"));
    assert!(!lines[0].contains(">>"));

    let first = ui_rx.recv().await.unwrap();
    assert_eq!(first.message, "Installing linux-zen");
    assert!(!first.is_parsed());
    let second = ui_rx.recv().await.unwrap();
    assert!(second.is_parsed());
    let third = ui_rx.recv().await.unwrap();
    assert_eq!(third.progress, Some(100));
}

#[tokio::test]
async fn test_file_keeps_lines_when_ui_channel_is_full() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (ui_tx, _ui_rx) = mpsc::channel::<LogLine>(2);
    let collector = LogCollector::new(temp_dir.path().to_path_buf(), ui_tx).unwrap();

    for i in 0..50 {
        collector.log_str(format!("line {}", i));
    }
    collector.wait_for_empty().await.unwrap();

    let content = fs::read_to_string(collector.session_log_path()).unwrap();
    assert_eq!(content.lines().count(), 50);
    assert!(content.contains("line 49"));
}

#[tokio::test]
async fn test_file_keeps_lines_when_ui_receiver_is_dropped() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (ui_tx, ui_rx) = mpsc::channel::<LogLine>(8);
    drop(ui_rx);
    let collector = LogCollector::new(temp_dir.path().to_path_buf(), ui_tx).unwrap();

    collector.log_parsed("Mesa updated");
    collector.wait_for_empty().await.unwrap();

    let content = fs::read_to_string(collector.session_log_path()).unwrap();
    assert!(content.contains(">> Mesa updated"));
}

#[tokio::test]
async fn test_log_records_respect_level_and_target() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (ui_tx, _ui_rx) = mpsc::channel::<LogLine>(16);
    let collector = LogCollector::new(temp_dir.path().to_path_buf(), ui_tx)
        .unwrap()
        .with_max_level(LevelFilter::Info);

    collector.log(
        &Record::builder()
            .level(Level::Debug)
            .target("driver_manager")
            .args(format_args!("hidden detail"))
            .build(),
    );
    collector.log(
        &Record::builder()
            .level(Level::Info)
            .target("parsed")
            .args(format_args!("Hardware detected"))
            .build(),
    );
    collector.log(
        &Record::builder()
            .level(Level::Warn)
            .target("driver_manager")
            .args(format_args!("df failed"))
            .build(),
    );
    collector.wait_for_empty().await.unwrap();

    let content = fs::read_to_string(collector.session_log_path()).unwrap();
    assert!(!content.contains("hidden detail"));
    assert!(content.contains(">> [INFO] Hardware detected"));
    assert!(content.contains("[WARN] df failed"));
}
