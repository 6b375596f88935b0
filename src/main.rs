use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::RwLock;

use driver_manager::config::SettingsManager;
use driver_manager::log_collector::{ensure_logs_dir_exists, get_global_logs_path};
use driver_manager::ui::app::AppUI;
use driver_manager::ui::controller::{AppController, AppEvent};
use driver_manager::ui::threading::event_channel;
use driver_manager::{LogCollector, LogLine};

#[tokio::main]
async fn main() -> driver_manager::Result<()> {
    // =========================================================================
    // LOG COLLECTOR - DECOUPLED FROM UI
    // =========================================================================
    let log_dir = match get_global_logs_path() {
        Ok(dir) => {
            ensure_logs_dir_exists(&dir)?;
            dir
        }
        Err(e) => {
            eprintln!("[Main] ERROR: Failed to get global logs path: {}", e);
            return Err(format!("Failed to determine logs directory: {}", e).into());
        }
    };

    // debug_logging is read once here, so toggling it takes effect on the next start
    let debug_logging = SettingsManager::load().map(|s| s.debug_logging).unwrap_or(false);
    let max_level = if debug_logging {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let (log_ui_tx, mut log_ui_rx) = mpsc::channel::<LogLine>(1024);
    let log_collector = match LogCollector::new(log_dir, log_ui_tx) {
        Ok(collector) => Arc::new(collector.with_max_level(max_level)),
        Err(e) => {
            eprintln!("[Main] WARNING: LogCollector initialization failed: {}", e);
            return Err(format!("LogCollector initialization failed: {}", e).into());
        }
    };

    if let Err(e) = log::set_boxed_logger(Box::new((*log_collector).clone()))
        .map(|()| log::set_max_level(max_level))
    {
        eprintln!("[Main] WARNING: Failed to set LogCollector as global logger: {}", e);
    }
    log::info!(
        "Driver Manager {} starting, session log at {}",
        driver_manager::VERSION,
        log_collector.session_log_path().display()
    );

    // =========================================================================
    // CONTROLLER AND CHANNELS SETUP
    // =========================================================================
    let (event_tx, event_rx) = event_channel();

    // Forward log lines to the UI: "parsed" lines become the status line
    let log_event_tx = event_tx.clone();
    tokio::spawn(async move {
        while let Some(log_line) = log_ui_rx.recv().await {
            let event = if log_line.is_parsed() {
                AppEvent::Status(log_line.message)
            } else {
                AppEvent::Log(log_line.message)
            };
            // The UI drains at frame rate; drop rather than stall the logger
            let _ = log_event_tx.try_send(event);
        }
    });

    let controller = match AppController::new(event_tx, Some(log_collector.clone())) {
        Ok(controller) => controller,
        Err(e) => {
            log::error!("[Main] Failed to initialize controller: {}", e);
            let _ = log_collector.wait_for_empty().await;
            return Err(e.user_message().into());
        }
    };

    // Startup work runs in the background so the window opens immediately
    controller.refresh_hardware();
    controller.check_health();

    let controller = Arc::new(RwLock::new(controller));
    let app_ui = AppUI::new(controller, Some(event_rx));

    // =========================================================================
    // LAUNCH EGUI
    // =========================================================================
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 700.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    let result = eframe::run_native("Driver Manager", options, Box::new(move |_cc| Box::new(app_ui)));

    // =========================================================================
    // SHUTDOWN
    // =========================================================================
    log::info!("Driver Manager shutting down");
    if let Err(e) = log_collector.wait_for_empty().await {
        eprintln!("[Main] WARNING: Failed to wait for log collector to empty: {}", e);
    }

    result.map_err(|e| e.into())
}
