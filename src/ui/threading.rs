/// Threading and Async Integration Helpers
///
/// Utilities for spawning tokio tasks from the egui loop and routing their
/// results back through the [`AppEvent`] channel.

use crate::error::AppError;
use crate::models::{OperationProgress, ProgressFn};
use crate::ui::controller::{AppEvent, Operation};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Event channel capacity between background tasks and the UI.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub fn event_channel() -> (mpsc::Sender<AppEvent>, mpsc::Receiver<AppEvent>) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

/// Non-blocking send for synchronous callers. A full channel drops the event.
pub fn send_event(tx: &mpsc::Sender<AppEvent>, event: AppEvent) {
    if let Err(e) = tx.try_send(event) {
        log::debug!("[UI] Dropped event: {}", e);
    }
}

/// Progress callback that forwards into the event channel.
pub fn progress_reporter(tx: mpsc::Sender<AppEvent>, op: Operation) -> ProgressFn {
    Arc::new(move |progress: OperationProgress| {
        let _ = tx.try_send(AppEvent::Progress {
            op,
            fraction: progress.fraction,
            message: progress.message,
        });
    })
}

/// Clears the shared busy flag when dropped, so a panicking task cannot
/// leave the UI locked.
pub struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    /// `None` when another operation holds the flag.
    pub fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(BusyGuard { flag: flag.clone() })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Spawn a long-running operation that reports progress and finishes with
/// [`AppEvent::OperationFinished`]. Returns `false` without spawning when
/// another operation is still running.
pub fn spawn_operation<F, Fut>(
    op: Operation,
    busy: &Arc<AtomicBool>,
    tx: mpsc::Sender<AppEvent>,
    f: F,
) -> bool
where
    F: FnOnce(ProgressFn) -> Fut + Send + 'static,
    Fut: Future<Output = Result<String, AppError>> + Send + 'static,
{
    let Some(guard) = BusyGuard::acquire(busy) else {
        log::warn!("[UI] {} requested while another operation is running", op.label());
        send_event(
            &tx,
            AppEvent::Status(format!(
                "Another operation is still running; {} was not started",
                op.label().to_lowercase()
            )),
        );
        return false;
    };

    let progress = progress_reporter(tx.clone(), op);
    tokio::spawn(async move {
        let result = f(progress).await;
        drop(guard);
        let (success, message) = match result {
            Ok(message) => (true, message),
            Err(e) => {
                log::error!("[UI] {} failed: {}", op.label(), e);
                (false, e.user_message())
            }
        };
        let _ = tx
            .send(AppEvent::OperationFinished { op, success, message })
            .await;
    });
    true
}

/// Request UI repaint from a background thread
pub fn request_ui_repaint(ctx: Option<&eframe::egui::Context>) {
    if let Some(c) = ctx {
        c.request_repaint();
    }
}
