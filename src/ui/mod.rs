//! UI Module - egui integration and AppController
//!
//! `controller` owns the backend managers and spawns their work on tokio;
//! `app` drains the resulting events each frame and routes them to the page
//! modules (`hardware`, `kernels`, `drivers`, `settings`).

pub mod app;
pub mod controller;
pub mod drivers;
pub mod hardware;
pub mod kernels;
pub mod settings;
pub mod threading;
pub mod widgets;

pub use app::{AppUI, Tab, UIState};
pub use controller::{AppController, AppEvent, ControllerPaths, Operation};
