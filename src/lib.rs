/// The top-level application module.
mod app;
pub use app::{App, AppState, AppView, Notification};

/// Views for each "screen".
pub mod views;
pub use views::*;

/// Reusable widgets.
pub mod widgets;

/// API client and the entities it returns.
pub mod common;
pub mod config;
mod constants;
pub mod logging;
/// Polling, chart aggregation and the worker shell relay.
pub mod monitor;
mod utils;
