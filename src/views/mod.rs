/// Billing usage and records.
pub mod billing;
/// Clusters and the specs each one offers.
pub mod clusters;
/// Registry credentials for private images.
pub mod credentials;
/// Create-endpoint form of the spec catalog.
pub mod deploy;
/// Endpoint detail with its tabs.
pub mod endpoint;
/// Endpoints list.
pub mod endpoints;
/// Menu interface.
pub mod menu;
/// Sign-in prompt and user bootstrap.
pub mod session;
/// View & edit settings.
pub mod settings;
/// Admin editing of the spec catalog.
pub mod spec_admin;
/// Hardware spec catalog.
pub mod specs;
/// Paginated task table, shared by every task view.
pub mod task_list;
/// Tasks across all endpoints.
pub mod tasks;
/// Worker drawer: tasks, logs and shell.
pub mod worker;

use ratatui::style::Color;

/// Color of an endpoint, worker or task status, whatever its casing.
pub(crate) fn status_color(status: &str) -> Color {
    match status.to_ascii_uppercase().as_str() {
        "RUNNING" | "ONLINE" | "COMPLETED" | "HEALTHY" => Color::Green,
        "BUSY" | "IN_PROGRESS" => Color::Cyan,
        "PENDING" | "STARTING" | "DEPLOYING" | "DRAINING" => Color::Yellow,
        "FAILED" | "ERROR" | "UNHEALTHY" => Color::Red,
        _ => Color::DarkGray,
    }
}
