mod metrics;
pub use metrics::MetricsState;

mod overview;
pub use overview::{OverviewFocus, OverviewState, curl_example};

mod settings;
pub use settings::{EndpointSettingsState, Mutation, SettingsRow, parse_env_entry};

mod workers;

use crate::common::{ApiError, ApiResult, Endpoint, TaskStatistics, Worker};
use crate::monitor::Feed;
use crate::task_list::{TaskListState, TaskScope};
use crate::utils::local_date;
use crate::views::status_color;
use crate::widgets::SelectionState;
use crate::{App, AppView};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Paragraph, Tabs},
};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum EndpointTab {
    #[default]
    Overview,
    Metrics,
    Workers,
    Tasks,
    Settings,
}

impl EndpointTab {
    pub const ALL: [EndpointTab; 5] = [
        EndpointTab::Overview,
        EndpointTab::Metrics,
        EndpointTab::Workers,
        EndpointTab::Tasks,
        EndpointTab::Settings,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            EndpointTab::Overview => "Overview",
            EndpointTab::Metrics => "Metrics",
            EndpointTab::Workers => "Workers",
            EndpointTab::Tasks => "Tasks",
            EndpointTab::Settings => "Settings",
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// One part of the detail snapshot, the three parts arrive in any order.
#[derive(Debug)]
pub enum SnapshotPart {
    Endpoint(ApiResult<Endpoint>),
    Workers(ApiResult<Vec<Worker>>),
    Statistics(ApiResult<TaskStatistics>),
}

#[derive(Debug)]
pub struct EndpointState {
    pub name: String,
    pub snapshot: Feed<SnapshotPart>,
    pub endpoint: Option<Endpoint>,
    pub workers: Vec<Worker>,
    pub statistics: Option<TaskStatistics>,
    /// Set when the endpoint could never be loaded.
    pub missing: Option<String>,
    pub overview: OverviewState,
    pub metrics: MetricsState,
    pub worker_selection: SelectionState,
    pub tasks: TaskListState,
    pub settings: EndpointSettingsState,
}

impl EndpointState {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            snapshot: Feed::new(),
            endpoint: None,
            workers: Vec::new(),
            statistics: None,
            missing: None,
            overview: OverviewState::default(),
            metrics: MetricsState::default(),
            worker_selection: SelectionState::new(),
            tasks: TaskListState::new(TaskScope::Endpoint(name.to_string())),
            settings: EndpointSettingsState::default(),
        }
    }

    /// Applies one part of a snapshot.
    ///
    /// Only the endpoint itself can turn the view into "not found", and only
    /// until it loaded once. Workers and statistics fall back to empty values.
    pub fn apply(&mut self, part: SnapshotPart) {
        match part {
            SnapshotPart::Endpoint(Ok(endpoint)) => {
                self.endpoint = Some(endpoint);
                self.missing = None;
            }
            SnapshotPart::Endpoint(Err(err)) => {
                if self.endpoint.is_none() && !err.is_unauthorized() {
                    self.missing = Some(match err {
                        ApiError::NotFound(_) => "Endpoint not found".to_string(),
                        err => format!("Endpoint not found: {}", err),
                    });
                } else {
                    tracing::debug!("endpoint {} refresh failed: {}", self.name, err);
                }
            }
            SnapshotPart::Workers(result) => {
                self.workers = result.unwrap_or_else(|err| {
                    tracing::debug!("workers of {} unavailable: {}", self.name, err);
                    Vec::new()
                });
                self.worker_selection.clamp(self.workers.len());
            }
            SnapshotPart::Statistics(result) => {
                self.statistics = result
                    .map_err(|err| tracing::debug!("statistics of {} unavailable: {}", self.name, err))
                    .ok();
            }
        }
    }
}

impl App {
    /// Opens the detail view of `name` on its overview tab.
    pub(crate) fn open_endpoint(&mut self, name: String) {
        self.state.endpoint = Some(EndpointState::new(&name));
        self.start_snapshot();
        self.view = AppView::Endpoint(EndpointTab::Overview);
    }

    /// (Re)starts the endpoint, workers and statistics refresh.
    pub(crate) fn start_snapshot(&mut self) {
        let Some(state) = self.state.endpoint.as_mut() else {
            return;
        };
        let api = self.api.clone();
        let name = state.name.clone();
        state
            .snapshot
            .spawn_reporting(self.config.detail_interval(), move |reporter| {
                let api = api.clone();
                let name = name.clone();
                async move {
                    tokio::join!(
                        async { reporter.send(SnapshotPart::Endpoint(api.get_endpoint(&name).await)) },
                        async { reporter.send(SnapshotPart::Workers(api.list_workers(&name).await)) },
                        async {
                            reporter.send(SnapshotPart::Statistics(api.task_statistics(&name).await))
                        },
                    );
                }
            });
    }

    /// Applies snapshot parts, shared with the worker drawer.
    pub(crate) fn apply_snapshot(&mut self) {
        if let Some(state) = self.state.endpoint.as_mut() {
            for part in state.snapshot.drain() {
                state.apply(part);
            }
        }
    }

    pub(crate) fn tick_endpoint(&mut self, tab: &EndpointTab) {
        self.apply_snapshot();
        let api = self.api.clone();
        let Some(state) = self.state.endpoint.as_mut() else {
            return;
        };

        state.overview.tick();
        let mut notices = state.settings.tick();
        let refresh = notices.iter().any(Result::is_ok);
        match tab {
            EndpointTab::Metrics => state.metrics.tick(),
            EndpointTab::Tasks => notices.extend(state.tasks.tick(&api)),
            _ => {}
        }

        for notice in notices {
            self.notify_outcome(notice);
        }
        if refresh {
            self.start_snapshot();
        }
    }

    /// Stops what `from` polls and starts what `to` polls.
    fn switch_tab(&mut self, from: EndpointTab, to: EndpointTab) {
        let api = self.api.clone();
        let (stats_period, live_period) = (self.config.stats_interval(), self.config.detail_interval());
        let tasks_period = self.config.detail_interval();
        let Some(state) = self.state.endpoint.as_mut() else {
            return;
        };

        match from {
            EndpointTab::Metrics => state.metrics.stop(),
            EndpointTab::Tasks => state.tasks.stop(),
            _ => {}
        }
        match to {
            EndpointTab::Metrics => {
                state
                    .metrics
                    .start(&api, &state.name, stats_period, live_period)
            }
            EndpointTab::Tasks => state.tasks.start(&api, tasks_period),
            _ => {}
        }
        self.view = AppView::Endpoint(to);
    }

    /// Leaves the detail view, cancelling everything it polls.
    fn close_endpoint(&mut self) {
        self.state.endpoint = None;
        self.open_endpoints();
    }

    pub fn draw_endpoint(&mut self, frame: &mut Frame, tab: &EndpointTab) {
        let area = frame.area();

        let vertical = Layout::vertical([
            Constraint::Length(3), // Title
            Constraint::Length(5), // Header
            Constraint::Length(2), // Tabs
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer
        ]);
        let [title_area, header_area, tabs_area, content_area, footer_area] = vertical.areas(area);

        let Some(state) = self.state.endpoint.as_ref() else {
            return;
        };
        let title = Line::from(state.name.clone()).bold().cyan().centered();
        frame.render_widget(Paragraph::new(title), title_area);

        if let Some(missing) = state.missing.clone() {
            let text = vec![
                Line::from(""),
                Line::from(missing).bold().red(),
                Line::from(""),
                Line::from("It may have been deleted, press Esc to go back."),
            ];
            frame.render_widget(
                Paragraph::new(text).block(Block::bordered()).centered(),
                header_area.union(content_area),
            );
            self.draw_footer(frame, footer_area, "Esc: Back");
            return;
        }

        if state.endpoint.is_none() {
            frame.render_widget(
                Paragraph::new("Loading endpoint...")
                    .block(Block::bordered())
                    .centered(),
                header_area.union(content_area),
            );
            self.draw_footer(frame, footer_area, "Esc: Back");
            return;
        }

        draw_header(frame, header_area, state);

        let tabs = Tabs::new(EndpointTab::ALL.iter().map(|t| t.title()))
            .select(tab.index())
            .highlight_style(
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .divider("|");
        frame.render_widget(tabs, tabs_area);

        let help = match tab {
            EndpointTab::Overview => self.draw_overview(frame, content_area),
            EndpointTab::Metrics => self.draw_metrics(frame, content_area),
            EndpointTab::Workers => self.draw_workers(frame, content_area),
            EndpointTab::Tasks => match self.state.endpoint.as_mut() {
                Some(state) => {
                    state.tasks.draw(frame, content_area);
                    state.tasks.help()
                }
                None => "",
            },
            EndpointTab::Settings => self.draw_endpoint_settings(frame, content_area),
        };

        let footer = format!("Tab: Next tab  |  {}  |  Esc: Back", help);
        self.draw_footer(frame, footer_area, &footer);
    }

    pub fn handle_endpoint_input(&mut self, key: KeyEvent, tab: &EndpointTab) {
        if let (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) =
            (key.modifiers, key.code)
        {
            self.quit();
            return;
        }

        let Some(state) = self.state.endpoint.as_ref() else {
            self.open_endpoints();
            return;
        };
        if state.missing.is_some() || state.endpoint.is_none() {
            if key.code == KeyCode::Esc {
                self.close_endpoint();
            }
            return;
        }

        // fields being edited get every key
        let capturing = match tab {
            EndpointTab::Tasks => state.tasks.is_capturing(),
            EndpointTab::Settings => state.settings.is_editing(),
            _ => false,
        };
        if !capturing {
            match key.code {
                KeyCode::Tab => return self.switch_tab(*tab, tab.next()),
                KeyCode::BackTab => return self.switch_tab(*tab, tab.prev()),
                KeyCode::Esc => return self.close_endpoint(),
                _ => {}
            }
        }

        match tab {
            EndpointTab::Overview => self.handle_overview_input(key),
            EndpointTab::Metrics => self.handle_metrics_input(key),
            EndpointTab::Workers => self.handle_workers_input(key),
            EndpointTab::Tasks => {
                let api = self.api.clone();
                if let Some(state) = self.state.endpoint.as_mut() {
                    state.tasks.handle_key(key, &api);
                }
            }
            EndpointTab::Settings => self.handle_endpoint_settings_input(key),
        }
    }
}

/// A labelled counter of the header.
fn card<'a>(label: &'a str, value: String, color: Color) -> Vec<Span<'a>> {
    vec![
        Span::styled(format!(" {} ", label), Style::default().fg(Color::DarkGray)),
        Span::styled(value, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::raw("   "),
    ]
}

fn draw_header(frame: &mut Frame, area: Rect, state: &EndpointState) {
    let Some(endpoint) = &state.endpoint else {
        return;
    };
    let stats = state.statistics.clone().unwrap_or_default();

    let info = Line::from(vec![
        " Status: ".dim(),
        Span::styled(
            endpoint.status.clone(),
            Style::default().fg(status_color(&endpoint.status)),
        ),
        "   Spec: ".dim(),
        endpoint.spec_name.clone().into(),
        "   Cluster: ".dim(),
        endpoint.cluster_id.clone().into(),
        "   Price: ".dim(),
        format!("${:.2}/hr", endpoint.price_per_hour).into(),
        "   Created: ".dim(),
        local_date(endpoint.created_at.as_deref()).into(),
    ]);
    let image = Line::from(vec![" Image: ".dim(), endpoint.image.clone().into()]);

    let mut cards = Vec::new();
    cards.extend(card(
        "Workers",
        format!("{}/{}", stats.busy_workers, stats.online_workers),
        Color::Cyan,
    ));
    cards.extend(card(
        "Replicas",
        format!("{}/{}", endpoint.ready_replicas, endpoint.replicas),
        Color::Green,
    ));
    cards.extend(card("Running", stats.running_tasks.to_string(), Color::Cyan));
    cards.extend(card("Pending", stats.pending_tasks.to_string(), Color::Yellow));
    cards.extend(card("Total", stats.total_tasks().to_string(), Color::White));

    frame.render_widget(
        Paragraph::new(vec![info, image, Line::from(cards)]).block(Block::bordered()),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn endpoint() -> Endpoint {
        serde_json::from_str(
            r#"{"name": "my-endpoint", "replicas": 2, "readyReplicas": 1, "status": "Running"}"#,
        )
        .unwrap()
    }

    fn worker() -> Worker {
        serde_json::from_str(
            r#"{"id": "w-1", "status": "online", "current_jobs": 1, "concurrency": 2}"#,
        )
        .unwrap()
    }

    fn transient() -> ApiError {
        ApiError::Api {
            status: StatusCode::BAD_GATEWAY,
            message: "upstream down".to_string(),
        }
    }

    #[test]
    fn test_parts_apply_in_any_order() {
        let mut state = EndpointState::new("my-endpoint");
        state.apply(SnapshotPart::Statistics(Err(transient())));
        state.apply(SnapshotPart::Workers(Ok(vec![worker()])));
        assert!(state.endpoint.is_none());
        assert_eq!(state.workers.len(), 1);
        assert!(state.statistics.is_none());

        state.apply(SnapshotPart::Endpoint(Ok(endpoint())));
        let endpoint = state.endpoint.as_ref().unwrap();
        assert_eq!((endpoint.replicas, endpoint.ready_replicas), (2, 1));

        let summary = crate::common::WorkerSummary::of(&state.workers);
        assert_eq!(
            (summary.active, summary.idle, summary.total, summary.jobs),
            (1, 0, 1, 1)
        );
    }

    #[test]
    fn test_only_first_primary_failure_is_terminal() {
        let mut state = EndpointState::new("gone");
        state.apply(SnapshotPart::Endpoint(Err(ApiError::NotFound("gone".to_string()))));
        assert_eq!(state.missing.as_deref(), Some("Endpoint not found"));

        let mut state = EndpointState::new("my-endpoint");
        state.apply(SnapshotPart::Endpoint(Ok(endpoint())));
        state.apply(SnapshotPart::Endpoint(Err(transient())));
        assert!(state.missing.is_none());
        assert_eq!(state.endpoint.as_ref().unwrap().name, "my-endpoint");
    }

    #[test]
    fn test_secondary_failure_substitutes_defaults() {
        let mut state = EndpointState::new("my-endpoint");
        state.apply(SnapshotPart::Workers(Ok(vec![worker()])));
        state.apply(SnapshotPart::Workers(Err(transient())));
        assert!(state.workers.is_empty());
        assert!(state.missing.is_none());
    }

    #[test]
    fn test_tab_cycle() {
        assert_eq!(EndpointTab::Overview.prev(), EndpointTab::Settings);
        assert_eq!(EndpointTab::Settings.next(), EndpointTab::Overview);
        assert_eq!(EndpointTab::Metrics.next(), EndpointTab::Workers);
    }
}
