use crate::App;
use crate::common::{
    ApiClient, ApiResult, Granularity, MetricSample, RealtimeMetrics, StatsSeries, TimeRange,
};
use crate::monitor::{ChartSet, Dimension, Feed};
use crate::utils::millis;
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Chart, Dataset, GraphType, Paragraph},
};
use std::time::Duration;

/// Chart panels of the tab, each plotting a few dimensions.
const PANELS: [(&str, &[Dimension]); 5] = [
    (
        "Requests",
        &[
            Dimension::Submitted,
            Dimension::Completed,
            Dimension::Failed,
            Dimension::Retried,
        ],
    ),
    (
        "Execution time (s)",
        &[
            Dimension::ExecutionP50,
            Dimension::ExecutionP95,
            Dimension::QueueWait,
        ],
    ),
    (
        "Cold starts",
        &[Dimension::ColdStarts, Dimension::ColdStartTime],
    ),
    (
        "Workers",
        &[Dimension::ActiveWorkers, Dimension::IdleWorkers],
    ),
    (
        "Utilization (%) / idle time (s)",
        &[Dimension::Utilization, Dimension::IdleTime],
    ),
];

const COLORS: [Color; 4] = [Color::Cyan, Color::Green, Color::Red, Color::Yellow];

/// Historical charts and the realtime snapshot of an endpoint.
#[derive(Debug)]
pub struct MetricsState {
    pub range: TimeRange,
    /// Keep refreshing while on.
    pub live: bool,
    pub stats: Feed<ApiResult<StatsSeries>>,
    pub realtime: Feed<ApiResult<RealtimeMetrics>>,
    pub samples: Vec<MetricSample>,
    pub granularity: Granularity,
    /// Derived from `samples`, rebuilt on the next draw once dropped.
    charts: Option<ChartSet>,
    pub snapshot: Option<RealtimeMetrics>,
    pub loaded: bool,
    pub error: Option<String>,
    periods: (Duration, Duration),
    api: Option<(ApiClient, String)>,
}

impl Default for MetricsState {
    fn default() -> Self {
        Self {
            range: TimeRange::default(),
            live: true,
            stats: Feed::new(),
            realtime: Feed::new(),
            samples: Vec::new(),
            granularity: Granularity::default(),
            charts: None,
            snapshot: None,
            loaded: false,
            error: None,
            periods: (Duration::from_secs(60), Duration::from_secs(5)),
            api: None,
        }
    }
}

impl MetricsState {
    /// Starts fetching for `name`: stats every `stats_period` and the realtime
    /// snapshot every `live_period` while live, a single fetch of each otherwise.
    pub fn start(
        &mut self,
        api: &ApiClient,
        name: &str,
        stats_period: Duration,
        live_period: Duration,
    ) {
        self.api = Some((api.clone(), name.to_string()));
        self.periods = (stats_period, live_period);
        self.restart();
    }

    fn restart(&mut self) {
        let Some((api, name)) = self.api.clone() else {
            return;
        };
        let range = self.range;
        let (stats_period, live_period) = self.periods;

        let fetch_stats = {
            let (api, name) = (api.clone(), name.clone());
            move || {
                let (api, name) = (api.clone(), name.clone());
                async move { api.endpoint_stats(&name, range, Utc::now()).await }
            }
        };

        if self.live {
            self.stats.spawn_every(stats_period, fetch_stats);
            self.realtime.spawn_every(live_period, move || {
                let (api, name) = (api.clone(), name.clone());
                async move { api.realtime_metrics(&name).await }
            });
        } else {
            self.stats.spawn_once(fetch_stats());
            self.realtime
                .spawn_once(async move { api.realtime_metrics(&name).await });
        }
    }

    pub fn stop(&mut self) {
        self.stats.stop();
        self.realtime.stop();
    }

    /// Switches the window, the last selection wins.
    pub fn select_range(&mut self, range: TimeRange) {
        if range == self.range && self.loaded {
            return;
        }
        self.range = range;
        self.samples.clear();
        self.charts = None;
        self.loaded = false;
        self.restart();
    }

    pub fn toggle_live(&mut self) {
        self.live = !self.live;
        self.restart();
    }

    pub fn tick(&mut self) {
        if let Some(result) = self.stats.latest() {
            match result {
                Ok(series) => {
                    self.samples = series.stats;
                    self.granularity = series.granularity;
                    self.charts = None;
                    self.error = None;
                }
                Err(err) => {
                    // keep what is shown, the next refresh retries
                    tracing::debug!("stats refresh failed: {}", err);
                    self.error = Some(err.to_string());
                }
            }
            self.loaded = true;
        }

        if let Some(result) = self.realtime.latest() {
            match result {
                Ok(snapshot) => self.snapshot = Some(snapshot),
                Err(err) => tracing::debug!("realtime metrics refresh failed: {}", err),
            }
        }
    }

    /// Series for the current samples, built on first use.
    pub fn charts(&mut self) -> &ChartSet {
        let (samples, granularity) = (&self.samples, self.granularity);
        self.charts
            .get_or_insert_with(|| ChartSet::build(samples, granularity))
    }
}

impl App {
    pub(crate) fn draw_metrics(&mut self, frame: &mut Frame, area: Rect) -> &'static str {
        let Some(state) = self.state.endpoint.as_mut() else {
            return "";
        };
        let metrics = &mut state.metrics;

        let [range_area, realtime_area, charts_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .areas(area);

        // Range selector
        let mut spans = vec![Span::raw(" ")];
        for range in TimeRange::ALL {
            let label = format!(" {} ", range.label());
            spans.push(if range == metrics.range {
                label.black().on_cyan().bold()
            } else {
                label.dim()
            });
        }
        spans.push(Span::raw("   "));
        spans.push(if metrics.live {
            "● Live".green()
        } else {
            "○ Paused".dim()
        });
        if metrics.loaded {
            spans.push(format!("   {}", metrics.granularity.label()).dim());
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), range_area);

        // Realtime snapshot
        let realtime = match &metrics.snapshot {
            Some(s) => Line::from(vec![
                " Active workers: ".dim(),
                s.workers.active.to_string().bold(),
                "   Idle: ".dim(),
                s.workers.idle.to_string().bold(),
                "   Completed (1m): ".dim(),
                s.tasks.completed_last_minute.to_string().bold(),
                "   Running: ".dim(),
                s.tasks.running.to_string().bold(),
                "   Avg execution: ".dim(),
                millis(Some(s.performance.avg_execution_ms.round() as u64)).bold(),
                "   Avg queue wait: ".dim(),
                millis(Some(s.performance.avg_queue_wait_ms.round() as u64)).bold(),
            ]),
            None if metrics.live => Line::from(" Waiting for realtime metrics...").dim(),
            None => Line::from(" Realtime metrics are paused, press l to go live").dim(),
        };
        frame.render_widget(
            Paragraph::new(realtime).block(Block::bordered().title(" Now ")),
            realtime_area,
        );

        // Charts
        if !metrics.loaded {
            frame.render_widget(
                Paragraph::new("Loading metrics...")
                    .block(Block::bordered())
                    .centered(),
                charts_area,
            );
        } else if metrics.samples.is_empty() {
            let mut lines = vec![Line::from("No data for selected time range")];
            if let Some(err) = &metrics.error {
                lines.push(Line::from(format!("Error: {}", err)).red());
            }
            frame.render_widget(
                Paragraph::new(lines).block(Block::bordered()).centered(),
                charts_area,
            );
        } else {
            let charts = metrics.charts();
            let [top, bottom] =
                Layout::vertical([Constraint::Percentage(50), Constraint::Percentage(50)])
                    .areas(charts_area);
            let top = Layout::horizontal([Constraint::Ratio(1, 3); 3]).split(top);
            let bottom = Layout::horizontal([Constraint::Ratio(1, 2); 2]).split(bottom);
            for ((title, dims), panel_area) in PANELS.iter().zip(top.iter().chain(bottom.iter())) {
                draw_panel(frame, *panel_area, title, dims, charts);
            }
        }

        "←→: Range  |  l: Live on/off  |  r: Refresh"
    }

    pub(crate) fn handle_metrics_input(&mut self, key: KeyEvent) {
        let Some(state) = self.state.endpoint.as_mut() else {
            return;
        };
        let metrics = &mut state.metrics;
        match key.code {
            KeyCode::Left => metrics.select_range(metrics.range.prev()),
            KeyCode::Right => metrics.select_range(metrics.range.next()),
            KeyCode::Char('l') => metrics.toggle_live(),
            KeyCode::Char('r') => metrics.restart(),
            _ => {}
        }
    }
}

/// One chart with its dimensions, the title carries totals or averages.
fn draw_panel(frame: &mut Frame, area: Rect, title: &str, dims: &[Dimension], charts: &ChartSet) {
    let points: Vec<Vec<(f64, f64)>> = dims.iter().map(|d| charts.points(*d)).collect();
    let datasets: Vec<Dataset> = dims
        .iter()
        .zip(points.iter())
        .enumerate()
        .map(|(i, (dim, data))| {
            Dataset::default()
                .name(dim.name())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(COLORS[i % COLORS.len()]))
                .data(data)
        })
        .collect();

    let summary: Vec<String> = dims
        .iter()
        .map(|d| match d {
            Dimension::Submitted
            | Dimension::Completed
            | Dimension::Failed
            | Dimension::Retried
            | Dimension::ColdStarts => format!("{} {}", d.name(), charts.total(*d)),
            _ => format!("{} avg {:.2}", d.name(), charts.average(*d)),
        })
        .collect();

    let y_max = dims
        .iter()
        .map(|d| charts.max(*d))
        .fold(0.0_f64, f64::max)
        .max(1.0)
        * 1.1;
    let x_max = (charts.len().saturating_sub(1)).max(1) as f64;

    let x_labels: Vec<Span> = match (charts.labels.first(), charts.labels.last()) {
        (Some(first), Some(last)) => vec![Span::raw(first.clone()), Span::raw(last.clone())],
        _ => Vec::new(),
    };

    let chart = Chart::new(datasets)
        .block(
            Block::bordered()
                .title(format!(" {} ", title))
                .title_bottom(Line::from(format!(" {} ", summary.join("  "))).dim()),
        )
        .x_axis(
            Axis::default()
                .bounds([0.0, x_max])
                .labels(x_labels)
                .style(Style::default().fg(Color::DarkGray)),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, y_max])
                .labels(vec![Span::raw("0"), Span::raw(format!("{:.1}", y_max))])
                .style(Style::default().fg(Color::DarkGray)),
        );
    frame.render_widget(chart, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Session;
    use crate::config::Config;
    use std::sync::Arc;

    fn api(url: &str) -> ApiClient {
        let config = Config {
            api_url: url.to_string(),
            ..Default::default()
        };
        ApiClient::new(&config, Arc::new(Session::new("https://portal.test"))).unwrap()
    }

    fn stats_body(samples: usize) -> String {
        let stats: Vec<_> = (0..samples)
            .map(|i| {
                serde_json::json!({
                    "timestamp": format!("2025-03-01T{:02}:00:00Z", i),
                    "tasks_submitted": 1,
                })
            })
            .collect();
        serde_json::json!({ "stats": stats, "granularity": "1h" }).to_string()
    }

    #[tokio::test]
    async fn test_last_range_selection_wins() {
        let mut server = mockito::Server::new_async().await;
        let six_hours = server
            .mock("GET", "/api/v1/endpoints/my-endpoint/stats")
            .match_query(mockito::Matcher::UrlEncoded("granularity".into(), "6h".into()))
            .with_body(stats_body(6))
            .expect_at_most(1)
            .create_async()
            .await;
        let one_day = server
            .mock("GET", "/api/v1/endpoints/my-endpoint/stats")
            .match_query(mockito::Matcher::UrlEncoded("granularity".into(), "24h".into()))
            .with_body(stats_body(24))
            .create_async()
            .await;

        let mut metrics = MetricsState {
            live: false,
            ..Default::default()
        };
        metrics.api = Some((api(&server.url()), "my-endpoint".to_string()));
        metrics.select_range(TimeRange::SixHours);
        metrics.select_range(TimeRange::OneDay);

        tokio::time::sleep(Duration::from_millis(300)).await;
        metrics.tick();

        assert_eq!(metrics.range, TimeRange::OneDay);
        assert_eq!(metrics.samples.len(), 24);
        assert_eq!(metrics.granularity, Granularity::Hour);
        assert_eq!(metrics.charts().total(Dimension::Submitted), 24.0);

        one_day.assert_async().await;
        six_hours.assert_async().await;
    }

    #[tokio::test]
    async fn test_paused_fetches_snapshot_once() {
        let mut server = mockito::Server::new_async().await;
        let realtime = server
            .mock("GET", "/api/v1/endpoints/my-endpoint/metrics")
            .with_body(r#"{"workers": {"active": 2, "idle": 1}, "tasks": {"running": 3}}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/endpoints/my-endpoint/stats")
            .match_query(mockito::Matcher::Any)
            .with_body(stats_body(1))
            .create_async()
            .await;

        let mut metrics = MetricsState {
            live: false,
            ..Default::default()
        };
        metrics.start(
            &api(&server.url()),
            "my-endpoint",
            Duration::from_millis(20),
            Duration::from_millis(20),
        );

        tokio::time::sleep(Duration::from_millis(300)).await;
        metrics.tick();

        let snapshot = metrics.snapshot.clone().unwrap();
        assert_eq!(snapshot.workers.active, 2);
        assert_eq!(snapshot.tasks.running, 3);
        realtime.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_samples() {
        let mut metrics = MetricsState::default();
        metrics.stats.spawn_once(async { Ok(serde_json::from_str(&stats_body(2)).unwrap()) });
        tokio::time::sleep(Duration::from_millis(50)).await;
        metrics.tick();
        assert_eq!(metrics.samples.len(), 2);

        metrics.stats.spawn_once(async {
            Err(crate::common::ApiError::InvalidInput("boom".to_string()))
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        metrics.tick();
        assert_eq!(metrics.samples.len(), 2);
        assert_eq!(metrics.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_empty_charts() {
        let mut metrics = MetricsState::default();
        let charts = metrics.charts();
        assert!(charts.is_empty());
        assert_eq!(charts.average(Dimension::QueueWait), 0.0);
    }
}
