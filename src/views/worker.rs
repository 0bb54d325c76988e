use crate::common::{ApiResult, Worker};
use crate::constants::LOG_TAIL_HINT;
use crate::endpoint::EndpointTab;
use crate::monitor::{Feed, TerminalRelay, TerminalStatus};
use crate::task_list::TaskListState;
use crate::utils::{idle_tag, time_ago};
use crate::views::status_color;
use crate::widgets::TerminalView;
use crate::{App, AppView};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Paragraph, Tabs},
};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum WorkerTab {
    #[default]
    Tasks,
    Logs,
    Exec,
}

impl WorkerTab {
    pub const ALL: [WorkerTab; 3] = [WorkerTab::Tasks, WorkerTab::Logs, WorkerTab::Exec];

    pub fn title(&self) -> &'static str {
        match self {
            WorkerTab::Tasks => "Tasks",
            WorkerTab::Logs => "Logs",
            WorkerTab::Exec => "Exec",
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }
}

/// Drawer of one worker, opened from the workers tab of its endpoint.
#[derive(Debug)]
pub struct WorkerState {
    pub endpoint: String,
    /// Latest copy of the worker, refreshed with the endpoint snapshot.
    pub worker: Worker,
    pub tasks: TaskListState,
    pub logs: Feed<ApiResult<String>>,
    pub log_text: Option<String>,
    pub log_error: Option<String>,
    /// Lines scrolled up from the bottom of the logs.
    pub log_scroll: u16,
    /// Shell of the worker, only alive on the exec tab.
    pub terminal: Option<TerminalRelay>,
    pub terminal_error: Option<String>,
    /// Rows and columns the shell was last drawn with.
    pub term_size: (u16, u16),
}

impl WorkerState {
    pub fn new(endpoint: String, worker: Worker) -> Self {
        let tasks = TaskListState::for_worker(&endpoint, worker.task_key());
        Self {
            endpoint,
            worker,
            tasks,
            logs: Feed::new(),
            log_text: None,
            log_error: None,
            log_scroll: 0,
            terminal: None,
            terminal_error: None,
            term_size: (20, 100),
        }
    }

    fn apply_logs(&mut self) {
        if let Some(result) = self.logs.latest() {
            match result {
                Ok(text) => {
                    self.log_text = Some(text);
                    self.log_error = None;
                    self.log_scroll = 0;
                }
                Err(err) => self.log_error = Some(err.to_string()),
            }
        }
    }

    fn scroll_logs(&mut self, delta: i32) {
        let lines = self
            .log_text
            .as_deref()
            .map(|text| text.lines().count())
            .unwrap_or(0);
        let max = lines.min(u16::MAX as usize) as i32;
        self.log_scroll = (self.log_scroll as i32 + delta).clamp(0, max) as u16;
    }
}

impl App {
    /// Opens the drawer of `worker` on its tasks tab.
    pub(crate) fn open_worker(&mut self, endpoint: String, worker: Worker) {
        let mut state = WorkerState::new(endpoint, worker);
        state.tasks.start(&self.api, self.config.detail_interval());
        self.state.worker = Some(state);
        self.view = AppView::Worker(WorkerTab::Tasks);
    }

    fn fetch_logs(&mut self) {
        let api = self.api.clone();
        let Some(state) = self.state.worker.as_mut() else {
            return;
        };
        let endpoint = state.endpoint.clone();
        let pod_name = state.worker.address().to_string();
        state
            .logs
            .spawn_once(async move { api.worker_logs(&endpoint, &pod_name).await });
    }

    /// Opens a fresh shell, replacing any previous one.
    fn connect_terminal(&mut self) {
        let Some(state) = self.state.worker.as_mut() else {
            return;
        };
        match self.api.exec_url(&state.endpoint, state.worker.address()) {
            Ok(url) => {
                tracing::info!("opening shell on worker {}", state.worker.label());
                let (rows, cols) = state.term_size;
                state.terminal = Some(TerminalRelay::connect(
                    url,
                    self.api.handshake_headers(),
                    rows,
                    cols,
                ));
                state.terminal_error = None;
            }
            Err(err) => {
                state.terminal = None;
                state.terminal_error = Some(err.to_string());
            }
        }
    }

    fn switch_worker_tab(&mut self, from: WorkerTab, to: WorkerTab) {
        let period = self.config.detail_interval();
        let api = self.api.clone();
        let Some(state) = self.state.worker.as_mut() else {
            return;
        };

        match from {
            WorkerTab::Tasks => state.tasks.stop(),
            WorkerTab::Logs => state.logs.stop(),
            WorkerTab::Exec => state.terminal = None,
        }
        match to {
            WorkerTab::Tasks => state.tasks.start(&api, period),
            WorkerTab::Logs => self.fetch_logs(),
            WorkerTab::Exec => self.connect_terminal(),
        }
        self.view = AppView::Worker(to);
    }

    /// Closes the drawer, the shell and every worker fetch with it.
    fn close_worker(&mut self) {
        self.state.worker = None;
        self.view = AppView::Endpoint(EndpointTab::Workers);
    }

    pub(crate) fn tick_worker(&mut self, tab: &WorkerTab) {
        // the endpoint keeps refreshing behind the drawer
        self.apply_snapshot();
        let api = self.api.clone();
        let latest = match (self.state.endpoint.as_ref(), self.state.worker.as_ref()) {
            (Some(endpoint), Some(state)) => endpoint
                .workers
                .iter()
                .find(|w| w.label() == state.worker.label())
                .cloned(),
            _ => None,
        };
        let Some(state) = self.state.worker.as_mut() else {
            return;
        };
        if let Some(worker) = latest {
            state.worker = worker;
        }

        let mut notices = Vec::new();
        match tab {
            WorkerTab::Tasks => notices = state.tasks.tick(&api),
            WorkerTab::Logs => state.apply_logs(),
            WorkerTab::Exec => {
                if let Some(terminal) = state.terminal.as_mut() {
                    terminal.pump();
                }
            }
        }
        for notice in notices {
            self.notify_outcome(notice);
        }
    }

    pub fn draw_worker(&mut self, frame: &mut Frame, tab: &WorkerTab) {
        let area = frame.area();

        let vertical = Layout::vertical([
            Constraint::Length(3), // Title
            Constraint::Length(3), // Header
            Constraint::Length(2), // Tabs
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer
        ]);
        let [title_area, header_area, tabs_area, content_area, footer_area] = vertical.areas(area);

        let Some(state) = self.state.worker.as_mut() else {
            return;
        };
        let title = Line::from(format!("{} / {}", state.endpoint, state.worker.label()))
            .bold()
            .cyan()
            .centered();
        frame.render_widget(Paragraph::new(title), title_area);

        let now = Utc::now();
        let worker = &state.worker;
        let header = Line::from(vec![
            " Status: ".dim(),
            Span::styled(worker.status_upper(), Style::default().fg(status_color(&worker.status))),
            "   Jobs: ".dim(),
            format!("{}/{}", worker.current_jobs, worker.concurrency).into(),
            "   Idle: ".dim(),
            idle_tag(worker.current_jobs, worker.last_task_time.as_deref(), now).into(),
            "   Heartbeat: ".dim(),
            time_ago(worker.last_heartbeat.as_deref(), now).into(),
            "   Pod: ".dim(),
            worker.address().to_string().into(),
        ]);
        frame.render_widget(Paragraph::new(header).block(Block::bordered()), header_area);

        let tabs = Tabs::new(WorkerTab::ALL.iter().map(|t| t.title()))
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
            WorkerTab::Tasks => {
                state.tasks.draw(frame, content_area);
                if state.tasks.is_capturing() {
                    state.tasks.help()
                } else {
                    "Tab: Next tab  |  Esc: Back  |  ↑↓: Select  |  Enter: Detail  |  f: Status  |  ←→: Page  |  c: Cancel"
                }
            }
            WorkerTab::Logs => {
                draw_logs(frame, content_area, state);
                "Tab: Next tab  |  Esc: Back  |  ↑↓ PgUp PgDn: Scroll  |  r: Refresh"
            }
            WorkerTab::Exec => {
                draw_exec(frame, content_area, state);
                "Keys go to the shell  |  F5: Reconnect  |  Ctrl+Q: Leave shell"
            }
        };
        self.draw_footer(frame, footer_area, help);
    }

    pub fn handle_worker_input(&mut self, key: KeyEvent, tab: &WorkerTab) {
        let api = self.api.clone();
        let Some(state) = self.state.worker.as_mut() else {
            return self.close_worker();
        };

        if *tab == WorkerTab::Exec {
            match (key.modifiers, key.code) {
                (KeyModifiers::CONTROL, KeyCode::Char('q') | KeyCode::Char('Q')) => {
                    self.switch_worker_tab(WorkerTab::Exec, WorkerTab::Tasks);
                }
                (_, KeyCode::F(5)) => match state.terminal.as_mut() {
                    Some(terminal) => terminal.reconnect(),
                    None => self.connect_terminal(),
                },
                _ => {
                    if let Some(terminal) = &state.terminal {
                        terminal.send_key(key);
                    }
                }
            }
            return;
        }

        if let (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) =
            (key.modifiers, key.code)
        {
            return self.quit();
        }

        let capturing = *tab == WorkerTab::Tasks && state.tasks.is_capturing();
        if !capturing {
            match key.code {
                KeyCode::Tab => return self.switch_worker_tab(*tab, tab.next()),
                KeyCode::Esc => return self.close_worker(),
                _ => {}
            }
        }

        match tab {
            WorkerTab::Tasks => {
                state.tasks.handle_key(key, &api);
            }
            WorkerTab::Logs => match key.code {
                KeyCode::Up => state.scroll_logs(1),
                KeyCode::Down => state.scroll_logs(-1),
                KeyCode::PageUp => state.scroll_logs(20),
                KeyCode::PageDown => state.scroll_logs(-20),
                KeyCode::End => state.log_scroll = 0,
                KeyCode::Char('r') => self.fetch_logs(),
                _ => {}
            },
            WorkerTab::Exec => {}
        }
    }
}

fn draw_logs(frame: &mut Frame, area: Rect, state: &WorkerState) {
    let block = Block::bordered().title(format!(" {} ", LOG_TAIL_HINT));

    let lines: Vec<Line> = match (&state.log_text, &state.log_error) {
        (_, Some(err)) if state.log_text.is_none() => {
            vec![Line::from(format!("Failed to load logs: {}", err)).red()]
        }
        (None, _) if state.logs.is_active() => vec![Line::from("Loading logs...").dim()],
        (None, _) => vec![Line::from("No logs").dim()],
        (Some(text), _) if text.trim().is_empty() => vec![Line::from("No logs").dim()],
        (Some(text), _) => text.lines().map(|l| Line::from(l.to_string())).collect(),
    };

    // stick to the bottom unless scrolled up
    let visible = area.height.saturating_sub(2) as usize;
    let bottom = lines.len().saturating_sub(visible);
    let top = bottom.saturating_sub(state.log_scroll as usize);

    let block = match &state.log_error {
        Some(err) if state.log_text.is_some() => {
            block.title_bottom(Line::from(format!(" Refresh failed: {} ", err)).red())
        }
        _ => block,
    };
    frame.render_widget(
        Paragraph::new(lines)
            .scroll((top.min(u16::MAX as usize) as u16, 0))
            .block(block),
        area,
    );
}

fn draw_exec(frame: &mut Frame, area: Rect, state: &mut WorkerState) {
    let status = match (&state.terminal, &state.terminal_error) {
        (Some(terminal), _) => match terminal.status() {
            TerminalStatus::Disconnected(Some(reason)) => {
                Line::from(format!(" Disconnected: {} ", reason)).red()
            }
            TerminalStatus::Disconnected(None) => Line::from(" Disconnected ").red(),
            TerminalStatus::Connected => Line::from(" Connected ").green(),
            TerminalStatus::Connecting => Line::from(" Connecting... ").yellow(),
        },
        (None, Some(err)) => Line::from(format!(" {} ", err)).red(),
        (None, None) => Line::from(" Disconnected ").red(),
    };
    let block = Block::bordered().title(" Shell ").title(status.right_aligned());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    state.term_size = (inner.height, inner.width);
    let Some(terminal) = state.terminal.as_mut() else {
        frame.render_widget(
            Paragraph::new("Press F5 to connect").dim().centered(),
            inner,
        );
        return;
    };
    terminal.resize(inner.height, inner.width);
    let connected = *terminal.status() == TerminalStatus::Connected;
    frame.render_widget(TerminalView::new(terminal.screen()).show_cursor(connected), inner);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker() -> Worker {
        Worker {
            id: "w-1".to_string(),
            pod_name: "my-endpoint-abc".to_string(),
            status: "online".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_worker_tasks_are_scoped() {
        let state = WorkerState::new("my-endpoint".to_string(), worker());
        // tasks record the worker id, the pod name only addresses exec and logs
        assert_eq!(state.tasks.query.worker_id.as_deref(), Some("w-1"));
        assert_eq!(state.worker.address(), "my-endpoint-abc");
        assert!(state.terminal.is_none());
    }

    #[test]
    fn test_worker_tab_cycle() {
        assert_eq!(WorkerTab::Tasks.next(), WorkerTab::Logs);
        assert_eq!(WorkerTab::Exec.next(), WorkerTab::Tasks);
    }

    #[test]
    fn test_log_scroll_is_bounded() {
        let mut state = WorkerState::new("my-endpoint".to_string(), worker());
        state.log_text = Some("a\nb\nc".to_string());
        state.scroll_logs(10);
        assert_eq!(state.log_scroll, 3);
        state.scroll_logs(-20);
        assert_eq!(state.log_scroll, 0);
    }
}
