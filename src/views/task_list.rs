use crate::common::{ApiClient, ApiResult, Task, TaskDetail, TaskPage, TaskQuery};
use crate::endpoints::draw_confirm;
use crate::monitor::Feed;
use crate::utils::{local_time, millis, truncate};
use crate::views::status_color;
use crate::widgets::{SelectTable, SelectionState};
use crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Style, Stylize},
    text::Line,
    widgets::{Block, Clear, Paragraph, Row, Wrap},
};
use std::time::Duration;
use tui_input::Input;
use tui_input::backend::crossterm::EventHandler;

/// Which tasks a list shows.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskScope {
    /// Every endpoint, the endpoint can be filtered on.
    All,
    Endpoint(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchField {
    TaskId,
    Endpoint,
}

/// Drill-down popup of one task.
#[derive(Debug)]
pub enum TaskPopup {
    Loading(String),
    Loaded(Box<TaskDetail>),
    Failed(String),
}

/// A filterable, paginated task table refreshed in the background.
#[derive(Debug)]
pub struct TaskListState {
    pub scope: TaskScope,
    pub query: TaskQuery,
    pub page: Feed<ApiResult<TaskPage>>,
    pub tasks: Vec<Task>,
    pub total: u64,
    pub loaded: bool,
    pub error: Option<String>,
    pub selection: SelectionState,
    /// Search field being typed into.
    pub search: Option<(SearchField, Input)>,
    pub detail: Feed<ApiResult<TaskDetail>>,
    pub popup: Option<TaskPopup>,
    /// Task waiting for a cancel confirmation.
    pub confirm_cancel: Option<String>,
    /// Outcome of cancel requests.
    pub cancels: Feed<Result<String, String>>,
    period: Duration,
}

impl TaskListState {
    pub fn new(scope: TaskScope) -> Self {
        Self {
            scope,
            query: TaskQuery::default(),
            page: Feed::new(),
            tasks: Vec::new(),
            total: 0,
            loaded: false,
            error: None,
            selection: SelectionState::new(),
            search: None,
            detail: Feed::new(),
            popup: None,
            confirm_cancel: None,
            cancels: Feed::new(),
            period: Duration::from_secs(5),
        }
    }

    /// Tasks of `endpoint` that ran on `worker_id`.
    pub fn for_worker(endpoint: &str, worker_id: &str) -> Self {
        let mut state = Self::new(TaskScope::Endpoint(endpoint.to_string()));
        state.query.worker_id = Some(worker_id.to_string());
        state
    }

    /// Fetches the current page now and then every `period`.
    pub fn start(&mut self, api: &ApiClient, period: Duration) {
        self.period = period;
        let api = api.clone();
        let scope = self.scope.clone();
        let query = self.query.clone();
        self.page.spawn_every(period, move || {
            let api = api.clone();
            let scope = scope.clone();
            let query = query.clone();
            async move {
                match &scope {
                    TaskScope::All => api.all_tasks(&query).await,
                    TaskScope::Endpoint(name) => api.endpoint_tasks(name, &query).await,
                }
            }
        });
    }

    fn restart(&mut self, api: &ApiClient) {
        self.selection.reset();
        self.start(api, self.period);
    }

    pub fn stop(&mut self) {
        self.page.stop();
        self.detail.stop();
    }

    /// Whether keys should go to this list before anything else.
    pub fn is_capturing(&self) -> bool {
        self.search.is_some() || self.popup.is_some() || self.confirm_cancel.is_some()
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.tasks.get(self.selection.selected())
    }

    fn apply_page(&mut self, result: ApiResult<TaskPage>) {
        match result {
            Ok(page) => {
                self.tasks = page.tasks;
                self.total = page.total;
                self.error = None;
                self.selection.clamp(self.tasks.len());
            }
            Err(err) => {
                tracing::debug!("task list refresh failed: {}", err);
                self.error = Some(err.to_string());
            }
        }
        self.loaded = true;
    }

    /// Applies background results, returns cancel outcomes to notify about.
    pub fn tick(&mut self, api: &ApiClient) -> Vec<Result<String, String>> {
        for result in self.page.drain() {
            self.apply_page(result);
        }

        if let Some(result) = self.detail.latest() {
            self.popup = Some(match result {
                Ok(detail) => TaskPopup::Loaded(Box::new(detail)),
                Err(err) => TaskPopup::Failed(err.to_string()),
            });
        }

        let outcomes = self.cancels.drain();
        if outcomes.iter().any(Result::is_ok) {
            self.start(api, self.period);
            // the popup shows a status that just changed
            if let Some(TaskPopup::Loaded(detail)) = &self.popup {
                let id = detail.task.id.clone();
                self.open_detail(api, id);
            }
        }
        outcomes
    }

    fn open_detail(&mut self, api: &ApiClient, task_id: String) {
        let api = api.clone();
        self.popup = Some(TaskPopup::Loading(task_id.clone()));
        self.detail
            .spawn_once(async move { api.task_detail(&task_id).await });
    }

    /// Asks for confirmation when `task` may be cancelled.
    fn ask_cancel(&mut self, task: Option<&Task>) {
        if let Some(task) = task.filter(|t| t.status.is_cancellable()) {
            self.confirm_cancel = Some(task.id.clone());
        }
    }

    fn cancel(&mut self, api: &ApiClient, task_id: String) {
        let api = api.clone();
        self.cancels.detach(async move {
            match api.cancel_task(&task_id).await {
                Ok(()) => Ok(format!("Task {} cancelled", task_id)),
                Err(err) => Err(err.to_string()),
            }
        });
    }

    /// Handles `key`, returns `false` when the list has no use for it.
    pub fn handle_key(&mut self, key: KeyEvent, api: &ApiClient) -> bool {
        if let Some(task_id) = self.confirm_cancel.take() {
            if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                self.cancel(api, task_id);
            }
            return true;
        }

        if let Some((field, input)) = self.search.as_mut() {
            match key.code {
                KeyCode::Enter => {
                    let value = input.value().trim().to_string();
                    let value = (!value.is_empty()).then_some(value);
                    match field {
                        SearchField::TaskId => self.query.task_id = value,
                        SearchField::Endpoint => self.query.endpoint = value,
                    }
                    self.query.offset = 0;
                    self.search = None;
                    self.restart(api);
                }
                KeyCode::Esc => self.search = None,
                _ => {
                    input.handle_event(&Event::Key(key));
                }
            }
            return true;
        }

        if self.popup.is_some() {
            match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => {
                    self.popup = None;
                    self.detail.stop();
                }
                KeyCode::Char('c') => {
                    let task = match &self.popup {
                        Some(TaskPopup::Loaded(detail)) => Some(detail.task.clone()),
                        _ => None,
                    };
                    self.ask_cancel(task.as_ref());
                }
                _ => {}
            }
            return true;
        }

        match key.code {
            KeyCode::Up => self.selection.move_up(),
            KeyCode::Down => self.selection.move_down(self.tasks.len()),
            KeyCode::Left => {
                if self.query.prev_page() {
                    self.restart(api);
                }
            }
            KeyCode::Right => {
                if self.query.next_page(self.total) {
                    self.restart(api);
                }
            }
            KeyCode::Char('f') => {
                self.query.cycle_status();
                self.restart(api);
            }
            KeyCode::Char('p') => {
                self.query.cycle_page_size();
                self.restart(api);
            }
            KeyCode::Char('/') => {
                let current = self.query.task_id.clone().unwrap_or_default();
                self.search = Some((SearchField::TaskId, Input::new(current)));
            }
            KeyCode::Char('e') if self.scope == TaskScope::All => {
                let current = self.query.endpoint.clone().unwrap_or_default();
                self.search = Some((SearchField::Endpoint, Input::new(current)));
            }
            KeyCode::Char('c') => {
                let task = self.selected_task().cloned();
                self.ask_cancel(task.as_ref());
            }
            KeyCode::Char('r') => self.start(api, self.period),
            KeyCode::Enter => {
                if let Some(id) = self.selected_task().map(|t| t.id.clone()) {
                    self.open_detail(api, id);
                }
            }
            _ => return false,
        }
        true
    }

    /// One line describing the active filters and the page.
    fn filter_line(&self) -> Line<'static> {
        let status = self.query.status.map(|s| s.as_str()).unwrap_or("all");
        let mut spans = vec![" Status: ".dim(), status.to_string().yellow()];
        if let Some(id) = &self.query.task_id {
            spans.push("  Task: ".dim());
            spans.push(id.clone().yellow());
        }
        if let Some(endpoint) = &self.query.endpoint {
            spans.push("  Endpoint: ".dim());
            spans.push(endpoint.clone().yellow());
        }
        if let Some(worker) = &self.query.worker_id {
            spans.push("  Worker: ".dim());
            spans.push(worker.clone().yellow());
        }
        spans.push(
            format!(
                "  |  Page {} of {}  |  {} per page  |  {} tasks",
                self.query.page() + 1,
                self.query.page_count(self.total),
                self.query.limit,
                self.total
            )
            .dim(),
        );
        Line::from(spans)
    }

    pub fn draw(&mut self, frame: &mut Frame, area: Rect) {
        let [filter_area, table_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(area);

        // Filters, or the search being typed
        match &self.search {
            Some((field, input)) => {
                let label = match field {
                    SearchField::TaskId => " Task id: ",
                    SearchField::Endpoint => " Endpoint: ",
                };
                frame.render_widget(
                    Paragraph::new(Line::from(vec![
                        label.dim(),
                        input.value().to_string().yellow(),
                    ])),
                    filter_area,
                );
                let x = filter_area.x + label.len() as u16 + input.visual_cursor() as u16;
                frame.set_cursor_position((x, filter_area.y));
            }
            None => frame.render_widget(Paragraph::new(self.filter_line()), filter_area),
        }

        if !self.loaded {
            frame.render_widget(
                Paragraph::new("Loading tasks...")
                    .block(Block::bordered())
                    .centered(),
                table_area,
            );
        } else if self.tasks.is_empty() {
            let text = match &self.error {
                Some(err) => Line::from(format!("Error: {}", err)).red(),
                None => Line::from("No tasks found"),
            };
            frame.render_widget(
                Paragraph::new(text).block(Block::bordered()).centered(),
                table_area,
            );
        } else {
            let show_endpoint = self.scope == TaskScope::All;
            let rows: Vec<Row> = self
                .tasks
                .iter()
                .map(|t| {
                    let mut cells = vec![Line::from(t.id.clone())];
                    if show_endpoint {
                        cells.push(Line::from(t.endpoint.clone()));
                    }
                    cells.extend([
                        Line::from(t.status.as_str())
                            .style(Style::default().fg(status_color(t.status.as_str()))),
                        Line::from(truncate(t.worker(), 24)),
                        Line::from(millis(t.delay_time)),
                        Line::from(millis(t.execution_time)),
                        Line::from(local_time(t.created_at.as_deref())),
                    ]);
                    Row::new(cells)
                })
                .collect();

            let mut header = vec!["Task"];
            let mut widths = vec![Constraint::Fill(3)];
            if show_endpoint {
                header.push("Endpoint");
                widths.push(Constraint::Fill(2));
            }
            header.extend(["Status", "Worker", "Delay", "Execution", "Created"]);
            widths.extend([
                Constraint::Length(12),
                Constraint::Fill(2),
                Constraint::Length(9),
                Constraint::Length(10),
                Constraint::Length(20),
            ]);

            let mut block = Block::bordered();
            if let Some(err) = &self.error {
                block = block.title_bottom(Line::from(format!(" Refresh failed: {} ", err)).red());
            }
            let table = SelectTable::new(rows, widths)
                .header(Row::new(header))
                .block(block);
            frame.render_stateful_widget(table, table_area, &mut self.selection);
        }

        if let Some(popup) = &self.popup {
            draw_popup(frame, area, popup);
        }
        if let Some(task_id) = &self.confirm_cancel {
            draw_confirm(frame, area, &format!("Cancel task {}?", task_id));
        }
    }

    pub fn help(&self) -> &'static str {
        if self.confirm_cancel.is_some() {
            "y: Confirm  |  n/Esc: Keep the task"
        } else if self.search.is_some() {
            "Enter: Search  |  Esc: Cancel"
        } else if self.popup.is_some() {
            "c: Cancel task  |  Esc: Close"
        } else if self.scope == TaskScope::All {
            "Enter: Detail  |  f: Status  |  /: Task id  |  e: Endpoint  |  p: Page size  |  ←→: Page  |  c: Cancel"
        } else {
            "Enter: Detail  |  f: Status  |  /: Task id  |  p: Page size  |  ←→: Page  |  c: Cancel"
        }
    }
}

fn draw_popup(frame: &mut Frame, area: Rect, popup: &TaskPopup) {
    let [popup_area] = Layout::horizontal([Constraint::Percentage(80)])
        .flex(Flex::Center)
        .areas(area);
    let [popup_area] = Layout::vertical([Constraint::Percentage(80)])
        .flex(Flex::Center)
        .areas(popup_area);
    frame.render_widget(Clear, popup_area);

    let (title, lines) = match popup {
        TaskPopup::Loading(id) => (id.clone(), vec![Line::from("Loading task...")]),
        TaskPopup::Failed(err) => (
            "Task".to_string(),
            vec![Line::from(format!("Error: {}", err)).red()],
        ),
        TaskPopup::Loaded(detail) => (detail.task.id.clone(), detail_lines(detail)),
    };

    frame.render_widget(
        Paragraph::new(lines)
            .block(Block::bordered().title(format!(" {} ", title)).cyan())
            .wrap(Wrap { trim: false }),
        popup_area,
    );
}

fn pretty(value: &Option<serde_json::Value>) -> String {
    match value {
        Some(value) => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        None => "-".to_string(),
    }
}

fn detail_lines(detail: &TaskDetail) -> Vec<Line<'static>> {
    let task = &detail.task;
    let mut lines = vec![
        Line::from(vec![
            "Status:    ".dim(),
            task.status.as_str().fg(status_color(task.status.as_str())),
        ]),
        Line::from(vec!["Endpoint:  ".dim(), task.endpoint.clone().into()]),
        Line::from(vec!["Worker:    ".dim(), task.worker().to_string().into()]),
        Line::from(vec!["Created:   ".dim(), local_time(task.created_at.as_deref()).into()]),
        Line::from(vec!["Delay:     ".dim(), millis(task.delay_time).into()]),
        Line::from(vec!["Execution: ".dim(), millis(task.execution_time).into()]),
    ];
    if let Some(err) = &task.error {
        lines.push(Line::from(vec!["Error:     ".dim(), err.clone().red()]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from("Input").bold());
    lines.extend(pretty(&task.input).lines().map(|l| Line::from(l.to_string())));
    lines.push(Line::from(""));
    lines.push(Line::from("Output").bold());
    lines.extend(pretty(&task.output).lines().map(|l| Line::from(l.to_string())));

    lines.push(Line::from(""));
    lines.push(Line::from("Timeline").bold());
    if detail.timeline.is_empty() {
        lines.push(Line::from("No events").dim());
    }
    for event in &detail.timeline {
        let transition = match (&event.from_status, &event.to_status) {
            (Some(from), Some(to)) => format!("{} → {}", from, to),
            (None, Some(to)) => to.clone(),
            _ => String::new(),
        };
        let mut line = format!(
            "{}  {:<20} {}",
            local_time(event.event_time.as_deref()),
            event.event_type,
            transition
        );
        if let Some(worker) = event.worker_pod_name.as_ref().or(event.worker_id.as_ref()) {
            line.push_str(&format!("  on {}", worker));
        }
        lines.push(Line::from(line));
        if let Some(err) = &event.error_message {
            lines.push(Line::from(format!("    {}", err)).red());
        }
    }

    lines.push(Line::from(""));
    lines.push(Line::from("Execution history").bold());
    if detail.history.is_empty() {
        lines.push(Line::from("No attempts").dim());
    }
    for attempt in &detail.history {
        let duration = attempt
            .duration_seconds
            .map(crate::utils::duration_secs)
            .unwrap_or_else(|| "-".to_string());
        lines.push(Line::from(format!(
            "{}  {} → {}  ({})",
            attempt.worker_id,
            local_time(attempt.start_time.as_deref()),
            local_time(attempt.end_time.as_deref()),
            duration
        )));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Session, TaskStatus};
    use crate::config::Config;
    use crossterm::event::KeyModifiers;
    use std::sync::Arc;

    fn api(url: &str) -> ApiClient {
        let config = Config {
            api_url: url.to_string(),
            ..Default::default()
        };
        ApiClient::new(&config, Arc::new(Session::new("https://portal.test"))).unwrap()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn task(id: &str, status: TaskStatus) -> Task {
        Task {
            id: id.to_string(),
            status,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_cancel_only_offered_for_live_tasks() {
        let api = api("http://127.0.0.1:9");
        let mut list = TaskListState::new(TaskScope::Endpoint("my-endpoint".to_string()));
        list.apply_page(Ok(TaskPage {
            tasks: vec![
                task("t-done", TaskStatus::Completed),
                task("t-running", TaskStatus::InProgress),
            ],
            total: 2,
        }));

        assert!(list.handle_key(key(KeyCode::Char('c')), &api));
        assert!(list.confirm_cancel.is_none());

        list.handle_key(key(KeyCode::Down), &api);
        list.handle_key(key(KeyCode::Char('c')), &api);
        assert_eq!(list.confirm_cancel.as_deref(), Some("t-running"));

        // anything but y keeps the task
        list.handle_key(key(KeyCode::Esc), &api);
        assert!(list.confirm_cancel.is_none());
    }

    #[tokio::test]
    async fn test_cancel_failure_is_reported_verbatim() {
        let mut server = mockito::Server::new_async().await;
        let cancel = server
            .mock("POST", "/v1/cancel/t-1")
            .with_status(400)
            .with_body(r#"{"error": "task already completed"}"#)
            .create_async()
            .await;

        let api = api(&server.url());
        let mut list = TaskListState::new(TaskScope::All);
        list.apply_page(Ok(TaskPage {
            tasks: vec![task("t-1", TaskStatus::Pending)],
            total: 1,
        }));
        list.handle_key(key(KeyCode::Char('c')), &api);
        list.handle_key(key(KeyCode::Char('y')), &api);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let outcomes = list.tick(&api);
        assert_eq!(outcomes, vec![Err("task already completed".to_string())]);
        cancel.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_resets_paging() {
        let api = api("http://127.0.0.1:9");
        let mut list = TaskListState::new(TaskScope::All);
        list.total = 100;
        list.handle_key(key(KeyCode::Right), &api);
        assert_eq!(list.query.offset, 20);

        list.handle_key(key(KeyCode::Char('/')), &api);
        assert!(list.is_capturing());
        for c in "t-42".chars() {
            list.handle_key(key(KeyCode::Char(c)), &api);
        }
        list.handle_key(key(KeyCode::Enter), &api);

        assert!(!list.is_capturing());
        assert_eq!(list.query.task_id.as_deref(), Some("t-42"));
        assert_eq!(list.query.offset, 0);
        list.stop();
    }

    #[test]
    fn test_filter_line_shows_page() {
        let mut list = TaskListState::new(TaskScope::All);
        list.total = 45;
        list.query.offset = 20;
        let text: String = list
            .filter_line()
            .spans
            .iter()
            .map(|s| s.content.to_string())
            .collect();
        assert!(text.contains("Page 2 of 3"));
        assert!(text.contains("Status: all"));
    }
}
