use crate::App;
use crate::common::{ApiResult, Submission, SubmitMode, Task, parse_task_input};
use crate::constants::DEFAULT_TASK_INPUT;
use crate::monitor::Feed;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::Line,
    widgets::{Block, Paragraph, Wrap},
};
use tui_input::Input;
use tui_input::backend::crossterm::EventHandler;
use url::Url;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum OverviewFocus {
    #[default]
    Payload,
    TaskId,
}

/// Submit and status-query panel of an endpoint.
#[derive(Debug)]
pub struct OverviewState {
    pub mode: SubmitMode,
    pub focus: OverviewFocus,
    pub payload: Input,
    pub task_id: Input,
    pub submission: Feed<ApiResult<Submission>>,
    pub status: Feed<ApiResult<Task>>,
    /// Pretty JSON of the last response.
    pub response: Option<String>,
    /// Validation or request failure, shown in place of the response.
    pub error: Option<String>,
}

impl Default for OverviewState {
    fn default() -> Self {
        Self {
            mode: SubmitMode::default(),
            focus: OverviewFocus::default(),
            payload: Input::new(DEFAULT_TASK_INPUT.to_string()),
            task_id: Input::default(),
            submission: Feed::new(),
            status: Feed::new(),
            response: None,
            error: None,
        }
    }
}

impl OverviewState {
    pub fn is_busy(&self) -> bool {
        self.submission.is_active() || self.status.is_active()
    }

    pub fn tick(&mut self) {
        if let Some(result) = self.submission.latest() {
            match result {
                Ok(submission) => {
                    if let Some(id) = submission.task_id() {
                        self.task_id = Input::new(id.to_string());
                    }
                    self.response = Some(submission.pretty());
                    self.error = None;
                }
                Err(err) => self.error = Some(err.to_string()),
            }
        }

        if let Some(result) = self.status.latest() {
            match result {
                Ok(task) => {
                    self.response = Some(
                        serde_json::to_string_pretty(&task).unwrap_or_else(|e| e.to_string()),
                    );
                    self.error = None;
                }
                Err(err) => self.error = Some(err.to_string()),
            }
        }
    }
}

/// Ready-to-copy `curl` call submitting `input` to `endpoint`.
pub fn curl_example(base_url: &Url, endpoint: &str, mode: SubmitMode, input: &str) -> String {
    let input = match parse_task_input(input) {
        Ok(value) => value.to_string(),
        Err(_) => input.trim().to_string(),
    };
    format!(
        "curl -X POST {}/v1/{}/{} \\\n  -H \"Authorization: Bearer $WAVERLESS_API_KEY\" \\\n  -H \"Content-Type: application/json\" \\\n  -d '{{\"input\": {}}}'",
        base_url.as_str().trim_end_matches('/'),
        endpoint,
        mode.path(),
        input
    )
}

impl App {
    pub(crate) fn draw_overview(&mut self, frame: &mut Frame, area: Rect) -> &'static str {
        let base_url = self.api.base_url().clone();
        let Some(state) = self.state.endpoint.as_mut() else {
            return "";
        };
        let overview = &state.overview;

        let [left, right] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(area);
        let [payload_area, task_id_area, curl_area] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .areas(left);

        let focused = |focus: OverviewFocus| {
            if overview.focus == focus {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            }
        };

        // Inputs
        let mode = match overview.mode {
            SubmitMode::Async => " Input (run, async) ",
            SubmitMode::Sync => " Input (runsync, wait for result) ",
        };
        for (input, input_area, title, focus) in [
            (&overview.payload, payload_area, mode, OverviewFocus::Payload),
            (&overview.task_id, task_id_area, " Task id ", OverviewFocus::TaskId),
        ] {
            // keep 2 for borders and 1 for cursor
            let width = input_area.width.max(3) - 3;
            let scroll = input.visual_scroll(width as usize);
            frame.render_widget(
                Paragraph::new(input.value())
                    .scroll((0, scroll as u16))
                    .block(Block::bordered().title(title).border_style(focused(focus))),
                input_area,
            );
            if overview.focus == focus {
                let x = input.visual_cursor().max(scroll) - scroll + 1;
                frame.set_cursor_position((input_area.x + x as u16, input_area.y + 1));
            }
        }

        // curl
        let curl = curl_example(&base_url, &state.name, overview.mode, overview.payload.value());
        frame.render_widget(
            Paragraph::new(curl)
                .block(Block::bordered().title(" Example "))
                .style(Style::default().fg(Color::DarkGray))
                .wrap(Wrap { trim: false }),
            curl_area,
        );

        // Response
        let response: Vec<Line> = match (&overview.error, &overview.response) {
            (Some(err), _) => vec![Line::from(err.clone()).red()],
            _ if overview.is_busy() => vec![Line::from("Waiting for the server...").yellow()],
            (None, Some(response)) => response.lines().map(|l| Line::from(l.to_string())).collect(),
            (None, None) => vec![Line::from("Submit a task or query one by id").dim()],
        };
        frame.render_widget(
            Paragraph::new(response)
                .block(Block::bordered().title(" Response "))
                .wrap(Wrap { trim: false }),
            right,
        );

        "↑↓: Field  |  Enter: Submit / Query  |  Ctrl+T: run / runsync"
    }

    pub(crate) fn handle_overview_input(&mut self, key: KeyEvent) {
        let api = self.api.clone();
        let Some(state) = self.state.endpoint.as_mut() else {
            return;
        };
        let name = state.name.clone();
        let overview = &mut state.overview;

        match (key.modifiers, key.code) {
            (_, KeyCode::Up) => overview.focus = OverviewFocus::Payload,
            (_, KeyCode::Down) => overview.focus = OverviewFocus::TaskId,
            (KeyModifiers::CONTROL, KeyCode::Char('t')) => overview.mode = overview.mode.toggle(),
            (_, KeyCode::Enter) => match overview.focus {
                OverviewFocus::Payload => {
                    let raw = overview.payload.value().to_string();
                    // nothing is sent for malformed input
                    if let Err(err) = parse_task_input(&raw) {
                        overview.error = Some(err);
                        return;
                    }
                    let mode = overview.mode;
                    overview.error = None;
                    overview.response = None;
                    overview
                        .submission
                        .spawn_once(async move { api.submit_task(&name, mode, &raw).await });
                }
                OverviewFocus::TaskId => {
                    let task_id = overview.task_id.value().trim().to_string();
                    if task_id.is_empty() {
                        overview.error = Some("Enter a task id first".to_string());
                        return;
                    }
                    overview.error = None;
                    overview
                        .status
                        .spawn_once(async move { api.task_status(&task_id).await });
                }
            },
            _ => {
                let event = Event::Key(key);
                match overview.focus {
                    OverviewFocus::Payload => overview.payload.handle_event(&event),
                    OverviewFocus::TaskId => overview.task_id.handle_event(&event),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curl_example() {
        let base = Url::parse("https://api.example.com/").unwrap();
        let curl = curl_example(&base, "my-endpoint", SubmitMode::Sync, r#"{ "prompt": "hi" }"#);
        assert!(curl.starts_with("curl -X POST https://api.example.com/v1/my-endpoint/runsync"));
        assert!(curl.ends_with(r#"-d '{"input": {"prompt":"hi"}}'"#));

        let curl = curl_example(&base, "my-endpoint", SubmitMode::Async, "not json");
        assert!(curl.contains("/v1/my-endpoint/run \\"));
        assert!(curl.ends_with(r#"-d '{"input": not json}'"#));
    }

    #[tokio::test]
    async fn test_submission_fills_task_id() {
        let mut state = OverviewState::default();
        let response = serde_json::json!({"id": "t-7", "status": "IN_QUEUE"});
        state.submission.spawn_once(async move { Ok(Submission { response }) });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        state.tick();
        assert_eq!(state.task_id.value(), "t-7");
        assert!(state.response.as_deref().unwrap().contains("IN_QUEUE"));
        assert!(state.error.is_none());
    }
}
