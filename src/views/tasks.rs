use crate::common::{ApiResult, TasksOverview};
use crate::monitor::Feed;
use crate::task_list::{TaskListState, TaskScope};
use crate::{App, AppView};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Paragraph},
};

/// Tasks across every endpoint.
#[derive(Debug)]
pub struct TasksState {
    pub overview: Feed<ApiResult<TasksOverview>>,
    pub counters: Option<TasksOverview>,
    pub list: TaskListState,
}

impl Default for TasksState {
    fn default() -> Self {
        Self {
            overview: Feed::new(),
            counters: None,
            list: TaskListState::new(TaskScope::All),
        }
    }
}

impl App {
    pub(crate) fn open_tasks(&mut self) {
        let api = self.api.clone();
        self.state
            .tasks
            .overview
            .spawn_every(self.config.endpoints_interval(), move || {
                let api = api.clone();
                async move { api.tasks_overview().await }
            });
        self.state
            .tasks
            .list
            .start(&self.api, self.config.detail_interval());
        self.view = AppView::Tasks;
    }

    pub(crate) fn tick_tasks(&mut self) {
        let state = &mut self.state.tasks;
        if let Some(result) = state.overview.latest() {
            match result {
                Ok(counters) => state.counters = Some(counters),
                // counters stay as they were
                Err(err) => tracing::debug!("tasks overview refresh failed: {}", err),
            }
        }

        let notices = state.list.tick(&self.api);
        for notice in notices {
            self.notify_outcome(notice);
        }
    }

    pub fn draw_tasks(&mut self, frame: &mut Frame) {
        let area = frame.area();

        let vertical = Layout::vertical([
            Constraint::Length(3), // Title
            Constraint::Length(3), // Counters
            Constraint::Min(0),    // List
            Constraint::Length(3), // Footer
        ]);
        let [title_area, counters_area, list_area, footer_area] = vertical.areas(area);

        let title = Line::from("Tasks").bold().cyan().centered();
        frame.render_widget(Paragraph::new(title), title_area);

        let state = &mut self.state.tasks;
        let counters = match &state.counters {
            Some(c) => {
                let mut spans = Vec::new();
                for (label, value, color) in [
                    ("Completed", c.completed, Color::Green),
                    ("In progress", c.in_progress, Color::Cyan),
                    ("Pending", c.pending, Color::Yellow),
                    ("Failed", c.failed, Color::Red),
                ] {
                    spans.push(Span::styled(
                        format!(" {} ", label),
                        Style::default().fg(Color::DarkGray),
                    ));
                    spans.push(Span::styled(
                        value.to_string(),
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    ));
                    spans.push(Span::raw("   "));
                }
                Line::from(spans)
            }
            None => Line::from(" Loading counters...").dim(),
        };
        frame.render_widget(Paragraph::new(counters).block(Block::bordered()), counters_area);

        state.list.draw(frame, list_area);
        let help = if state.list.is_capturing() {
            state.list.help().to_string()
        } else {
            format!("{}  |  Esc: Back", state.list.help())
        };
        self.draw_footer(frame, footer_area, &help);
    }

    pub fn handle_tasks_input(&mut self, key: KeyEvent) {
        if let (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) =
            (key.modifiers, key.code)
        {
            self.quit();
            return;
        }

        let state = &mut self.state.tasks;
        if key.code == KeyCode::Esc && !state.list.is_capturing() {
            state.overview.stop();
            state.list.stop();
            self.view = AppView::Menu;
            return;
        }
        state.list.handle_key(key, &self.api);
    }
}
