use crate::common::WorkerSummary;
use crate::utils::{idle_tag, time_ago};
use crate::views::status_color;
use crate::widgets::SelectTable;
use crate::App;
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Style, Stylize},
    text::Line,
    widgets::{Block, Paragraph, Row},
};

impl App {
    pub(crate) fn draw_workers(&mut self, frame: &mut Frame, area: Rect) -> &'static str {
        let Some(state) = self.state.endpoint.as_mut() else {
            return "";
        };

        let [summary_area, table_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(area);

        let summary = WorkerSummary::of(&state.workers);
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                " Active: ".dim(),
                summary.active.to_string().cyan().bold(),
                "   Idle: ".dim(),
                summary.idle.to_string().bold(),
                "   Total: ".dim(),
                summary.total.to_string().bold(),
                "   Jobs: ".dim(),
                summary.jobs.to_string().green().bold(),
            ])),
            summary_area,
        );

        if state.workers.is_empty() {
            frame.render_widget(
                Paragraph::new("No workers running")
                    .block(Block::bordered())
                    .centered(),
                table_area,
            );
            return "r: Refresh";
        }

        let now = Utc::now();
        let rows: Vec<Row> = state
            .workers
            .iter()
            .map(|w| {
                Row::new(vec![
                    Line::from(w.label().to_string()),
                    Line::from(w.status_upper()).style(Style::default().fg(status_color(&w.status))),
                    Line::from(format!("{}/{}", w.current_jobs, w.concurrency)),
                    Line::from(w.total_tasks_completed.to_string()),
                    Line::from(w.total_tasks_failed.to_string()),
                    Line::from(idle_tag(w.current_jobs, w.last_task_time.as_deref(), now)),
                    Line::from(time_ago(w.last_heartbeat.as_deref(), now)),
                    Line::from(w.version.clone().unwrap_or_else(|| "-".to_string())),
                ])
            })
            .collect();

        let table = SelectTable::new(
            rows,
            [
                Constraint::Fill(3),
                Constraint::Length(10),
                Constraint::Length(6),
                Constraint::Length(10),
                Constraint::Length(7),
                Constraint::Length(10),
                Constraint::Length(11),
                Constraint::Fill(1),
            ],
        )
        .header(Row::new(vec![
            "Worker",
            "Status",
            "Jobs",
            "Completed",
            "Failed",
            "Idle",
            "Heartbeat",
            "Version",
        ]))
        .block(Block::bordered());
        frame.render_stateful_widget(table, table_area, &mut state.worker_selection);

        "↑↓: Select  |  Enter: Open worker  |  r: Refresh"
    }

    pub(crate) fn handle_workers_input(&mut self, key: KeyEvent) {
        let Some(state) = self.state.endpoint.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Up => state.worker_selection.move_up(),
            KeyCode::Down => state.worker_selection.move_down(state.workers.len()),
            KeyCode::Char('r') => self.start_snapshot(),
            KeyCode::Enter => {
                let worker = state.workers.get(state.worker_selection.selected()).cloned();
                if let Some(worker) = worker {
                    let endpoint = state.name.clone();
                    self.open_worker(endpoint, worker);
                }
            }
            _ => {}
        }
    }
}
