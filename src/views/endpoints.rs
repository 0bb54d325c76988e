use crate::common::{ApiResult, EndpointSummary, EndpointUpdate};
use crate::monitor::Feed;
use crate::views::status_color;
use crate::widgets::{SelectTable, SelectionState};
use crate::{App, AppView};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Style, Stylize},
    text::Line,
    widgets::{Block, Clear, Paragraph, Row, Wrap},
};
use tui_input::Input;
use tui_input::backend::crossterm::EventHandler;

#[derive(Debug, Clone, PartialEq)]
pub enum EndpointsView {
    List,
    /// Typing into the name filter.
    Filter,
    /// Asking before scaling the named endpoint to zero.
    ConfirmStop(String),
    /// Asking before deleting the named endpoint.
    ConfirmDelete(String),
}

#[derive(Debug, Default)]
pub struct EndpointsState {
    pub feed: Feed<ApiResult<Vec<EndpointSummary>>>,
    /// Outcome of stop and delete requests.
    pub actions: Feed<Result<String, String>>,
    pub endpoints: Vec<EndpointSummary>,
    pub loaded: bool,
    pub error: Option<String>,
    pub filter: Input,
    pub selection: SelectionState,
}

impl EndpointsState {
    /// Endpoints whose name contains the filter, ignoring case.
    pub fn visible(&self) -> Vec<&EndpointSummary> {
        let needle = self.filter.value().trim().to_lowercase();
        self.endpoints
            .iter()
            .filter(|e| needle.is_empty() || e.logical_name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn selected(&self) -> Option<&EndpointSummary> {
        self.visible().get(self.selection.selected()).copied()
    }

    fn apply(&mut self, result: ApiResult<Vec<EndpointSummary>>) {
        match result {
            Ok(endpoints) => {
                self.endpoints = endpoints;
                self.error = None;
            }
            Err(err) => {
                // keep the previous list, the next poll retries
                tracing::debug!("endpoint list refresh failed: {}", err);
                self.error = Some(err.to_string());
            }
        }
        self.loaded = true;
    }
}

impl App {
    /// Shows the endpoints list and (re)starts its refresh.
    pub(crate) fn open_endpoints(&mut self) {
        let api = self.api.clone();
        self.state
            .endpoints
            .feed
            .spawn_every(self.config.endpoints_interval(), move || {
                let api = api.clone();
                async move { api.list_endpoints().await }
            });
        self.view = AppView::Endpoints(EndpointsView::List);
    }

    pub(crate) fn tick_endpoints(&mut self, _view: &EndpointsView) {
        for result in self.state.endpoints.feed.drain() {
            self.state.endpoints.apply(result);
        }

        let outcomes = self.state.endpoints.actions.drain();
        let refresh = outcomes.iter().any(Result::is_ok);
        for outcome in outcomes {
            self.notify_outcome(outcome);
        }
        if refresh {
            self.open_endpoints_keep_view();
        }
    }

    /// Restarts the refresh without touching the current view.
    fn open_endpoints_keep_view(&mut self) {
        let view = self.view.clone();
        self.open_endpoints();
        self.view = view;
    }

    pub fn draw_endpoints(&mut self, frame: &mut Frame, view: &EndpointsView) {
        let area = frame.area();

        let vertical = Layout::vertical([
            Constraint::Length(3), // Title
            Constraint::Length(1), // Filter
            Constraint::Min(0),    // Table
            Constraint::Length(3), // Footer
        ]);
        let [title_area, filter_area, table_area, footer_area] = vertical.areas(area);

        let title = Line::from("Endpoints").bold().cyan().centered();
        frame.render_widget(Paragraph::new(title), title_area);

        // Filter
        let state = &mut self.state.endpoints;
        let filter_line = if *view == EndpointsView::Filter || !state.filter.value().is_empty() {
            Line::from(vec![" Filter: ".dim(), state.filter.value().to_string().yellow()])
        } else {
            Line::from(" Press / to filter by name").dim()
        };
        frame.render_widget(Paragraph::new(filter_line), filter_area);
        if *view == EndpointsView::Filter {
            let x = filter_area.x + 9 + state.filter.visual_cursor() as u16;
            frame.set_cursor_position((x, filter_area.y));
        }

        // Table
        if !state.loaded {
            frame.render_widget(
                Paragraph::new("Loading endpoints...")
                    .block(Block::bordered())
                    .centered(),
                table_area,
            );
        } else if state.endpoints.is_empty() {
            let text = match &state.error {
                Some(err) => Line::from(format!("Error: {}", err)).red(),
                None => Line::from("No endpoints deployed"),
            };
            frame.render_widget(
                Paragraph::new(text).block(Block::bordered()).centered(),
                table_area,
            );
        } else {
            let rows: Vec<Row> = state
                .visible()
                .into_iter()
                .map(|e| {
                    Row::new(vec![
                        Line::from(e.logical_name.clone()),
                        Line::from(e.spec_name.clone()),
                        Line::from(e.cluster_id.clone()),
                        Line::from(format!("{}/{}", e.current_replicas, e.replicas)),
                        Line::from(format!("${:.2}", e.price_per_hour)),
                        Line::from(e.status.clone()).style(Style::default().fg(status_color(&e.status))),
                    ])
                })
                .collect();

            let mut block = Block::bordered().title(format!(" {} endpoints ", rows.len()));
            if let Some(err) = &state.error {
                block = block.title_bottom(Line::from(format!(" Refresh failed: {} ", err)).red());
            }

            let table = SelectTable::new(
                rows,
                [
                    Constraint::Fill(3),
                    Constraint::Fill(2),
                    Constraint::Fill(2),
                    Constraint::Length(9),
                    Constraint::Length(10),
                    Constraint::Length(10),
                ],
            )
            .header(Row::new(vec![
                "Name", "Spec", "Cluster", "Replicas", "Price/hr", "Status",
            ]))
            .block(block);
            frame.render_stateful_widget(table, table_area, &mut state.selection);
        }

        // Confirmation
        match view {
            EndpointsView::ConfirmStop(name) => draw_confirm(
                frame,
                area,
                &format!("Stop {}? Its replicas are scaled to 0.", name),
            ),
            EndpointsView::ConfirmDelete(name) => draw_confirm(
                frame,
                area,
                &format!("Delete {}? This cannot be undone.", name),
            ),
            _ => {}
        }

        let help = match view {
            EndpointsView::Filter => "Enter: Apply  |  Esc: Clear filter",
            EndpointsView::ConfirmStop(_) | EndpointsView::ConfirmDelete(_) => {
                "y: Confirm  |  n/Esc: Cancel"
            }
            EndpointsView::List => {
                "↑↓: Select  |  Enter: Open  |  /: Filter  |  x: Stop  |  d: Delete  |  Esc: Back"
            }
        };
        self.draw_footer(frame, footer_area, help);
    }

    pub fn handle_endpoints_input(&mut self, key: KeyEvent, view: &EndpointsView) {
        if let (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) =
            (key.modifiers, key.code)
        {
            self.quit();
            return;
        }

        match view {
            EndpointsView::Filter => match key.code {
                KeyCode::Enter => self.view = AppView::Endpoints(EndpointsView::List),
                KeyCode::Esc => {
                    self.state.endpoints.filter.reset();
                    self.view = AppView::Endpoints(EndpointsView::List);
                }
                _ => {
                    self.state.endpoints.filter.handle_event(&Event::Key(key));
                    self.state.endpoints.selection.reset();
                }
            },
            EndpointsView::ConfirmStop(name) => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.stop_endpoint(name.clone());
                    self.view = AppView::Endpoints(EndpointsView::List);
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.view = AppView::Endpoints(EndpointsView::List)
                }
                _ => {}
            },
            EndpointsView::ConfirmDelete(name) => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.delete_endpoint(name.clone());
                    self.view = AppView::Endpoints(EndpointsView::List);
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.view = AppView::Endpoints(EndpointsView::List)
                }
                _ => {}
            },
            EndpointsView::List => match key.code {
                KeyCode::Esc => {
                    self.state.endpoints.feed.stop();
                    self.view = AppView::Menu;
                }
                KeyCode::Up => self.state.endpoints.selection.move_up(),
                KeyCode::Down => {
                    let len = self.state.endpoints.visible().len();
                    self.state.endpoints.selection.move_down(len);
                }
                KeyCode::Char('/') => self.view = AppView::Endpoints(EndpointsView::Filter),
                KeyCode::Char('r') => self.open_endpoints(),
                KeyCode::Char('x') => {
                    if let Some(e) = self.state.endpoints.selected() {
                        self.view =
                            AppView::Endpoints(EndpointsView::ConfirmStop(e.logical_name.clone()));
                    }
                }
                KeyCode::Char('d') => {
                    if let Some(e) = self.state.endpoints.selected() {
                        self.view = AppView::Endpoints(EndpointsView::ConfirmDelete(
                            e.logical_name.clone(),
                        ));
                    }
                }
                KeyCode::Enter => {
                    if let Some(name) = self.state.endpoints.selected().map(|e| e.logical_name.clone())
                    {
                        self.state.endpoints.feed.stop();
                        self.open_endpoint(name);
                    }
                }
                _ => {}
            },
        }
    }

    fn stop_endpoint(&mut self, name: String) {
        let api = self.api.clone();
        self.state.endpoints.actions.detach(async move {
            let update = EndpointUpdate {
                replicas: Some(0),
                ..Default::default()
            };
            match api.update_endpoint(&name, &update).await {
                Ok(()) => Ok(format!("Endpoint {} stopped", name)),
                Err(err) => Err(format!("Failed to stop {}: {}", name, err)),
            }
        });
    }

    fn delete_endpoint(&mut self, name: String) {
        let api = self.api.clone();
        self.state.endpoints.actions.detach(async move {
            match api.delete_endpoint(&name).await {
                Ok(()) => Ok(format!("Endpoint {} deleted", name)),
                Err(err) => Err(format!("Failed to delete {}: {}", name, err)),
            }
        });
    }
}

/// Small centered popup with a question.
pub(crate) fn draw_confirm(frame: &mut Frame, area: Rect, question: &str) {
    let [popup] = Layout::horizontal([Constraint::Length(56)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::vertical([Constraint::Length(5)])
        .flex(Flex::Center)
        .areas(popup);

    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(vec![Line::from(question), Line::from(""), Line::from("[y]es / [n]o").bold()])
            .block(Block::bordered().title(" Confirm ").yellow())
            .wrap(Wrap { trim: true })
            .centered(),
        popup,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: &str) -> EndpointSummary {
        EndpointSummary {
            logical_name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_filter_by_name() {
        let mut state = EndpointsState::default();
        state.apply(Ok(vec![
            summary("flux-dev"),
            summary("whisper"),
            summary("Flux-Schnell"),
        ]));
        assert_eq!(state.visible().len(), 3);

        state.filter = Input::new("flux".to_string());
        let names: Vec<_> = state.visible().iter().map(|e| e.logical_name.as_str()).collect();
        assert_eq!(names, vec!["flux-dev", "Flux-Schnell"]);

        state.selection.select(1);
        assert_eq!(state.selected().unwrap().logical_name, "Flux-Schnell");
    }

    #[test]
    fn test_failed_refresh_keeps_list() {
        let mut state = EndpointsState::default();
        state.apply(Ok(vec![summary("flux-dev")]));
        state.apply(Err(crate::common::ApiError::NotFound("gone".to_string())));
        assert_eq!(state.endpoints.len(), 1);
        assert!(state.error.is_some());
        assert!(state.loaded);
    }
}
