use crate::common::{ApiResult, Spec};
use crate::deploy::DeployForm;
use crate::monitor::Feed;
use crate::widgets::{FormAction, SelectTable, SelectionState, draw_form};
use crate::{App, AppView};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::Stylize,
    text::Line,
    widgets::{Block, Paragraph, Row},
};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum SpecFilter {
    #[default]
    All,
    Gpu,
    Cpu,
}

impl SpecFilter {
    pub fn next(&self) -> Self {
        match self {
            SpecFilter::All => SpecFilter::Gpu,
            SpecFilter::Gpu => SpecFilter::Cpu,
            SpecFilter::Cpu => SpecFilter::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SpecFilter::All => "All",
            SpecFilter::Gpu => "GPU",
            SpecFilter::Cpu => "CPU",
        }
    }

    pub fn matches(&self, spec: &Spec) -> bool {
        match self {
            SpecFilter::All => true,
            SpecFilter::Gpu => spec.is_gpu(),
            SpecFilter::Cpu => !spec.is_gpu(),
        }
    }
}

/// Catalog of hardware specs, endpoints are created from here.
#[derive(Debug, Default)]
pub struct SpecsState {
    pub feed: Feed<ApiResult<Vec<Spec>>>,
    pub specs: Vec<Spec>,
    pub loaded: bool,
    pub error: Option<String>,
    pub filter: SpecFilter,
    pub selection: SelectionState,
    /// Open create-endpoint form.
    pub deploy: Option<DeployForm>,
    /// Outcome of create requests.
    pub actions: Feed<Result<String, String>>,
}

impl SpecsState {
    pub fn visible(&self) -> Vec<&Spec> {
        self.specs.iter().filter(|s| self.filter.matches(s)).collect()
    }

    pub fn selected(&self) -> Option<&Spec> {
        self.visible().get(self.selection.selected()).copied()
    }
}

impl App {
    pub(crate) fn open_specs(&mut self) {
        let api = self.api.clone();
        self.state
            .specs
            .feed
            .spawn_once(async move { api.specs().await });
        self.view = AppView::Specs;
    }

    pub(crate) fn tick_specs(&mut self) {
        let state = &mut self.state.specs;
        if let Some(result) = state.feed.latest() {
            match result {
                Ok(specs) => {
                    state.specs = specs;
                    state.error = None;
                }
                Err(err) => state.error = Some(err.to_string()),
            }
            state.loaded = true;
            let len = state.visible().len();
            state.selection.clamp(len);
        }

        for outcome in self.state.specs.actions.drain() {
            self.notify_outcome(outcome);
        }
    }

    pub fn draw_specs(&mut self, frame: &mut Frame) {
        let area = frame.area();

        let vertical = Layout::vertical([
            Constraint::Length(3), // Title
            Constraint::Min(0),    // Table
            Constraint::Length(3), // Footer
        ]);
        let [title_area, table_area, footer_area] = vertical.areas(area);

        let title = Line::from("Specs").bold().cyan().centered();
        frame.render_widget(Paragraph::new(title), title_area);

        let state = &mut self.state.specs;
        if !state.loaded {
            frame.render_widget(
                Paragraph::new("Loading specs...")
                    .block(Block::bordered())
                    .centered(),
                table_area,
            );
        } else if let (Some(err), true) = (&state.error, state.specs.is_empty()) {
            frame.render_widget(
                Paragraph::new(Line::from(format!("Error: {}", err)).red())
                    .block(Block::bordered())
                    .centered(),
                table_area,
            );
        } else {
            let rows: Vec<Row> = state
                .visible()
                .into_iter()
                .map(|s| {
                    let capacity = match (s.available_capacity, s.total_capacity) {
                        (Some(available), Some(total)) => format!("{}/{}", available, total),
                        _ => "-".to_string(),
                    };
                    Row::new(vec![
                        Line::from(s.spec_name.clone()),
                        Line::from(s.spec_type.to_uppercase()),
                        Line::from(s.compute()),
                        Line::from(format!("{} GB", s.ram_gb)),
                        Line::from(format!("${:.2}", s.price_per_hour)),
                        Line::from(capacity),
                    ])
                })
                .collect();

            let block = Block::bordered().title(format!(
                " {} specs ({}) ",
                rows.len(),
                state.filter.label()
            ));
            let table = SelectTable::new(
                rows,
                [
                    Constraint::Fill(2),
                    Constraint::Length(6),
                    Constraint::Fill(2),
                    Constraint::Length(8),
                    Constraint::Length(10),
                    Constraint::Length(10),
                ],
            )
            .header(Row::new(vec![
                "Name", "Type", "Compute", "Memory", "Price/hr", "Capacity",
            ]))
            .block(block);
            frame.render_stateful_widget(table, table_area, &mut state.selection);
        }

        if let Some(form) = &state.deploy {
            draw_form(frame, area, form);
        }

        let help = if state.deploy.is_some() {
            "↑↓: Field  |  Enter: Next / Create  |  Ctrl+S: Create  |  Esc: Cancel"
        } else {
            "↑↓: Select  |  Enter: Create endpoint  |  t: GPU / CPU  |  r: Refresh  |  Esc: Back"
        };
        self.draw_footer(frame, footer_area, help);
    }

    pub fn handle_specs_input(&mut self, key: KeyEvent) {
        if let (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) =
            (key.modifiers, key.code)
        {
            self.quit();
            return;
        }

        if let Some(form) = self.state.specs.deploy.as_mut() {
            match form.handle_key(key) {
                FormAction::Cancel => self.state.specs.deploy = None,
                FormAction::Submit => self.create_endpoint(),
                FormAction::None => {}
            }
            return;
        }

        match (key.modifiers, key.code) {
            (_, KeyCode::Esc) => {
                self.state.specs.feed.stop();
                self.view = AppView::Menu;
            }
            (_, KeyCode::Up) => self.state.specs.selection.move_up(),
            (_, KeyCode::Down) => {
                let len = self.state.specs.visible().len();
                self.state.specs.selection.move_down(len);
            }
            (_, KeyCode::Char('t')) => {
                let state = &mut self.state.specs;
                state.filter = state.filter.next();
                state.selection.reset();
            }
            (_, KeyCode::Char('r')) => self.open_specs(),
            (_, KeyCode::Enter) => {
                if let Some(spec) = self.state.specs.selected() {
                    self.state.specs.deploy = Some(DeployForm::for_spec(spec));
                }
            }
            _ => {}
        }
    }

    /// Sends the form, which stays open with the error when it does not validate.
    fn create_endpoint(&mut self) {
        let Some(form) = self.state.specs.deploy.as_mut() else {
            return;
        };
        let draft = match form.draft() {
            Ok(draft) => draft,
            Err(err) => {
                form.error = Some(err);
                return;
            }
        };

        self.state.specs.deploy = None;
        let api = self.api.clone();
        self.state.specs.actions.detach(async move {
            match api.create_endpoint(&draft).await {
                Ok(()) => {
                    tracing::info!("created endpoint {} on {}", draft.logical_name, draft.spec_name);
                    Ok(format!("Endpoint {} created", draft.logical_name))
                }
                Err(err) => Err(format!("Failed to create {}: {}", draft.logical_name, err)),
            }
        });
    }
}
