use crate::common::{ApiResult, Cluster, ClusterSpec, ClusterSpecUpdate, NewClusterSpec};
use crate::endpoints::draw_confirm;
use crate::monitor::Feed;
use crate::utils::local_time;
use crate::views::status_color;
use crate::widgets::{FormAction, FormField, FormState, SelectTable, SelectionState, draw_form};
use crate::{App, AppView};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::Line,
    widgets::{Block, Paragraph, Row},
};

#[derive(Debug, Clone, PartialEq)]
pub enum ClustersView {
    List,
    /// Asking before deleting the cluster with this id.
    ConfirmDelete(String),
    /// Specs offered by the cluster with this id.
    Specs(String),
    /// Asking before deleting a spec of a cluster.
    ConfirmDeleteSpec(String, i64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClusterSpecField {
    /// Only on edit.
    Id,
    ClusterSpecName,
    SpecName,
    Total,
    Available,
    Enabled,
}

/// What a submitted cluster spec form sends.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterSpecRequest {
    Create(NewClusterSpec),
    Update(ClusterSpecUpdate),
}

/// Add or edit form of one spec of a cluster, names are fixed once created.
pub type ClusterSpecForm = FormState<ClusterSpecField>;

impl ClusterSpecForm {
    pub fn blank(cluster_id: &str) -> Self {
        FormState::new(
            format!("Add spec to {}", cluster_id),
            vec![
                (ClusterSpecField::ClusterSpecName, FormField::text("Cluster spec:", "")),
                (ClusterSpecField::SpecName, FormField::text("Portal spec:", "")),
                (ClusterSpecField::Total, FormField::text("Total capacity:", 1)),
                (ClusterSpecField::Available, FormField::text("Available:", 1)),
                (ClusterSpecField::Enabled, FormField::toggle("Enabled:", true)),
            ],
        )
        .with_hint("Portal spec is a name from the spec catalog")
    }

    pub fn edit(spec: &ClusterSpec) -> Self {
        FormState::new(
            format!("Edit {}", spec.cluster_spec_name),
            vec![
                (ClusterSpecField::Id, FormField::locked("ID:", spec.id)),
                (
                    ClusterSpecField::ClusterSpecName,
                    FormField::locked("Cluster spec:", &spec.cluster_spec_name),
                ),
                (ClusterSpecField::SpecName, FormField::locked("Portal spec:", &spec.spec_name)),
                (ClusterSpecField::Total, FormField::text("Total capacity:", spec.total_capacity)),
                (ClusterSpecField::Available, FormField::text("Available:", spec.available_capacity)),
                (ClusterSpecField::Enabled, FormField::toggle("Enabled:", spec.is_available)),
            ],
        )
    }

    pub fn request(&self) -> Result<ClusterSpecRequest, String> {
        let total = self.parse(ClusterSpecField::Total)?;
        let available = self.parse(ClusterSpecField::Available)?;
        let enabled = self.is_on(ClusterSpecField::Enabled);

        if self.trimmed(ClusterSpecField::Id).is_empty() {
            let spec = NewClusterSpec {
                cluster_spec_name: self.trimmed(ClusterSpecField::ClusterSpecName),
                spec_name: self.trimmed(ClusterSpecField::SpecName),
                total_capacity: total,
                available_capacity: available,
                is_available: enabled,
            };
            spec.validate()?;
            return Ok(ClusterSpecRequest::Create(spec));
        }

        let id = self.parse(ClusterSpecField::Id)?;
        ClusterSpecUpdate::edit(id, available, total, enabled).map(ClusterSpecRequest::Update)
    }
}

#[derive(Debug, Default)]
pub struct ClustersState {
    pub feed: Feed<ApiResult<Vec<Cluster>>>,
    pub clusters: Vec<Cluster>,
    pub loaded: bool,
    pub error: Option<String>,
    pub selection: SelectionState,

    pub specs_feed: Feed<ApiResult<Vec<ClusterSpec>>>,
    pub specs: Vec<ClusterSpec>,
    pub specs_loaded: bool,
    pub specs_error: Option<String>,
    pub spec_selection: SelectionState,
    /// Open add or edit form of a cluster spec.
    pub form: Option<ClusterSpecForm>,

    /// Outcome of mutations.
    pub actions: Feed<Result<String, String>>,
}

impl ClustersState {
    pub fn selected(&self) -> Option<&Cluster> {
        self.clusters.get(self.selection.selected())
    }

    pub fn selected_spec(&self) -> Option<&ClusterSpec> {
        self.specs.get(self.spec_selection.selected())
    }

    fn apply(&mut self, result: ApiResult<Vec<Cluster>>) {
        match result {
            Ok(clusters) => {
                self.clusters = clusters;
                self.error = None;
            }
            Err(err) => self.error = Some(err.to_string()),
        }
        self.loaded = true;
        self.selection.clamp(self.clusters.len());
    }

    fn apply_specs(&mut self, result: ApiResult<Vec<ClusterSpec>>) {
        match result {
            Ok(specs) => {
                self.specs = specs;
                self.specs_error = None;
            }
            Err(err) => self.specs_error = Some(err.to_string()),
        }
        self.specs_loaded = true;
        self.spec_selection.clamp(self.specs.len());
    }
}

impl App {
    pub(crate) fn open_clusters(&mut self) {
        self.fetch_clusters();
        self.view = AppView::Clusters(ClustersView::List);
    }

    fn fetch_clusters(&mut self) {
        let api = self.api.clone();
        self.state
            .clusters
            .feed
            .spawn_once(async move { api.clusters().await });
    }

    fn fetch_cluster_specs(&mut self, cluster_id: String) {
        let api = self.api.clone();
        self.state
            .clusters
            .specs_feed
            .spawn_once(async move { api.cluster_specs(&cluster_id).await });
    }

    fn open_cluster_specs(&mut self, cluster_id: String) {
        let state = &mut self.state.clusters;
        state.specs.clear();
        state.specs_loaded = false;
        state.specs_error = None;
        state.spec_selection.reset();
        state.form = None;
        self.fetch_cluster_specs(cluster_id.clone());
        self.view = AppView::Clusters(ClustersView::Specs(cluster_id));
    }

    pub(crate) fn tick_clusters(&mut self, view: &ClustersView) {
        if let Some(result) = self.state.clusters.feed.latest() {
            self.state.clusters.apply(result);
        }
        if let Some(result) = self.state.clusters.specs_feed.latest() {
            self.state.clusters.apply_specs(result);
        }

        let outcomes = self.state.clusters.actions.drain();
        let refresh = outcomes.iter().any(Result::is_ok);
        for outcome in outcomes {
            self.notify_outcome(outcome);
        }
        if refresh {
            match view {
                ClustersView::Specs(id) | ClustersView::ConfirmDeleteSpec(id, _) => {
                    self.fetch_cluster_specs(id.clone())
                }
                _ => self.fetch_clusters(),
            }
        }
    }

    pub fn draw_clusters(&mut self, frame: &mut Frame, view: &ClustersView) {
        let area = frame.area();

        let vertical = Layout::vertical([
            Constraint::Length(3), // Title
            Constraint::Min(0),    // Table
            Constraint::Length(3), // Footer
        ]);
        let [title_area, table_area, footer_area] = vertical.areas(area);

        match view {
            ClustersView::List | ClustersView::ConfirmDelete(_) => {
                let title = Line::from("Clusters").bold().cyan().centered();
                frame.render_widget(Paragraph::new(title), title_area);
                self.draw_cluster_table(frame, table_area);
            }
            ClustersView::Specs(id) | ClustersView::ConfirmDeleteSpec(id, _) => {
                let region = self
                    .state
                    .clusters
                    .clusters
                    .iter()
                    .find(|c| &c.cluster_id == id)
                    .map(|c| format!("{} · {}", c.cluster_name, c.region))
                    .unwrap_or_default();
                let title = vec![
                    Line::from(format!("Cluster {}", id)).bold().cyan().centered(),
                    Line::from(region).dim().centered(),
                ];
                frame.render_widget(Paragraph::new(title), title_area);
                self.draw_cluster_spec_table(frame, table_area);
                if let Some(form) = &self.state.clusters.form {
                    draw_form(frame, area, form);
                }
            }
        }

        match view {
            ClustersView::ConfirmDelete(id) => draw_confirm(
                frame,
                area,
                &format!("Delete cluster {}? Its endpoints lose their placement.", id),
            ),
            ClustersView::ConfirmDeleteSpec(id, spec_id) => {
                let name = self
                    .state
                    .clusters
                    .specs
                    .iter()
                    .find(|s| s.id == *spec_id)
                    .map(|s| s.cluster_spec_name.clone())
                    .unwrap_or_else(|| spec_id.to_string());
                draw_confirm(frame, area, &format!("Delete spec {} of {}?", name, id));
            }
            _ => {}
        }

        let help = match view {
            ClustersView::ConfirmDelete(_) | ClustersView::ConfirmDeleteSpec(..) => {
                "y: Confirm  |  n/Esc: Cancel"
            }
            ClustersView::Specs(_) if self.state.clusters.form.is_some() => {
                "↑↓: Field  |  Space: Toggle  |  Enter: Next / Save  |  Ctrl+S: Save  |  Esc: Cancel"
            }
            ClustersView::Specs(_) => {
                "↑↓: Select  |  n: Add  |  Enter: Edit  |  a: Enable / Disable  |  d: Delete  |  r: Refresh  |  Esc: Back"
            }
            ClustersView::List => "↑↓: Select  |  Enter: Specs  |  d: Delete  |  r: Refresh  |  Esc: Back",
        };
        self.draw_footer(frame, footer_area, help);
    }

    fn draw_cluster_table(&mut self, frame: &mut Frame, area: Rect) {
        let state = &mut self.state.clusters;
        if !state.loaded {
            frame.render_widget(
                Paragraph::new("Loading clusters...")
                    .block(Block::bordered())
                    .centered(),
                area,
            );
            return;
        }
        if state.clusters.is_empty() {
            let text = match &state.error {
                Some(err) => Line::from(format!("Error: {}", err)).red(),
                None => Line::from("No clusters configured"),
            };
            frame.render_widget(Paragraph::new(text).block(Block::bordered()).centered(), area);
            return;
        }

        let rows: Vec<Row> = state
            .clusters
            .iter()
            .map(|c| {
                Row::new(vec![
                    Line::from(c.cluster_id.clone()),
                    Line::from(c.cluster_name.clone()),
                    Line::from(c.region.clone()),
                    Line::from(c.api_endpoint.clone()),
                    Line::from(c.status.clone()).style(Style::default().fg(cluster_color(&c.status))),
                    Line::from(c.priority.to_string()),
                    Line::from(format!("{}/{}", c.available_gpu_slots, c.total_gpu_slots)),
                    Line::from(local_time(c.last_heartbeat_at.as_deref())),
                ])
            })
            .collect();

        let mut block = Block::bordered().title(format!(" {} clusters ", rows.len()));
        if let Some(err) = &state.error {
            block = block.title_bottom(Line::from(format!(" Refresh failed: {} ", err)).red());
        }
        let table = SelectTable::new(
            rows,
            [
                Constraint::Fill(2),
                Constraint::Fill(2),
                Constraint::Length(12),
                Constraint::Fill(3),
                Constraint::Length(12),
                Constraint::Length(8),
                Constraint::Length(9),
                Constraint::Length(20),
            ],
        )
        .header(Row::new(vec![
            "ID", "Name", "Region", "API", "Status", "Priority", "GPU", "Heartbeat",
        ]))
        .block(block);
        frame.render_stateful_widget(table, area, &mut state.selection);
    }

    fn draw_cluster_spec_table(&mut self, frame: &mut Frame, area: Rect) {
        let state = &mut self.state.clusters;
        if !state.specs_loaded {
            frame.render_widget(
                Paragraph::new("Loading specs...")
                    .block(Block::bordered())
                    .centered(),
                area,
            );
            return;
        }
        if state.specs.is_empty() {
            let text = match &state.specs_error {
                Some(err) => Line::from(format!("Error: {}", err)).red(),
                None => Line::from("No specs configured for this cluster"),
            };
            frame.render_widget(Paragraph::new(text).block(Block::bordered()).centered(), area);
            return;
        }

        let rows: Vec<Row> = state
            .specs
            .iter()
            .map(|s| {
                let (label, color) = if s.is_available {
                    ("Available", Color::Green)
                } else {
                    ("Disabled", Color::DarkGray)
                };
                Row::new(vec![
                    Line::from(s.cluster_spec_name.clone()),
                    Line::from(s.spec_name.clone()),
                    Line::from(format!("{}/{}", s.available_capacity, s.total_capacity)),
                    Line::from(label).style(Style::default().fg(color)),
                ])
            })
            .collect();

        let mut block = Block::bordered().title(format!(" {} specs ", rows.len()));
        if let Some(err) = &state.specs_error {
            block = block.title_bottom(Line::from(format!(" Refresh failed: {} ", err)).red());
        }
        let table = SelectTable::new(
            rows,
            [
                Constraint::Fill(2),
                Constraint::Fill(2),
                Constraint::Length(10),
                Constraint::Length(10),
            ],
        )
        .header(Row::new(vec!["Cluster Spec", "Portal Spec", "Capacity", "Status"]))
        .block(block);
        frame.render_stateful_widget(table, area, &mut state.spec_selection);
    }

    pub fn handle_clusters_input(&mut self, key: KeyEvent, view: &ClustersView) {
        if let (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) =
            (key.modifiers, key.code)
        {
            self.quit();
            return;
        }

        match view {
            ClustersView::List => match key.code {
                KeyCode::Esc => {
                    self.state.clusters = ClustersState::default();
                    self.view = AppView::Menu;
                }
                KeyCode::Up => self.state.clusters.selection.move_up(),
                KeyCode::Down => {
                    let len = self.state.clusters.clusters.len();
                    self.state.clusters.selection.move_down(len);
                }
                KeyCode::Char('r') => self.fetch_clusters(),
                KeyCode::Char('d') => {
                    if let Some(c) = self.state.clusters.selected() {
                        self.view =
                            AppView::Clusters(ClustersView::ConfirmDelete(c.cluster_id.clone()));
                    }
                }
                KeyCode::Enter => {
                    if let Some(id) = self.state.clusters.selected().map(|c| c.cluster_id.clone()) {
                        self.open_cluster_specs(id);
                    }
                }
                _ => {}
            },
            ClustersView::ConfirmDelete(id) => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.delete_cluster(id.clone());
                    self.view = AppView::Clusters(ClustersView::List);
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.view = AppView::Clusters(ClustersView::List)
                }
                _ => {}
            },
            ClustersView::Specs(id) => self.handle_cluster_specs_input(key, id),
            ClustersView::ConfirmDeleteSpec(id, spec_id) => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.delete_cluster_spec(id.clone(), *spec_id);
                    self.view = AppView::Clusters(ClustersView::Specs(id.clone()));
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.view = AppView::Clusters(ClustersView::Specs(id.clone()))
                }
                _ => {}
            },
        }
    }

    fn handle_cluster_specs_input(&mut self, key: KeyEvent, cluster_id: &str) {
        if let Some(form) = self.state.clusters.form.as_mut() {
            match form.handle_key(key) {
                FormAction::Cancel => self.state.clusters.form = None,
                FormAction::Submit => self.save_cluster_spec(cluster_id),
                FormAction::None => {}
            }
            return;
        }

        let state = &mut self.state.clusters;
        match key.code {
            KeyCode::Esc => {
                state.specs_feed.stop();
                self.view = AppView::Clusters(ClustersView::List);
            }
            KeyCode::Up => state.spec_selection.move_up(),
            KeyCode::Down => state.spec_selection.move_down(state.specs.len()),
            KeyCode::Char('r') => self.fetch_cluster_specs(cluster_id.to_string()),
            KeyCode::Char('n') => state.form = Some(ClusterSpecForm::blank(cluster_id)),
            KeyCode::Enter | KeyCode::Char('e') => {
                state.form = state.selected_spec().map(ClusterSpecForm::edit);
            }
            KeyCode::Char('a') => {
                if let Some(update) = state.selected_spec().map(ClusterSpecUpdate::toggle) {
                    let message = if update.is_available == Some(true) {
                        "enabled"
                    } else {
                        "disabled"
                    };
                    self.update_cluster_spec(cluster_id.to_string(), update, message);
                }
            }
            KeyCode::Char('d') => {
                if let Some(spec) = state.selected_spec() {
                    self.view = AppView::Clusters(ClustersView::ConfirmDeleteSpec(
                        cluster_id.to_string(),
                        spec.id,
                    ));
                }
            }
            _ => {}
        }
    }

    /// Sends the form, which stays open with the error when it does not validate.
    fn save_cluster_spec(&mut self, cluster_id: &str) {
        let Some(form) = self.state.clusters.form.as_mut() else {
            return;
        };
        let request = match form.request() {
            Ok(request) => request,
            Err(err) => {
                form.error = Some(err);
                return;
            }
        };

        self.state.clusters.form = None;
        match request {
            ClusterSpecRequest::Update(update) => {
                self.update_cluster_spec(cluster_id.to_string(), update, "updated")
            }
            ClusterSpecRequest::Create(spec) => {
                let api = self.api.clone();
                let cluster_id = cluster_id.to_string();
                self.state.clusters.actions.detach(async move {
                    let name = &spec.cluster_spec_name;
                    match api.create_cluster_spec(&cluster_id, &spec).await {
                        Ok(()) => {
                            tracing::info!("added spec {} to cluster {}", name, cluster_id);
                            Ok(format!("Spec {} added to {}", name, cluster_id))
                        }
                        Err(err) => Err(format!("Failed to add spec {}: {}", name, err)),
                    }
                });
            }
        }
    }

    fn update_cluster_spec(&mut self, cluster_id: String, update: ClusterSpecUpdate, done: &str) {
        let api = self.api.clone();
        let done = done.to_string();
        self.state.clusters.actions.detach(async move {
            match api.update_cluster_spec(&cluster_id, &update).await {
                Ok(()) => Ok(format!("Spec {} {}", update.id, done)),
                Err(err) => Err(format!("Failed to update spec {}: {}", update.id, err)),
            }
        });
    }

    fn delete_cluster_spec(&mut self, cluster_id: String, spec_id: i64) {
        let api = self.api.clone();
        self.state.clusters.actions.detach(async move {
            match api.delete_cluster_spec(&cluster_id, spec_id).await {
                Ok(()) => Ok(format!("Spec {} deleted", spec_id)),
                Err(err) => Err(format!("Failed to delete spec {}: {}", spec_id, err)),
            }
        });
    }

    fn delete_cluster(&mut self, cluster_id: String) {
        let api = self.api.clone();
        self.state.clusters.actions.detach(async move {
            match api.delete_cluster(&cluster_id).await {
                Ok(()) => Ok(format!("Cluster {} deleted", cluster_id)),
                Err(err) => Err(format!("Failed to delete cluster {}: {}", cluster_id, err)),
            }
        });
    }
}

/// Cluster statuses are lowercase and differ from workload statuses.
fn cluster_color(status: &str) -> Color {
    match status {
        "active" => Color::Green,
        "maintenance" => Color::Yellow,
        "offline" => Color::Red,
        other => status_color(other),
    }
}
