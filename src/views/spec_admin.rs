use crate::common::{AdminSpec, ApiResult, SpecPayload};
use crate::endpoints::draw_confirm;
use crate::monitor::Feed;
use crate::widgets::{FormAction, FormField, FormState, SelectTable, SelectionState, draw_form};
use crate::{App, AppView};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::{Color, Style, Stylize},
    text::Line,
    widgets::{Block, Paragraph, Row},
};

#[derive(Debug, Clone, PartialEq)]
pub enum SpecAdminView {
    List,
    /// Asking before deleting the spec with this id.
    ConfirmDelete(i64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpecField {
    /// Only on edit.
    Id,
    Name,
    Type,
    GpuType,
    GpuCount,
    CpuCores,
    RamGb,
    DiskGb,
    Price,
    Description,
    Available,
}

/// Create or edit form of one catalog spec.
pub type SpecForm = FormState<SpecField>;

impl SpecForm {
    pub fn blank() -> Self {
        Self::with_values("New spec", None, &SpecPayload::default())
    }

    pub fn edit(spec: &AdminSpec) -> Self {
        let title = format!("Edit {}", spec.spec_name);
        Self::with_values(title, Some(spec.id), &SpecPayload::from(spec))
    }

    fn with_values(title: impl Into<String>, id: Option<i64>, spec: &SpecPayload) -> Self {
        let mut fields = Vec::with_capacity(11);
        if let Some(id) = id {
            fields.push((SpecField::Id, FormField::locked("ID:", id)));
        }
        fields.extend([
            (SpecField::Name, FormField::text("Name:", &spec.spec_name)),
            (SpecField::Type, FormField::text("Type (GPU/CPU):", &spec.spec_type)),
            (SpecField::GpuType, FormField::text("GPU type:", &spec.gpu_type)),
            (SpecField::GpuCount, FormField::text("GPU count:", spec.gpu_count)),
            (SpecField::CpuCores, FormField::text("CPU cores:", spec.cpu_cores)),
            (SpecField::RamGb, FormField::text("RAM (GB):", spec.ram_gb)),
            (SpecField::DiskGb, FormField::text("Disk (GB):", spec.disk_gb)),
            (SpecField::Price, FormField::text("Price/hr (USD):", spec.price_per_hour)),
            (SpecField::Description, FormField::text("Description:", &spec.description)),
            (SpecField::Available, FormField::toggle("Available:", spec.is_available)),
        ]);
        FormState::new(title, fields)
    }

    /// The request body, with the id set when editing.
    pub fn draft(&self) -> Result<SpecPayload, String> {
        let id = match self.trimmed(SpecField::Id) {
            id if id.is_empty() => None,
            _ => Some(self.parse(SpecField::Id)?),
        };
        let spec_type = self.trimmed(SpecField::Type).to_ascii_uppercase();
        let gpu = spec_type == "GPU";
        let payload = SpecPayload {
            id,
            spec_name: self.trimmed(SpecField::Name),
            spec_type,
            gpu_type: if gpu { self.trimmed(SpecField::GpuType) } else { String::new() },
            gpu_count: if gpu { self.parse(SpecField::GpuCount)? } else { 0 },
            cpu_cores: self.parse(SpecField::CpuCores)?,
            ram_gb: self.parse(SpecField::RamGb)?,
            disk_gb: self.parse(SpecField::DiskGb)?,
            price_per_hour: self.parse(SpecField::Price)?,
            description: self.trimmed(SpecField::Description),
            is_available: self.is_on(SpecField::Available),
        };
        payload.validate()?;
        Ok(payload)
    }
}

/// Every spec of the catalog, available or not.
#[derive(Debug, Default)]
pub struct SpecAdminState {
    pub feed: Feed<ApiResult<Vec<AdminSpec>>>,
    pub specs: Vec<AdminSpec>,
    pub loaded: bool,
    pub error: Option<String>,
    pub selection: SelectionState,
    pub form: Option<SpecForm>,
    /// Outcome of mutations.
    pub actions: Feed<Result<String, String>>,
}

impl SpecAdminState {
    pub fn selected(&self) -> Option<&AdminSpec> {
        self.specs.get(self.selection.selected())
    }

    fn apply(&mut self, result: ApiResult<Vec<AdminSpec>>) {
        match result {
            Ok(specs) => {
                self.specs = specs;
                self.error = None;
            }
            Err(err) => self.error = Some(err.to_string()),
        }
        self.loaded = true;
        self.selection.clamp(self.specs.len());
    }
}

impl App {
    pub(crate) fn open_spec_admin(&mut self) {
        self.fetch_admin_specs();
        self.view = AppView::SpecAdmin(SpecAdminView::List);
    }

    fn fetch_admin_specs(&mut self) {
        let api = self.api.clone();
        self.state
            .spec_admin
            .feed
            .spawn_once(async move { api.admin_specs().await });
    }

    pub(crate) fn tick_spec_admin(&mut self) {
        if let Some(result) = self.state.spec_admin.feed.latest() {
            self.state.spec_admin.apply(result);
        }

        let outcomes = self.state.spec_admin.actions.drain();
        let refresh = outcomes.iter().any(Result::is_ok);
        for outcome in outcomes {
            self.notify_outcome(outcome);
        }
        if refresh {
            self.fetch_admin_specs();
        }
    }

    pub fn draw_spec_admin(&mut self, frame: &mut Frame, view: &SpecAdminView) {
        let area = frame.area();

        let vertical = Layout::vertical([
            Constraint::Length(3), // Title
            Constraint::Min(0),    // Table
            Constraint::Length(3), // Footer
        ]);
        let [title_area, table_area, footer_area] = vertical.areas(area);

        let title = Line::from("Spec catalog").bold().cyan().centered();
        frame.render_widget(Paragraph::new(title), title_area);

        let state = &mut self.state.spec_admin;
        if !state.loaded {
            frame.render_widget(
                Paragraph::new("Loading specs...")
                    .block(Block::bordered())
                    .centered(),
                table_area,
            );
        } else if state.specs.is_empty() {
            let text = match &state.error {
                Some(err) => Line::from(format!("Error: {}", err)).red(),
                None => Line::from("The catalog is empty, press n to add a spec"),
            };
            frame.render_widget(
                Paragraph::new(text).block(Block::bordered()).centered(),
                table_area,
            );
        } else {
            let rows: Vec<Row> = state
                .specs
                .iter()
                .map(|s| {
                    let gpu = if s.spec_type.eq_ignore_ascii_case("GPU") {
                        format!("{}x {}", s.gpu_count, s.gpu_type)
                    } else {
                        "-".to_string()
                    };
                    let (label, color) = if s.is_available {
                        ("Available", Color::Green)
                    } else {
                        ("Disabled", Color::DarkGray)
                    };
                    Row::new(vec![
                        Line::from(s.id.to_string()),
                        Line::from(s.spec_name.clone()),
                        Line::from(s.spec_type.clone()),
                        Line::from(gpu),
                        Line::from(format!("{}C / {}G / {}G", s.cpu_cores, s.ram_gb, s.disk_gb)),
                        Line::from(format!("${:.2}", s.price_per_hour)),
                        Line::from(label).style(Style::default().fg(color)),
                    ])
                })
                .collect();

            let mut block = Block::bordered().title(format!(" {} specs ", rows.len()));
            if let Some(err) = &state.error {
                block = block.title_bottom(Line::from(format!(" Refresh failed: {} ", err)).red());
            }
            let table = SelectTable::new(
                rows,
                [
                    Constraint::Length(5),
                    Constraint::Fill(2),
                    Constraint::Length(5),
                    Constraint::Fill(2),
                    Constraint::Length(18),
                    Constraint::Length(10),
                    Constraint::Length(10),
                ],
            )
            .header(Row::new(vec![
                "ID", "Name", "Type", "GPU", "CPU / RAM / Disk", "Price/hr", "Status",
            ]))
            .block(block);
            frame.render_stateful_widget(table, table_area, &mut state.selection);
        }

        if let Some(form) = &state.form {
            draw_form(frame, area, form);
        }
        if let SpecAdminView::ConfirmDelete(id) = view {
            let name = state
                .specs
                .iter()
                .find(|s| s.id == *id)
                .map(|s| s.spec_name.clone())
                .unwrap_or_else(|| id.to_string());
            draw_confirm(frame, area, &format!("Delete spec {}? Endpoints keep running.", name));
        }

        let help = match view {
            SpecAdminView::ConfirmDelete(_) => "y: Confirm  |  n/Esc: Cancel",
            SpecAdminView::List if state.form.is_some() => {
                "↑↓: Field  |  Space: Toggle  |  Enter: Next / Save  |  Ctrl+S: Save  |  Esc: Cancel"
            }
            SpecAdminView::List => {
                "↑↓: Select  |  n: New  |  Enter: Edit  |  a: Enable / Disable  |  d: Delete  |  r: Refresh  |  Esc: Back"
            }
        };
        self.draw_footer(frame, footer_area, help);
    }

    pub fn handle_spec_admin_input(&mut self, key: KeyEvent, view: &SpecAdminView) {
        if let (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) =
            (key.modifiers, key.code)
        {
            self.quit();
            return;
        }

        if let Some(form) = self.state.spec_admin.form.as_mut() {
            match form.handle_key(key) {
                FormAction::Cancel => self.state.spec_admin.form = None,
                FormAction::Submit => self.save_spec(),
                FormAction::None => {}
            }
            return;
        }

        let state = &mut self.state.spec_admin;
        match view {
            SpecAdminView::List => match key.code {
                KeyCode::Esc => {
                    self.state.spec_admin = SpecAdminState::default();
                    self.view = AppView::Menu;
                }
                KeyCode::Up => state.selection.move_up(),
                KeyCode::Down => state.selection.move_down(state.specs.len()),
                KeyCode::Char('r') => self.fetch_admin_specs(),
                KeyCode::Char('n') => state.form = Some(SpecForm::blank()),
                KeyCode::Enter | KeyCode::Char('e') => {
                    state.form = state.selected().map(SpecForm::edit);
                }
                KeyCode::Char('a') => {
                    if let Some(spec) = state.selected() {
                        let (id, name, on) = (spec.id, spec.spec_name.clone(), !spec.is_available);
                        self.set_spec_available(id, name, on);
                    }
                }
                KeyCode::Char('d') => {
                    if let Some(spec) = state.selected() {
                        self.view = AppView::SpecAdmin(SpecAdminView::ConfirmDelete(spec.id));
                    }
                }
                _ => {}
            },
            SpecAdminView::ConfirmDelete(id) => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.delete_spec(*id);
                    self.view = AppView::SpecAdmin(SpecAdminView::List);
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.view = AppView::SpecAdmin(SpecAdminView::List)
                }
                _ => {}
            },
        }
    }

    /// Sends the form, which stays open with the error when it does not validate.
    fn save_spec(&mut self) {
        let Some(form) = self.state.spec_admin.form.as_mut() else {
            return;
        };
        let payload = match form.draft() {
            Ok(payload) => payload,
            Err(err) => {
                form.error = Some(err);
                return;
            }
        };

        self.state.spec_admin.form = None;
        let api = self.api.clone();
        self.state.spec_admin.actions.detach(async move {
            let name = &payload.spec_name;
            match api.save_spec(&payload).await {
                Ok(()) if payload.id.is_some() => Ok(format!("Spec {} updated", name)),
                Ok(()) => {
                    tracing::info!("created spec {} ({})", name, payload.spec_type);
                    Ok(format!("Spec {} created", name))
                }
                Err(err) => Err(format!("Failed to save spec {}: {}", name, err)),
            }
        });
    }

    fn set_spec_available(&mut self, id: i64, name: String, on: bool) {
        let api = self.api.clone();
        self.state.spec_admin.actions.detach(async move {
            let done = if on { "enabled" } else { "disabled" };
            match api.set_spec_available(id, on).await {
                Ok(()) => Ok(format!("Spec {} {}", name, done)),
                Err(err) => Err(format!("Failed to update spec {}: {}", name, err)),
            }
        });
    }

    fn delete_spec(&mut self, id: i64) {
        let api = self.api.clone();
        self.state.spec_admin.actions.detach(async move {
            match api.delete_spec(id).await {
                Ok(()) => Ok(format!("Spec {} deleted", id)),
                Err(err) => Err(format!("Failed to delete spec {}: {}", id, err)),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_text(form: &mut SpecForm, text: &str) {
        for c in text.chars() {
            form.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
    }

    #[test]
    fn test_new_spec_form() {
        let mut form = SpecForm::blank();
        assert_eq!(form.focused(), Some(SpecField::Name));
        assert_eq!(form.value(SpecField::Type), "GPU");
        assert_eq!(form.value(SpecField::CpuCores), "8");
        // name, GPU type and price are missing
        assert!(form.draft().is_err());

        type_text(&mut form, "GPU-H100-80GB");
        form.focus(SpecField::GpuType);
        type_text(&mut form, "H100-80GB");
        assert_eq!(form.draft().unwrap_err(), "Price must be greater than 0");

        let mut form = SpecForm::blank();
        type_text(&mut form, "CPU-4C");
        form.focus(SpecField::Type);
        for _ in 0..3 {
            form.handle_key(KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE));
        }
        type_text(&mut form, "cpu");
        form.focus(SpecField::Price);
        for _ in 0..3 {
            form.handle_key(KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE));
        }
        type_text(&mut form, "0.15");

        let payload = form.draft().unwrap();
        assert_eq!(payload.id, None);
        assert_eq!(payload.spec_type, "CPU");
        assert_eq!(payload.gpu_count, 0);
        assert_eq!(payload.price_per_hour, 0.15);
        assert!(payload.is_available);
    }

    #[test]
    fn test_edit_spec_form() {
        let spec = AdminSpec {
            id: 9,
            spec_name: "GPU-L4".to_string(),
            spec_type: "GPU".to_string(),
            gpu_type: "L4".to_string(),
            gpu_count: 1,
            cpu_cores: 8,
            ram_gb: 32,
            disk_gb: 100,
            price_per_hour: 0.8,
            is_available: true,
            ..Default::default()
        };
        let mut form = SpecForm::edit(&spec);
        // the id is locked
        assert_eq!(form.focused(), Some(SpecField::Name));
        form.focus(SpecField::Available);
        assert!(form.is_last());
        type_text(&mut form, " ");

        let payload = form.draft().unwrap();
        assert_eq!(payload.id, Some(9));
        assert_eq!(payload.gpu_type, "L4");
        assert!(!payload.is_available);
    }

    #[test]
    fn test_refresh_clamps_selection() {
        let mut state = SpecAdminState::default();
        let spec = |id| AdminSpec {
            id,
            ..Default::default()
        };
        state.apply(Ok(vec![spec(1), spec(2)]));
        state.selection.select(1);
        state.apply(Ok(vec![spec(1)]));
        assert_eq!(state.selected().unwrap().id, 1);
    }
}
