use crate::common::{ApiResult, DEFAULT_REGISTRY, NewCredential, RegistryCredential};
use crate::endpoints::draw_confirm;
use crate::monitor::Feed;
use crate::utils::local_time;
use crate::widgets::{FormAction, FormField, FormState, SelectTable, SelectionState, draw_form};
use crate::{App, AppView};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::Stylize,
    text::Line,
    widgets::{Block, Paragraph, Row},
};

#[derive(Debug, Clone, PartialEq)]
pub enum CredentialsView {
    List,
    /// Asking before deleting the credential with this name.
    ConfirmDelete(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CredentialField {
    Name,
    Registry,
    Username,
    Password,
}

pub type CredentialForm = FormState<CredentialField>;

impl CredentialForm {
    pub fn blank() -> Self {
        FormState::new(
            "New registry credential",
            vec![
                (CredentialField::Name, FormField::text("Name:", "")),
                (CredentialField::Registry, FormField::text("Registry:", DEFAULT_REGISTRY)),
                (CredentialField::Username, FormField::text("Username:", "")),
                (CredentialField::Password, FormField::secret("Password:")),
            ],
        )
        .with_hint("Endpoints pick a credential by name when pulling private images")
    }

    pub fn draft(&self) -> Result<NewCredential, String> {
        let mut draft = NewCredential {
            name: self.trimmed(CredentialField::Name),
            registry: self.trimmed(CredentialField::Registry),
            username: self.trimmed(CredentialField::Username),
            password: self.value(CredentialField::Password).to_string(),
        };
        draft.validate()?;
        Ok(draft)
    }
}

/// Registry credentials of the signed-in user.
#[derive(Debug, Default)]
pub struct CredentialsState {
    pub feed: Feed<ApiResult<Vec<RegistryCredential>>>,
    pub credentials: Vec<RegistryCredential>,
    pub loaded: bool,
    pub error: Option<String>,
    pub selection: SelectionState,
    pub form: Option<CredentialForm>,
    /// Outcome of mutations.
    pub actions: Feed<Result<String, String>>,
}

impl CredentialsState {
    pub fn selected(&self) -> Option<&RegistryCredential> {
        self.credentials.get(self.selection.selected())
    }

    fn apply(&mut self, result: ApiResult<Vec<RegistryCredential>>) {
        match result {
            Ok(credentials) => {
                self.credentials = credentials;
                self.error = None;
            }
            Err(err) => self.error = Some(err.to_string()),
        }
        self.loaded = true;
        self.selection.clamp(self.credentials.len());
    }
}

impl App {
    pub(crate) fn open_credentials(&mut self) {
        self.fetch_credentials();
        self.view = AppView::Credentials(CredentialsView::List);
    }

    fn fetch_credentials(&mut self) {
        let api = self.api.clone();
        self.state
            .credentials
            .feed
            .spawn_once(async move { api.registry_credentials().await });
    }

    pub(crate) fn tick_credentials(&mut self) {
        if let Some(result) = self.state.credentials.feed.latest() {
            self.state.credentials.apply(result);
        }

        let outcomes = self.state.credentials.actions.drain();
        let refresh = outcomes.iter().any(Result::is_ok);
        for outcome in outcomes {
            self.notify_outcome(outcome);
        }
        if refresh {
            self.fetch_credentials();
        }
    }

    pub fn draw_credentials(&mut self, frame: &mut Frame, view: &CredentialsView) {
        let area = frame.area();

        let vertical = Layout::vertical([
            Constraint::Length(3), // Title
            Constraint::Min(0),    // Table
            Constraint::Length(3), // Footer
        ]);
        let [title_area, table_area, footer_area] = vertical.areas(area);

        let title = Line::from("Registry credentials").bold().cyan().centered();
        frame.render_widget(Paragraph::new(title), title_area);

        let state = &mut self.state.credentials;
        if !state.loaded {
            frame.render_widget(
                Paragraph::new("Loading credentials...")
                    .block(Block::bordered())
                    .centered(),
                table_area,
            );
        } else if state.credentials.is_empty() {
            let text = match &state.error {
                Some(err) => Line::from(format!("Error: {}", err)).red(),
                None => Line::from("No credentials yet, press n to add one"),
            };
            frame.render_widget(
                Paragraph::new(text).block(Block::bordered()).centered(),
                table_area,
            );
        } else {
            let rows: Vec<Row> = state
                .credentials
                .iter()
                .map(|c| {
                    Row::new(vec![
                        Line::from(c.name.clone()),
                        Line::from(c.registry.clone()),
                        Line::from(c.username.clone()),
                        Line::from(local_time(c.created_at.as_deref())),
                    ])
                })
                .collect();

            let mut block = Block::bordered().title(format!(" {} credentials ", rows.len()));
            if let Some(err) = &state.error {
                block = block.title_bottom(Line::from(format!(" Refresh failed: {} ", err)).red());
            }
            let table = SelectTable::new(
                rows,
                [
                    Constraint::Fill(2),
                    Constraint::Fill(3),
                    Constraint::Fill(2),
                    Constraint::Length(20),
                ],
            )
            .header(Row::new(vec!["Name", "Registry", "Username", "Created"]))
            .block(block);
            frame.render_stateful_widget(table, table_area, &mut state.selection);
        }

        if let Some(form) = &state.form {
            draw_form(frame, area, form);
        }
        if let CredentialsView::ConfirmDelete(name) = view {
            draw_confirm(
                frame,
                area,
                &format!("Delete credential {}? Endpoints using it can no longer pull.", name),
            );
        }

        let help = match view {
            CredentialsView::ConfirmDelete(_) => "y: Confirm  |  n/Esc: Cancel",
            CredentialsView::List if state.form.is_some() => {
                "↑↓: Field  |  Enter: Next / Save  |  Ctrl+S: Save  |  Esc: Cancel"
            }
            CredentialsView::List => "↑↓: Select  |  n: New  |  d: Delete  |  r: Refresh  |  Esc: Back",
        };
        self.draw_footer(frame, footer_area, help);
    }

    pub fn handle_credentials_input(&mut self, key: KeyEvent, view: &CredentialsView) {
        if let (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) =
            (key.modifiers, key.code)
        {
            self.quit();
            return;
        }

        if let Some(form) = self.state.credentials.form.as_mut() {
            match form.handle_key(key) {
                FormAction::Cancel => self.state.credentials.form = None,
                FormAction::Submit => self.create_credential(),
                FormAction::None => {}
            }
            return;
        }

        let state = &mut self.state.credentials;
        match view {
            CredentialsView::List => match key.code {
                KeyCode::Esc => {
                    self.state.credentials = CredentialsState::default();
                    self.view = AppView::Menu;
                }
                KeyCode::Up => state.selection.move_up(),
                KeyCode::Down => state.selection.move_down(state.credentials.len()),
                KeyCode::Char('r') => self.fetch_credentials(),
                KeyCode::Char('n') => state.form = Some(CredentialForm::blank()),
                KeyCode::Char('d') => {
                    if let Some(c) = state.selected() {
                        self.view =
                            AppView::Credentials(CredentialsView::ConfirmDelete(c.name.clone()));
                    }
                }
                _ => {}
            },
            CredentialsView::ConfirmDelete(name) => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.delete_credential(name.clone());
                    self.view = AppView::Credentials(CredentialsView::List);
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.view = AppView::Credentials(CredentialsView::List)
                }
                _ => {}
            },
        }
    }

    /// Sends the form, which stays open with the error when it does not validate.
    fn create_credential(&mut self) {
        let Some(form) = self.state.credentials.form.as_mut() else {
            return;
        };
        let draft = match form.draft() {
            Ok(draft) => draft,
            Err(err) => {
                form.error = Some(err);
                return;
            }
        };

        self.state.credentials.form = None;
        let api = self.api.clone();
        self.state.credentials.actions.detach(async move {
            match api.create_registry_credential(&draft).await {
                Ok(()) => {
                    tracing::info!("created registry credential {} for {}", draft.name, draft.registry);
                    Ok(format!("Credential {} saved", draft.name))
                }
                Err(err) => Err(format!("Failed to save {}: {}", draft.name, err)),
            }
        });
    }

    fn delete_credential(&mut self, name: String) {
        let api = self.api.clone();
        self.state.credentials.actions.detach(async move {
            match api.delete_registry_credential(&name).await {
                Ok(()) => Ok(format!("Credential {} deleted", name)),
                Err(err) => Err(format!("Failed to delete {}: {}", name, err)),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ApiError;

    fn type_text(form: &mut CredentialForm, text: &str) {
        for c in text.chars() {
            form.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
    }

    fn credential(name: &str) -> RegistryCredential {
        RegistryCredential {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_form_draft() {
        let mut form = CredentialForm::blank();
        type_text(&mut form, "hub");
        assert_eq!(form.draft().unwrap_err(), "Username is required");

        form.focus(CredentialField::Username);
        type_text(&mut form, "me");
        form.focus(CredentialField::Password);
        assert!(form.is_last());
        type_text(&mut form, "s3cret");

        let draft = form.draft().unwrap();
        assert_eq!(draft.registry, DEFAULT_REGISTRY);
        assert_eq!(draft.password, "s3cret");
    }

    #[test]
    fn test_refresh_after_delete() {
        let mut state = CredentialsState::default();
        state.apply(Ok(vec![credential("hub"), credential("ghcr")]));
        state.selection.select(1);
        assert_eq!(state.selected().unwrap().name, "ghcr");

        state.apply(Ok(vec![credential("hub")]));
        assert_eq!(state.selected().unwrap().name, "hub");

        // a failed refresh keeps the rows
        state.apply(Err(ApiError::Unauthorized));
        assert_eq!(state.credentials.len(), 1);
        assert!(state.error.is_some());
    }
}
