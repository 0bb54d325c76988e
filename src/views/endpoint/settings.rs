use crate::App;
use crate::common::{ApiClient, Endpoint, EndpointConfigUpdate, EndpointUpdate};
use crate::monitor::Feed;
use crate::widgets::{SelectTable, SelectionState};
use crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Stylize,
    text::Line,
    widgets::{Block, Paragraph, Row},
};
use tui_input::Input;
use tui_input::backend::crossterm::EventHandler;

/// An editable row of the settings tab.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsRow {
    Replicas,
    Image,
    TaskTimeout,
    MinReplicas,
    MaxReplicas,
    /// Environment variable with this key.
    Env(String),
    AddEnv,
}

impl SettingsRow {
    /// Rows for `endpoint`, env vars sorted by key.
    pub fn all(endpoint: &Endpoint) -> Vec<SettingsRow> {
        let mut rows = vec![
            SettingsRow::Replicas,
            SettingsRow::Image,
            SettingsRow::TaskTimeout,
            SettingsRow::MinReplicas,
            SettingsRow::MaxReplicas,
        ];
        rows.extend(endpoint.env.keys().cloned().map(SettingsRow::Env));
        rows.push(SettingsRow::AddEnv);
        rows
    }

    pub fn label(&self) -> String {
        match self {
            SettingsRow::Replicas => "Replicas".to_string(),
            SettingsRow::Image => "Image".to_string(),
            SettingsRow::TaskTimeout => "Task timeout (s)".to_string(),
            SettingsRow::MinReplicas => "Min replicas".to_string(),
            SettingsRow::MaxReplicas => "Max replicas".to_string(),
            SettingsRow::Env(key) => format!("env {}", key),
            SettingsRow::AddEnv => "+ Add variable".to_string(),
        }
    }

    /// Text put in the input when editing starts.
    pub fn value(&self, endpoint: &Endpoint) -> String {
        match self {
            SettingsRow::Replicas => endpoint.replicas.to_string(),
            SettingsRow::Image => endpoint.image.clone(),
            SettingsRow::TaskTimeout => endpoint.task_timeout.to_string(),
            SettingsRow::MinReplicas => endpoint.min_replicas.to_string(),
            SettingsRow::MaxReplicas => endpoint.max_replicas.to_string(),
            SettingsRow::Env(key) => match endpoint.env.get(key) {
                Some(value) => format!("{}={}", key, value),
                None => format!("{}=", key),
            },
            SettingsRow::AddEnv => String::new(),
        }
    }
}

/// A single request changing an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Update(EndpointUpdate),
    Config(EndpointConfigUpdate),
}

impl Mutation {
    /// Plans the request for `row` edited to `raw`, validating it first.
    pub fn plan(row: &SettingsRow, raw: &str, endpoint: &Endpoint) -> Result<Mutation, String> {
        let raw = raw.trim();
        let number = |what: &str| {
            raw.parse::<u32>()
                .map_err(|_| format!("{} must be a whole number", what))
        };

        let mutation = match row {
            SettingsRow::Replicas => Mutation::Update(EndpointUpdate {
                replicas: Some(number("Replicas")?),
                ..Default::default()
            }),
            SettingsRow::Image if raw.is_empty() => return Err("Image cannot be empty".to_string()),
            SettingsRow::Image => Mutation::Update(EndpointUpdate {
                image: Some(raw.to_string()),
                ..Default::default()
            }),
            SettingsRow::TaskTimeout => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Mutation::Config(EndpointConfigUpdate {
                    task_timeout: Some(secs),
                    ..Default::default()
                }),
                _ => return Err("Task timeout must be a positive number of seconds".to_string()),
            },
            SettingsRow::MinReplicas => {
                let min = number("Min replicas")?;
                if endpoint.max_replicas > 0 && min > endpoint.max_replicas {
                    return Err(format!(
                        "Min replicas cannot exceed max replicas ({})",
                        endpoint.max_replicas
                    ));
                }
                Mutation::Config(EndpointConfigUpdate {
                    min_replicas: Some(min),
                    ..Default::default()
                })
            }
            SettingsRow::MaxReplicas => {
                let max = number("Max replicas")?;
                if max < endpoint.min_replicas {
                    return Err(format!(
                        "Max replicas cannot be below min replicas ({})",
                        endpoint.min_replicas
                    ));
                }
                Mutation::Config(EndpointConfigUpdate {
                    max_replicas: Some(max),
                    ..Default::default()
                })
            }
            SettingsRow::Env(key) => {
                let mut env = endpoint.env.clone();
                env.remove(key);
                if let Some((k, v)) = parse_env_entry(raw)? {
                    env.insert(k, v);
                }
                Mutation::Update(EndpointUpdate {
                    env: Some(env),
                    ..Default::default()
                })
            }
            SettingsRow::AddEnv => {
                let Some((k, v)) = parse_env_entry(raw)? else {
                    return Err("Enter a variable as KEY=value".to_string());
                };
                let mut env = endpoint.env.clone();
                env.insert(k, v);
                Mutation::Update(EndpointUpdate {
                    env: Some(env),
                    ..Default::default()
                })
            }
        };
        Ok(mutation)
    }

    /// Removes the env var `key`.
    pub fn remove_env(key: &str, endpoint: &Endpoint) -> Mutation {
        let mut env = endpoint.env.clone();
        env.remove(key);
        Mutation::Update(EndpointUpdate {
            env: Some(env),
            ..Default::default()
        })
    }

    async fn send(self, api: &ApiClient, name: &str) -> Result<String, String> {
        let result = match &self {
            Mutation::Update(update) => api.update_endpoint(name, update).await,
            Mutation::Config(update) => api.update_endpoint_config(name, update).await,
        };
        match result {
            Ok(()) => Ok(format!("{} updated", name)),
            Err(err) => Err(format!("Update failed: {}", err)),
        }
    }
}

/// Parses `KEY=value`, an empty entry means "remove".
pub fn parse_env_entry(raw: &str) -> Result<Option<(String, String)>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let Some((key, value)) = raw.split_once('=') else {
        return Err("Enter a variable as KEY=value".to_string());
    };
    let key = key.trim();
    if key.is_empty() || key.chars().any(char::is_whitespace) {
        return Err(format!("Invalid variable name {:?}", key));
    }
    Ok(Some((key.to_string(), value.to_string())))
}

#[derive(Debug, Default)]
pub struct EndpointSettingsState {
    pub selection: SelectionState,
    /// Row being edited and its input.
    pub editing: Option<(SettingsRow, Input)>,
    /// Validation error of the last edit.
    pub error: Option<String>,
    /// Outcome of mutation requests.
    pub actions: Feed<Result<String, String>>,
}

impl EndpointSettingsState {
    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    pub fn tick(&mut self) -> Vec<Result<String, String>> {
        self.actions.drain()
    }

    fn submit(&mut self, api: &ApiClient, name: &str, mutation: Mutation) {
        let api = api.clone();
        let name = name.to_string();
        self.actions
            .detach(async move { mutation.send(&api, &name).await });
    }
}

impl App {
    pub(crate) fn draw_endpoint_settings(&mut self, frame: &mut Frame, area: Rect) -> &'static str {
        let Some(state) = self.state.endpoint.as_mut() else {
            return "";
        };
        let Some(endpoint) = state.endpoint.as_ref() else {
            return "";
        };
        let settings = &mut state.settings;

        let [table_area, edit_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

        let rows: Vec<Row> = SettingsRow::all(endpoint)
            .iter()
            .map(|row| {
                let value = match row {
                    SettingsRow::AddEnv => String::new(),
                    SettingsRow::Env(key) => endpoint.env.get(key).cloned().unwrap_or_default(),
                    row => row.value(endpoint),
                };
                Row::new(vec![Line::from(row.label()), Line::from(value)])
            })
            .collect();
        let table = SelectTable::new(rows, [Constraint::Length(24), Constraint::Fill(1)])
            .header(Row::new(vec!["Setting", "Value"]))
            .block(Block::bordered());
        frame.render_stateful_widget(table, table_area, &mut settings.selection);

        match &settings.editing {
            Some((row, input)) => {
                // keep 2 for borders and 1 for cursor
                let width = edit_area.width.max(3) - 3;
                let scroll = input.visual_scroll(width as usize);
                frame.render_widget(
                    Paragraph::new(input.value())
                        .scroll((0, scroll as u16))
                        .block(Block::bordered().title(format!(" {} ", row.label())).yellow()),
                    edit_area,
                );
                let x = input.visual_cursor().max(scroll) - scroll + 1;
                frame.set_cursor_position((edit_area.x + x as u16, edit_area.y + 1));
                "Enter: Save  |  Esc: Cancel"
            }
            None => {
                let line = match &settings.error {
                    Some(err) => Line::from(err.clone()).red(),
                    None => Line::from("Changes apply with the next refresh").dim(),
                };
                frame.render_widget(Paragraph::new(line).block(Block::bordered()), edit_area);
                "↑↓: Select  |  Enter: Edit  |  d: Remove variable"
            }
        }
    }

    pub(crate) fn handle_endpoint_settings_input(&mut self, key: KeyEvent) {
        let api = self.api.clone();
        let Some(state) = self.state.endpoint.as_mut() else {
            return;
        };
        let Some(endpoint) = state.endpoint.as_ref() else {
            return;
        };
        let settings = &mut state.settings;
        let rows = SettingsRow::all(endpoint);

        if let Some((row, input)) = settings.editing.as_mut() {
            match key.code {
                KeyCode::Enter => match Mutation::plan(row, input.value(), endpoint) {
                    Ok(mutation) => {
                        settings.editing = None;
                        settings.error = None;
                        settings.submit(&api, &state.name, mutation);
                    }
                    Err(err) => settings.error = Some(err),
                },
                KeyCode::Esc => {
                    settings.editing = None;
                    settings.error = None;
                }
                _ => {
                    input.handle_event(&Event::Key(key));
                }
            }
            return;
        }

        match key.code {
            KeyCode::Up => settings.selection.move_up(),
            KeyCode::Down => settings.selection.move_down(rows.len()),
            KeyCode::Enter => {
                if let Some(row) = rows.get(settings.selection.selected()) {
                    settings.error = None;
                    settings.editing = Some((row.clone(), Input::new(row.value(endpoint))));
                }
            }
            KeyCode::Char('d') => {
                if let Some(SettingsRow::Env(key)) = rows.get(settings.selection.selected()) {
                    let mutation = Mutation::remove_env(key, endpoint);
                    settings.submit(&api, &state.name, mutation);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn endpoint() -> Endpoint {
        Endpoint {
            name: "my-endpoint".to_string(),
            replicas: 2,
            min_replicas: 1,
            max_replicas: 4,
            env: BTreeMap::from([
                ("HF_TOKEN".to_string(), "abc".to_string()),
                ("MODEL".to_string(), "flux".to_string()),
            ]),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_env_entry() {
        assert_eq!(
            parse_env_entry(" MODEL=flux=dev "),
            Ok(Some(("MODEL".to_string(), "flux=dev".to_string())))
        );
        assert_eq!(parse_env_entry("   "), Ok(None));
        assert!(parse_env_entry("NOVALUE").is_err());
        assert!(parse_env_entry("=value").is_err());
        assert!(parse_env_entry("MY KEY=1").is_err());
    }

    #[test]
    fn test_rows_list_env_vars() {
        let rows = SettingsRow::all(&endpoint());
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[5], SettingsRow::Env("HF_TOKEN".to_string()));
        assert_eq!(rows[7], SettingsRow::AddEnv);
        assert_eq!(rows[6].value(&endpoint()), "MODEL=flux");
    }

    #[test]
    fn test_plan_mutations() {
        let endpoint = endpoint();

        assert_eq!(
            Mutation::plan(&SettingsRow::Replicas, "3", &endpoint),
            Ok(Mutation::Update(EndpointUpdate {
                replicas: Some(3),
                ..Default::default()
            }))
        );
        assert!(Mutation::plan(&SettingsRow::Replicas, "three", &endpoint).is_err());
        assert!(Mutation::plan(&SettingsRow::MinReplicas, "5", &endpoint).is_err());
        assert!(Mutation::plan(&SettingsRow::MaxReplicas, "0", &endpoint).is_err());
        assert_eq!(
            Mutation::plan(&SettingsRow::TaskTimeout, "600", &endpoint),
            Ok(Mutation::Config(EndpointConfigUpdate {
                task_timeout: Some(600),
                ..Default::default()
            }))
        );

        // renaming a variable drops the old key, clearing it removes it
        let Ok(Mutation::Update(update)) =
            Mutation::plan(&SettingsRow::Env("MODEL".to_string()), "CHECKPOINT=v2", &endpoint)
        else {
            panic!("expected an env update");
        };
        let env = update.env.unwrap();
        assert!(!env.contains_key("MODEL"));
        assert_eq!(env["CHECKPOINT"], "v2");

        let Ok(Mutation::Update(update)) =
            Mutation::plan(&SettingsRow::Env("MODEL".to_string()), "", &endpoint)
        else {
            panic!("expected an env update");
        };
        assert_eq!(update.env.unwrap().len(), 1);

        assert!(Mutation::plan(&SettingsRow::AddEnv, "", &endpoint).is_err());
    }
}
