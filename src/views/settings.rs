use crate::config::Config;
use crate::{App, AppView};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style, Styled, Stylize},
    text::Line,
    widgets::{Block, Paragraph},
};
use tui_input::Input;
use tui_input::backend::crossterm::EventHandler;

/// Possible settings fields.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum SettingsField {
    /// Console API base URL.
    #[default]
    ApiUrl,
    /// Sign-in portal.
    PortalUrl,
    /// Bearer token.
    ApiKey,
    /// Browser session cookie.
    SessionCookie,
    EndpointsRefresh,
    DetailRefresh,
    StatsRefresh,
    RequestTimeout,
}

impl SettingsField {
    pub const ALL: [SettingsField; 8] = [
        SettingsField::ApiUrl,
        SettingsField::PortalUrl,
        SettingsField::ApiKey,
        SettingsField::SessionCookie,
        SettingsField::EndpointsRefresh,
        SettingsField::DetailRefresh,
        SettingsField::StatsRefresh,
        SettingsField::RequestTimeout,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SettingsField::ApiUrl => "API URL:",
            SettingsField::PortalUrl => "Portal URL:",
            SettingsField::ApiKey => "API key:",
            SettingsField::SessionCookie => "Session cookie:",
            SettingsField::EndpointsRefresh => "Endpoints refresh (s):",
            SettingsField::DetailRefresh => "Detail refresh (s):",
            SettingsField::StatsRefresh => "Stats refresh (s):",
            SettingsField::RequestTimeout => "Request timeout (s):",
        }
    }

    fn up(&self) -> Self {
        let i = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[i.saturating_sub(1)]
    }

    fn down(&self) -> Self {
        let i = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(i + 1).min(Self::ALL.len() - 1)]
    }

    /// Current value in `config`, as edited.
    pub fn value(&self, config: &Config) -> String {
        match self {
            SettingsField::ApiUrl => config.api_url.clone(),
            SettingsField::PortalUrl => config.portal_url.clone(),
            SettingsField::ApiKey => config.api_key.clone().unwrap_or_default(),
            SettingsField::SessionCookie => config.session_cookie.clone().unwrap_or_default(),
            SettingsField::EndpointsRefresh => config.endpoints_refresh_secs.to_string(),
            SettingsField::DetailRefresh => config.detail_refresh_secs.to_string(),
            SettingsField::StatsRefresh => config.stats_refresh_secs.to_string(),
            SettingsField::RequestTimeout => config.request_timeout_secs.to_string(),
        }
    }

    /// Value for display, secrets are masked.
    fn display(&self, config: &Config) -> String {
        let value = self.value(config);
        match self {
            SettingsField::ApiKey | SettingsField::SessionCookie if value.is_empty() => {
                "(not set)".to_string()
            }
            SettingsField::ApiKey | SettingsField::SessionCookie => {
                let tail: String = value
                    .chars()
                    .rev()
                    .take(4)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                format!("****{}", tail)
            }
            _ => value,
        }
    }

    /// Writes `raw` into `config`, returning a message for the status line.
    pub fn apply(&self, config: &mut Config, raw: &str) -> Result<String, String> {
        let raw = raw.trim();
        let secs = || match raw.parse::<u64>() {
            Ok(secs) if (1..=3600).contains(&secs) => Ok(secs),
            _ => Err("Invalid number of seconds (must be 1-3600)!".to_string()),
        };
        let url = || match url::Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                Ok(raw.trim_end_matches('/').to_string())
            }
            _ => Err("Invalid URL (must be http or https)!".to_string()),
        };
        let optional = || (!raw.is_empty()).then(|| raw.to_string());

        match self {
            SettingsField::ApiUrl => config.api_url = url()?,
            SettingsField::PortalUrl => config.portal_url = url()?,
            SettingsField::ApiKey => config.api_key = optional(),
            SettingsField::SessionCookie => config.session_cookie = optional(),
            SettingsField::EndpointsRefresh => config.endpoints_refresh_secs = secs()?,
            SettingsField::DetailRefresh => config.detail_refresh_secs = secs()?,
            SettingsField::StatsRefresh => config.stats_refresh_secs = secs()?,
            SettingsField::RequestTimeout => config.request_timeout_secs = secs()?,
        }

        let label = self.label().trim_end_matches(':');
        Ok(format!("{} updated (press 's' to save)", label))
    }
}

#[derive(Debug, Default)]
pub struct SettingsState {
    pub selected: SettingsField,
    /// Config being edited, written on save.
    pub temp_config: Config,
    /// Input of the field being edited.
    pub editing: Option<Input>,
    pub status_message: String,
}

impl App {
    pub(crate) fn open_settings(&mut self) {
        self.state.settings.temp_config = self.config.clone();
        self.state.settings.editing = None;
        self.state.settings.status_message.clear();
        self.view = AppView::Settings;
    }

    pub fn draw_settings(&mut self, frame: &mut Frame) {
        let area = frame.area();

        // Create layout
        let vertical = Layout::vertical([
            Constraint::Length(3), // Title
            Constraint::Min(0),    // Settings fields
            Constraint::Length(3), // Footer
        ]);
        let [title_area, settings_area, footer_area] = vertical.areas(area);

        // Title
        let title = Line::from("Settings").bold().blue().centered();
        frame.render_widget(Paragraph::new(title), title_area);

        let settings = &self.state.settings;
        let field_style = |field: SettingsField| {
            if settings.selected == field {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            }
        };

        let mut settings_text = vec![Line::from("")];
        let mut cursor = None;
        for field in SettingsField::ALL {
            let value = match &settings.editing {
                Some(input) if settings.selected == field => {
                    cursor = Some((settings_text.len(), input.visual_cursor()));
                    input.value().to_string()
                }
                _ => field.display(&settings.temp_config),
            };
            settings_text.push(Line::from(vec![
                format!("  {:<24}", field.label()).into(),
                value.set_style(field_style(field)),
            ]));
            settings_text.push(Line::from(""));
        }
        settings_text.push(Line::from(vec![
            "  Current config: ".dim(),
            Config::current_location().dim(),
        ]));

        // Add status message below the current config line if present
        if !settings.status_message.is_empty() {
            settings_text.push(Line::from(""));
            settings_text.push(Line::from(format!("  {}", settings.status_message)).green());
        }

        let block = Block::default().title("Use ↑↓ to select field, Enter to edit, s to save");
        let inner = block.inner(settings_area);
        frame.render_widget(Paragraph::new(settings_text).block(block), settings_area);

        if let Some((row, col)) = cursor {
            frame.set_cursor_position((inner.x + 26 + col as u16, inner.y + row as u16));
        }

        self.draw_footer(
            frame,
            footer_area,
            "Press Esc to go back  |  Enter to edit field  |  s to save",
        );
    }

    pub fn handle_settings_input(&mut self, key: KeyEvent) {
        // editing a field
        if let Some(input) = self.state.settings.editing.as_mut() {
            match key.code {
                KeyCode::Enter => self.apply_edit(),
                KeyCode::Esc => {
                    self.state.settings.editing = None;
                    self.state.settings.status_message.clear();
                }
                _ => {
                    input.handle_event(&Event::Key(key));
                }
            }
            return;
        }

        // Normal settings navigation
        match (key.modifiers, key.code) {
            (_, KeyCode::Esc) => {
                self.state.settings.status_message.clear();
                self.view = if self.session.is_expired() {
                    AppView::SignedOut
                } else {
                    AppView::Menu
                };
            }
            (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) => self.quit(),
            (_, KeyCode::Up) => self.state.settings.selected = self.state.settings.selected.up(),
            (_, KeyCode::Down) => {
                self.state.settings.selected = self.state.settings.selected.down()
            }
            (_, KeyCode::Enter) => self.start_edit(),
            (_, KeyCode::Char('s')) => self.save_config(),
            _ => {}
        }
    }

    fn start_edit(&mut self) {
        let settings = &mut self.state.settings;
        let value = settings.selected.value(&settings.temp_config);
        settings.editing = Some(Input::new(value));
        settings.status_message.clear();
    }

    fn apply_edit(&mut self) {
        let settings = &mut self.state.settings;
        let Some(input) = settings.editing.take() else {
            return;
        };
        settings.status_message = match settings
            .selected
            .apply(&mut settings.temp_config, input.value())
        {
            Ok(message) | Err(message) => message,
        };
    }

    fn save_config(&mut self) {
        let config = self.state.settings.temp_config.clone();
        if let Err(e) = config.save() {
            self.state.settings.status_message = format!("Failed to save: {}", e);
            return;
        }

        self.config = config;
        self.state.settings.status_message = match self.reconnect() {
            Ok(()) => format!("Configuration saved to {}", Config::current_location()),
            Err(e) => format!("Saved, but the API client could not be rebuilt: {}", e),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_fields() {
        let mut config = Config::default();

        let message = SettingsField::ApiUrl
            .apply(&mut config, "https://console.example.com/")
            .unwrap();
        assert_eq!(message, "API URL updated (press 's' to save)");
        assert_eq!(config.api_url, "https://console.example.com");

        assert!(SettingsField::ApiUrl.apply(&mut config, "ftp://nope").is_err());
        assert_eq!(config.api_url, "https://console.example.com");

        SettingsField::DetailRefresh.apply(&mut config, "15").unwrap();
        assert_eq!(config.detail_refresh_secs, 15);
        assert!(SettingsField::DetailRefresh.apply(&mut config, "0").is_err());

        SettingsField::ApiKey.apply(&mut config, "sk-123456").unwrap();
        assert_eq!(SettingsField::ApiKey.display(&config), "****3456");
        SettingsField::ApiKey.apply(&mut config, "  ").unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_field_navigation() {
        assert_eq!(SettingsField::ApiUrl.up(), SettingsField::ApiUrl);
        assert_eq!(SettingsField::ApiUrl.down(), SettingsField::PortalUrl);
        assert_eq!(
            SettingsField::RequestTimeout.down(),
            SettingsField::RequestTimeout
        );
    }
}
