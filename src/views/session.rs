use crate::common::{ApiResult, User};
use crate::monitor::Feed;
use crate::{App, AppView};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::Stylize,
    text::Line,
    widgets::{Block, Paragraph, Wrap},
};
use std::time::Duration;

/// Retry period of the user fetch while the API is unreachable.
const USER_RETRY: Duration = Duration::from_secs(10);

/// Bootstrap of the signed-in user.
#[derive(Debug, Default)]
pub struct SessionState {
    pub user: Feed<ApiResult<User>>,
    /// Last failure other than `401`, shown on the menu and sign-in screens.
    pub error: Option<String>,
}

impl App {
    /// Fetches the current user until it is known or the API refuses us.
    pub(crate) fn start_session(&mut self) {
        let api = self.api.clone();
        self.state.session.error = None;
        self.state.session.user.spawn_every(USER_RETRY, move || {
            let api = api.clone();
            async move { api.current_user().await }
        });
    }

    pub(crate) fn apply_session_results(&mut self) {
        for result in self.state.session.user.drain() {
            match result {
                Ok(user) => {
                    tracing::info!("signed in as {}", user.display_name());
                    self.session.sign_in(user);
                    self.state.session.user.stop();
                    self.state.session.error = None;
                    if self.view == AppView::SignedOut {
                        self.view = AppView::Menu;
                    }
                }
                Err(err) if err.is_unauthorized() => {
                    // the client already expired the session
                    self.state.session.user.stop();
                    self.state.session.error = None;
                }
                Err(err) => {
                    tracing::warn!("cannot load the current user: {}", err);
                    self.state.session.error = Some(err.to_string());
                }
            }
        }
    }

    pub fn draw_signed_out(&mut self, frame: &mut Frame) {
        let area = frame.area();

        let vertical = Layout::vertical([
            Constraint::Length(3), // Title
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer
        ]);
        let [title_area, content_area, footer_area] = vertical.areas(area);

        let title = Line::from("Signed out").bold().blue().centered();
        frame.render_widget(Paragraph::new(title), title_area);

        let mut lines = vec![
            Line::from(""),
            Line::from("Your session is missing or has expired.").bold(),
            Line::from(""),
            Line::from("Sign in through the portal:"),
            Line::from(self.session.login_url()).cyan(),
            Line::from(""),
            Line::from("Then put an API key or the session cookie in Settings and retry.").dim(),
        ];
        if self.state.session.user.is_active() {
            lines.push(Line::from(""));
            lines.push(Line::from("Checking session...").yellow());
        }
        if let Some(err) = &self.state.session.error {
            lines.push(Line::from(""));
            lines.push(Line::from(format!("Last attempt failed: {}", err)).red());
        }

        frame.render_widget(
            Paragraph::new(lines)
                .block(Block::bordered())
                .wrap(Wrap { trim: false })
                .centered(),
            content_area,
        );

        self.draw_footer(frame, footer_area, "r: Retry  |  s: Settings  |  Esc: Quit");
    }

    pub fn handle_signed_out_input(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (_, KeyCode::Esc)
            | (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) => self.quit(),
            (_, KeyCode::Char('r')) => {
                if !self.state.session.user.is_active() {
                    self.start_session();
                }
            }
            (_, KeyCode::Char('s')) => self.open_settings(),
            _ => {}
        }
    }
}
