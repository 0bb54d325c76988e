use crate::App;
use crate::common::User;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style, Stylize},
    text::Line,
    widgets::{List, ListItem, Paragraph},
};

#[derive(Debug, Default, Clone)]
pub struct MenuState {
    /// Selected menu index.
    pub selected: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MenuItem {
    Endpoints,
    Tasks,
    Specs,
    Registries,
    Clusters,
    SpecAdmin,
    Billing,
    Settings,
    Exit,
}

/// Who may open a menu item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Access {
    Anyone,
    SignedIn,
    Admin,
}

impl MenuItem {
    /// Formats a menu item for display.
    pub fn fmt(&self, user: Option<&User>) -> String {
        format!("{:<12}: {}", self.label(), self.description(user))
    }

    pub fn all() -> Vec<MenuItem> {
        vec![
            MenuItem::Endpoints,
            MenuItem::Tasks,
            MenuItem::Specs,
            MenuItem::Registries,
            MenuItem::Clusters,
            MenuItem::SpecAdmin,
            MenuItem::Billing,
            MenuItem::Settings,
            MenuItem::Exit,
        ]
    }

    pub fn label(&self) -> &str {
        match self {
            MenuItem::Endpoints => "Endpoints",
            MenuItem::Tasks => "Tasks",
            MenuItem::Specs => "Specs",
            MenuItem::Registries => "Registries",
            MenuItem::Clusters => "Clusters",
            MenuItem::SpecAdmin => "Spec admin",
            MenuItem::Billing => "Billing",
            MenuItem::Settings => "Settings",
            MenuItem::Exit => "Exit",
        }
    }

    pub fn description(&self, user: Option<&User>) -> &str {
        match (self.access(), user) {
            (Access::SignedIn | Access::Admin, None) => return "Waiting for sign-in",
            (Access::Admin, Some(user)) if !user.is_admin() => return "Admins only",
            _ => {}
        }
        match self {
            MenuItem::Endpoints => "Deployed endpoints, workers and metrics",
            MenuItem::Tasks => "Tasks across all endpoints",
            MenuItem::Specs => "Hardware catalog, create endpoints",
            MenuItem::Registries => "Credentials for private images",
            MenuItem::Clusters => "Clusters and their specs",
            MenuItem::SpecAdmin => "Manage the hardware catalog",
            MenuItem::Billing => "Usage and billing records",
            MenuItem::Settings => "Edit configuration",
            MenuItem::Exit => "Quit application",
        }
    }

    pub fn access(&self) -> Access {
        match self {
            MenuItem::Settings | MenuItem::Exit => Access::Anyone,
            MenuItem::Clusters | MenuItem::SpecAdmin => Access::Admin,
            _ => Access::SignedIn,
        }
    }

    /// Whether `user` may open the item.
    pub fn is_enabled(&self, user: Option<&User>) -> bool {
        match self.access() {
            Access::Anyone => true,
            Access::SignedIn => user.is_some(),
            Access::Admin => user.is_some_and(User::is_admin),
        }
    }

    /// The total height of the menu when fully rendered.
    pub fn total_height() -> u16 {
        Self::all().len() as u16
    }

    /// The total width of the menu when fully rendered.
    pub fn total_width(user: Option<&User>) -> u16 {
        Self::all()
            .iter()
            .map(|item| item.fmt(user).len() as u16)
            .max()
            .unwrap_or(0)
    }
}

impl App {
    pub fn draw_menu(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let user = self.session.user();

        // ASCII Art
        let ascii_art: Vec<_> = crate::constants::MENU_BANNER
            .map(|line| Line::from(line).centered())
            .into_iter()
            .collect();

        // Create layout
        let vertical = Layout::vertical([
            Constraint::Length(ascii_art.len() as u16), // ASCII art
            Constraint::Min(0),                         // Menu
            Constraint::Length(1),                      // Session
            Constraint::Length(1),                      // Footer
        ]);
        let [art_area, menu_area, session_area, footer_area] = vertical.areas(area);

        frame.render_widget(Paragraph::new(ascii_art).centered(), art_area);

        // Menu items
        let menu_items: Vec<ListItem> = MenuItem::all()
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let is_disabled = !item.is_enabled(user.as_ref());
                let is_selected = i == self.state.menu.selected;

                let style = match (is_selected, is_disabled) {
                    // selected & disable
                    (true, true) => Style::default()
                        .fg(Color::DarkGray)
                        .bg(Color::Gray)
                        .add_modifier(Modifier::BOLD),
                    // selected & available
                    (true, false) => Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                    // not selected & disabled
                    (false, true) => Style::default().fg(Color::DarkGray),
                    // not selected & available
                    (false, false) => Style::default(),
                };

                ListItem::new(item.fmt(user.as_ref())).style(style)
            })
            .collect();

        // Calculate vertical centering for menu
        let menu_height = MenuItem::total_height();
        let top_padding = (menu_area.height.saturating_sub(menu_height)) / 2;
        let [_, vertical_centered_area, _] = Layout::vertical([
            Constraint::Length(top_padding),
            Constraint::Length(menu_height),
            Constraint::Min(0),
        ])
        .areas(menu_area);

        // Calculate horizontal centering for menu
        let menu_width = MenuItem::total_width(user.as_ref());
        let left_padding = (vertical_centered_area.width.saturating_sub(menu_width)) / 2;
        let [_, centered_menu_area, _] = Layout::horizontal([
            Constraint::Length(left_padding),
            Constraint::Length(menu_width),
            Constraint::Min(0),
        ])
        .areas(vertical_centered_area);

        frame.render_widget(List::new(menu_items), centered_menu_area);

        // Session line
        let session_line = match (&user, &self.state.session.error) {
            (Some(user), _) => {
                let org = if user.org_name.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", user.org_name)
                };
                Line::from(format!("Signed in as {}{}", user.display_name(), org)).green()
            }
            (None, Some(err)) => Line::from(format!("Cannot reach the API: {}", err)).red(),
            (None, None) => Line::from("Checking session...").yellow(),
        };
        frame.render_widget(Paragraph::new(session_line).centered(), session_area);

        // Footer
        let footer_text = format!("API: {}  |  ↑↓: Select  |  Enter: Open  |  Esc: Quit", self.config.api_url);
        self.draw_footer(frame, footer_area, &footer_text);
    }

    pub fn handle_menu_input(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (_, KeyCode::Esc)
            | (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) => self.quit(),
            (_, KeyCode::Up) => self.menu_up(),
            (_, KeyCode::Down) => self.menu_down(),
            (_, KeyCode::Enter) => self.select_menu_item(),
            _ => {}
        }
    }

    fn menu_up(&mut self) {
        if self.state.menu.selected > 0 {
            self.state.menu.selected -= 1;
        }
    }

    fn menu_down(&mut self) {
        let menu_count = MenuItem::all().len();
        if self.state.menu.selected < menu_count - 1 {
            self.state.menu.selected += 1;
        }
    }

    fn select_menu_item(&mut self) {
        let item = MenuItem::all()[self.state.menu.selected];
        if !item.is_enabled(self.session.user().as_ref()) {
            // item is disabled
            return;
        }

        match item {
            MenuItem::Endpoints => self.open_endpoints(),
            MenuItem::Tasks => self.open_tasks(),
            MenuItem::Specs => self.open_specs(),
            MenuItem::Registries => self.open_credentials(),
            MenuItem::Clusters => self.open_clusters(),
            MenuItem::SpecAdmin => self.open_spec_admin(),
            MenuItem::Billing => self.open_billing(),
            MenuItem::Settings => self.open_settings(),
            MenuItem::Exit => self.quit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_wait_for_session() {
        assert_eq!(MenuItem::Endpoints.description(None), "Waiting for sign-in");
        assert_eq!(MenuItem::Settings.description(None), "Edit configuration");
        let open: Vec<_> = MenuItem::all().into_iter().filter(|i| i.is_enabled(None)).collect();
        assert_eq!(open, [MenuItem::Settings, MenuItem::Exit]);
    }

    #[test]
    fn test_admin_items_need_admin() {
        let member = User {
            user_id: "u-1".to_string(),
            user_type: Some("user".to_string()),
            ..Default::default()
        };
        let admin = User {
            user_type: Some("admin".to_string()),
            ..member.clone()
        };

        assert!(MenuItem::Registries.is_enabled(Some(&member)));
        assert!(!MenuItem::Clusters.is_enabled(Some(&member)));
        assert!(!MenuItem::SpecAdmin.is_enabled(Some(&member)));
        assert_eq!(MenuItem::SpecAdmin.description(Some(&member)), "Admins only");

        assert!(MenuItem::Clusters.is_enabled(Some(&admin)));
        assert_eq!(MenuItem::Clusters.description(Some(&admin)), "Clusters and their specs");
    }
}
