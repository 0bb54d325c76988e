use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph},
};
use std::str::FromStr;
use tui_input::Input;
use tui_input::backend::crossterm::EventHandler;

/// Width of the label column, including its leading space.
const LABEL_WIDTH: u16 = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldKind {
    Text,
    /// Shown as `*`.
    Secret,
    /// `yes` / `no`, flipped with space or ←→.
    Toggle,
    /// Shown but not editable, e.g. the key of the record being edited.
    Locked,
}

/// One labelled input of a [`FormState`].
#[derive(Debug)]
pub struct FormField {
    label: &'static str,
    input: Input,
    kind: FieldKind,
}

impl FormField {
    pub fn text(label: &'static str, value: impl ToString) -> Self {
        Self {
            label,
            input: Input::new(value.to_string()),
            kind: FieldKind::Text,
        }
    }

    pub fn secret(label: &'static str) -> Self {
        Self {
            kind: FieldKind::Secret,
            ..Self::text(label, "")
        }
    }

    pub fn toggle(label: &'static str, on: bool) -> Self {
        Self {
            kind: FieldKind::Toggle,
            ..Self::text(label, yes_no(on))
        }
    }

    pub fn locked(label: &'static str, value: impl ToString) -> Self {
        Self {
            kind: FieldKind::Locked,
            ..Self::text(label, value)
        }
    }

    fn shown(&self) -> String {
        match self.kind {
            FieldKind::Secret => "*".repeat(self.input.value().chars().count()),
            _ => self.input.value().to_string(),
        }
    }
}

fn yes_no(on: bool) -> &'static str {
    if on { "yes" } else { "no" }
}

/// What a key did to a form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormAction {
    None,
    Submit,
    Cancel,
}

/// A popup form of labelled inputs, addressed by a field key `F`.
///
/// Enter moves to the next field and submits on the last one, Ctrl+S submits
/// from anywhere, Esc cancels.
#[derive(Debug)]
pub struct FormState<F> {
    title: String,
    fields: Vec<(F, FormField)>,
    focus: usize,
    hint: Option<&'static str>,
    /// Why the last submit was refused.
    pub error: Option<String>,
}

impl<F: Copy + PartialEq> FormState<F> {
    pub fn new(title: impl Into<String>, fields: Vec<(F, FormField)>) -> Self {
        let focus = fields
            .iter()
            .position(|(_, f)| f.kind != FieldKind::Locked)
            .unwrap_or(0);
        Self {
            title: title.into(),
            fields,
            focus,
            hint: None,
            error: None,
        }
    }

    /// Dim line shown under the fields while there is no error.
    pub fn with_hint(mut self, hint: &'static str) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    fn field(&self, key: F) -> Option<&FormField> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, f)| f)
    }

    /// Current text of `key`, empty for a key the form does not have.
    pub fn value(&self, key: F) -> &str {
        self.field(key).map(|f| f.input.value()).unwrap_or_default()
    }

    pub fn trimmed(&self, key: F) -> String {
        self.value(key).trim().to_string()
    }

    /// Parses `key`, the error names the field.
    pub fn parse<T: FromStr>(&self, key: F) -> Result<T, String> {
        let label = self.field(key).map(|f| f.label).unwrap_or("Value");
        self.value(key)
            .trim()
            .parse()
            .map_err(|_| format!("{} must be a number", label.trim_end_matches(':')))
    }

    pub fn is_on(&self, key: F) -> bool {
        self.value(key) == "yes"
    }

    pub fn focused(&self) -> Option<F> {
        self.fields.get(self.focus).map(|(k, _)| *k)
    }

    pub fn focus(&mut self, key: F) {
        if let Some(i) = self.fields.iter().position(|(k, _)| *k == key) {
            self.focus = i;
        }
    }

    fn editable(&self) -> impl Iterator<Item = usize> + '_ {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, (_, f))| f.kind != FieldKind::Locked)
            .map(|(i, _)| i)
    }

    pub fn up(&mut self) {
        let previous = self.editable().filter(|i| *i < self.focus).last();
        if let Some(i) = previous {
            self.focus = i;
        }
    }

    pub fn down(&mut self) {
        let next = self.editable().find(|i| *i > self.focus);
        if let Some(i) = next {
            self.focus = i;
        }
    }

    pub fn is_last(&self) -> bool {
        self.editable().last().is_none_or(|i| i == self.focus)
    }

    /// Feeds a key to the form.
    pub fn handle_key(&mut self, key: KeyEvent) -> FormAction {
        match (key.modifiers, key.code) {
            (_, KeyCode::Esc) => return FormAction::Cancel,
            (KeyModifiers::CONTROL, KeyCode::Char('s')) => return FormAction::Submit,
            (_, KeyCode::Enter) if self.is_last() => return FormAction::Submit,
            (_, KeyCode::Enter) | (_, KeyCode::Down) | (_, KeyCode::Tab) => self.down(),
            (_, KeyCode::Up) | (_, KeyCode::BackTab) => self.up(),
            _ => self.type_key(key),
        }
        FormAction::None
    }

    fn type_key(&mut self, key: KeyEvent) {
        let Some((_, field)) = self.fields.get_mut(self.focus) else {
            return;
        };
        match field.kind {
            FieldKind::Locked => return,
            FieldKind::Toggle => {
                if matches!(key.code, KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right) {
                    let on = field.input.value() == "yes";
                    field.input = Input::new(yes_no(!on).to_string());
                }
            }
            FieldKind::Text | FieldKind::Secret => {
                field.input.handle_event(&Event::Key(key));
            }
        }
        self.error = None;
    }
}

/// Draws `form` as a popup centered in `area`.
pub fn draw_form<F: Copy + PartialEq>(frame: &mut Frame, area: Rect, form: &FormState<F>) {
    let height = form.fields.len() as u16 + 4;
    let [popup] = Layout::horizontal([Constraint::Length(76)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(popup);

    let mut lines = Vec::with_capacity(form.fields.len() + 2);
    for (i, (_, field)) in form.fields.iter().enumerate() {
        let style = match field.kind {
            FieldKind::Locked => Style::default().fg(Color::DarkGray),
            _ if i == form.focus => Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
            _ => Style::default(),
        };
        lines.push(Line::from(vec![
            format!(" {:<width$}", field.label, width = LABEL_WIDTH as usize - 1).into(),
            Span::styled(field.shown(), style),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(match (&form.error, form.hint) {
        (Some(err), _) => Line::from(format!(" {}", err)).red(),
        (None, Some(hint)) => Line::from(format!(" {}", hint)).dim(),
        (None, None) => Line::from(" Enter: next / submit  |  Ctrl+S: submit  |  Esc: cancel").dim(),
    });

    let block = Block::bordered().title(format!(" {} ", form.title)).cyan();
    let inner = block.inner(popup);
    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(lines).block(block), popup);

    if let Some((_, field)) = form.fields.get(form.focus) {
        if matches!(field.kind, FieldKind::Text | FieldKind::Secret) {
            let cursor = field.input.visual_cursor() as u16;
            frame.set_cursor_position((inner.x + LABEL_WIDTH + cursor, inner.y + form.focus as u16));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Field {
        Id,
        Name,
        Password,
        Enabled,
    }

    fn form() -> FormState<Field> {
        FormState::new(
            "Edit",
            vec![
                (Field::Id, FormField::locked("ID:", 7)),
                (Field::Name, FormField::text("Name:", "a")),
                (Field::Password, FormField::secret("Password:")),
                (Field::Enabled, FormField::toggle("Enabled:", true)),
            ],
        )
    }

    fn press(form: &mut FormState<Field>, code: KeyCode) -> FormAction {
        form.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_navigation_skips_locked_fields() {
        let mut form = form();
        assert_eq!(form.focused(), Some(Field::Name));
        form.up();
        assert_eq!(form.focused(), Some(Field::Name));

        assert_eq!(press(&mut form, KeyCode::Enter), FormAction::None);
        assert_eq!(press(&mut form, KeyCode::Tab), FormAction::None);
        assert_eq!(form.focused(), Some(Field::Enabled));
        assert!(form.is_last());
        assert_eq!(press(&mut form, KeyCode::Enter), FormAction::Submit);
        assert_eq!(press(&mut form, KeyCode::Esc), FormAction::Cancel);
    }

    #[test]
    fn test_editing() {
        let mut form = form();
        press(&mut form, KeyCode::Char('b'));
        assert_eq!(form.value(Field::Name), "ab");
        assert_eq!(form.trimmed(Field::Id), "7");
        assert_eq!(form.parse::<i64>(Field::Id), Ok(7));
        assert_eq!(form.parse::<u32>(Field::Name).unwrap_err(), "Name must be a number");

        form.focus(Field::Password);
        press(&mut form, KeyCode::Char('x'));
        assert_eq!(form.fields[2].1.shown(), "*");

        form.focus(Field::Enabled);
        press(&mut form, KeyCode::Char('q'));
        assert!(form.is_on(Field::Enabled));
        press(&mut form, KeyCode::Char(' '));
        assert!(!form.is_on(Field::Enabled));
    }
}
