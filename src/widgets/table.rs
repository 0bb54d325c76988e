use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Row, StatefulWidget, Table, TableState},
};

/// State for the [`SelectTable`] widget.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SelectionState {
    /// The currently selected index.
    selected: usize,
    /// First visible row, kept so that the selection stays on screen.
    offset: usize,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the currently selected index.
    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn select(&mut self, index: usize) {
        self.selected = index;
    }

    pub fn move_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn move_down(&mut self, max: usize) {
        if max > 0 && self.selected < max - 1 {
            self.selected += 1;
        }
    }

    /// Keeps the selection inside a list that shrank to `len` rows.
    pub fn clamp(&mut self, len: usize) {
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    /// Reset selection to 0.
    pub fn reset(&mut self) {
        self.selected = 0;
        self.offset = 0;
    }
}

const HEADER_STYLE: Style = Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD);

const SELECTED_STYLE: Style = Style::new()
    .fg(Color::Cyan)
    .bg(Color::Black)
    .add_modifier(Modifier::BOLD);

/// A table where one row is selected with up/down.
///
/// ## Example
///
/// ```rust,ignore
/// let table = SelectTable::new(rows, widths)
///     .header(Row::new(["Name", "Status"]))
///     .block(Block::bordered().title("Endpoints"));
///
/// frame.render_stateful_widget(table, area, &mut self.state.endpoints.selection);
/// ```
#[derive(Debug)]
pub struct SelectTable<'a> {
    rows: Vec<Row<'a>>,
    widths: Vec<Constraint>,
    header: Option<Row<'a>>,
    block: Option<Block<'a>>,
}

impl<'a> SelectTable<'a> {
    pub fn new(rows: Vec<Row<'a>>, widths: impl IntoIterator<Item = Constraint>) -> Self {
        Self {
            rows,
            widths: widths.into_iter().collect(),
            header: None,
            block: None,
        }
    }

    pub fn header(mut self, header: Row<'a>) -> Self {
        self.header = Some(header.style(HEADER_STYLE));
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

impl<'a> StatefulWidget for SelectTable<'a> {
    type State = SelectionState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        state.clamp(self.rows.len());
        let is_empty = self.rows.is_empty();

        let mut table = Table::new(self.rows, self.widths)
            .row_highlight_style(SELECTED_STYLE)
            .highlight_symbol("> ");
        if let Some(header) = self.header {
            table = table.header(header);
        }
        if let Some(block) = self.block {
            table = table.block(block);
        }

        let mut table_state = TableState::default().with_offset(state.offset);
        if !is_empty {
            table_state.select(Some(state.selected));
        }
        StatefulWidget::render(table, area, buf, &mut table_state);
        state.offset = table_state.offset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_bounds() {
        let mut state = SelectionState::new();
        state.move_up();
        assert_eq!(state.selected(), 0);

        state.move_down(3);
        state.move_down(3);
        state.move_down(3);
        assert_eq!(state.selected(), 2);

        state.clamp(1);
        assert_eq!(state.selected(), 0);

        state.move_down(0);
        assert_eq!(state.selected(), 0);
    }

    #[test]
    fn test_selection_scrolls_into_view() {
        let rows: Vec<Row> = (0..20).map(|i| Row::new([format!("row {}", i)])).collect();
        let mut state = SelectionState::new();
        state.select(15);

        let area = Rect::new(0, 0, 20, 5);
        let mut buf = Buffer::empty(area);
        StatefulWidget::render(
            SelectTable::new(rows, [Constraint::Fill(1)]),
            area,
            &mut buf,
            &mut state,
        );

        assert!(state.offset > 0);
        let text: String = (0..area.height)
            .flat_map(|y| (0..area.width).map(move |x| (x, y)))
            .map(|(x, y)| buf[(x, y)].symbol().to_string())
            .collect();
        assert!(text.contains("row 15"));
    }
}
