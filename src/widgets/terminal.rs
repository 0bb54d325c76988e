use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Widget,
};

/// Draws a [`vt100::Screen`] cell by cell, keeping colors and attributes.
#[derive(Debug)]
pub struct TerminalView<'a> {
    screen: &'a vt100::Screen,
    show_cursor: bool,
}

impl<'a> TerminalView<'a> {
    pub fn new(screen: &'a vt100::Screen) -> Self {
        Self {
            screen,
            show_cursor: true,
        }
    }

    pub fn show_cursor(mut self, show: bool) -> Self {
        self.show_cursor = show;
        self
    }
}

fn color(color: vt100::Color) -> Color {
    match color {
        vt100::Color::Default => Color::Reset,
        vt100::Color::Idx(i) => Color::Indexed(i),
        vt100::Color::Rgb(r, g, b) => Color::Rgb(r, g, b),
    }
}

fn cell_style(cell: &vt100::Cell) -> Style {
    let mut style = Style::default()
        .fg(color(cell.fgcolor()))
        .bg(color(cell.bgcolor()));
    if cell.bold() {
        style = style.add_modifier(Modifier::BOLD);
    }
    if cell.italic() {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if cell.underline() {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if cell.inverse() {
        style = style.add_modifier(Modifier::REVERSED);
    }
    style
}

impl Widget for TerminalView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (rows, cols) = self.screen.size();
        for row in 0..rows.min(area.height) {
            for col in 0..cols.min(area.width) {
                let Some(cell) = self.screen.cell(row, col) else {
                    continue;
                };
                // the right half of a wide character is drawn by its left half
                if cell.is_wide_continuation() {
                    continue;
                }
                let Some(target) = buf.cell_mut((area.x + col, area.y + row)) else {
                    continue;
                };
                let contents = cell.contents();
                target.set_symbol(if contents.is_empty() { " " } else { &contents });
                target.set_style(cell_style(cell));
            }
        }

        if self.show_cursor && !self.screen.hide_cursor() {
            let (row, col) = self.screen.cursor_position();
            if row < area.height && col < area.width {
                if let Some(target) = buf.cell_mut((area.x + col, area.y + row)) {
                    target.set_style(Style::default().add_modifier(Modifier::REVERSED));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_colored_output() {
        let mut parser = vt100::Parser::new(3, 10, 0);
        parser.process(b"\x1b[31mred\x1b[0m ok");

        let area = Rect::new(0, 0, 10, 3);
        let mut buf = Buffer::empty(area);
        TerminalView::new(parser.screen())
            .show_cursor(false)
            .render(area, &mut buf);

        assert_eq!(buf[(0, 0)].symbol(), "r");
        assert_eq!(buf[(0, 0)].fg, Color::Indexed(1));
        assert_eq!(buf[(4, 0)].symbol(), "o");
        assert_eq!(buf[(4, 0)].fg, Color::Reset);
    }

    #[test]
    fn test_clips_to_area() {
        let mut parser = vt100::Parser::new(2, 20, 0);
        parser.process(b"0123456789abcdefghij");

        let area = Rect::new(0, 0, 5, 1);
        let mut buf = Buffer::empty(area);
        TerminalView::new(parser.screen()).render(area, &mut buf);
        assert_eq!(buf[(4, 0)].symbol(), "4");
    }
}
