use crate::common::{ApiResult, BillingPage, BillingRecord, Usage};
use crate::monitor::Feed;
use crate::utils::local_time;
use crate::views::status_color;
use crate::widgets::{SelectTable, SelectionState};
use crate::{App, AppView};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Paragraph, Row},
};

/// Billing records per page.
const PAGE_SIZE: u32 = 20;

#[derive(Debug, Default)]
pub struct BillingState {
    pub usage_feed: Feed<ApiResult<Usage>>,
    pub records_feed: Feed<ApiResult<BillingPage>>,
    pub usage: Option<Usage>,
    pub records: Vec<BillingRecord>,
    pub total: u64,
    pub offset: u32,
    pub loaded: bool,
    pub error: Option<String>,
    pub selection: SelectionState,
}

impl BillingState {
    pub fn page(&self) -> u32 {
        self.offset / PAGE_SIZE + 1
    }

    pub fn page_count(&self) -> u64 {
        self.total.div_ceil(PAGE_SIZE as u64).max(1)
    }

    /// Moves one page forward, `false` on the last page.
    pub fn next_page(&mut self) -> bool {
        if (self.page() as u64) < self.page_count() {
            self.offset += PAGE_SIZE;
            true
        } else {
            false
        }
    }

    pub fn prev_page(&mut self) -> bool {
        if self.offset == 0 {
            return false;
        }
        self.offset = self.offset.saturating_sub(PAGE_SIZE);
        true
    }
}

impl App {
    pub(crate) fn open_billing(&mut self) {
        let api = self.api.clone();
        self.state
            .billing
            .usage_feed
            .spawn_once(async move { api.usage().await });
        self.fetch_billing_records();
        self.view = AppView::Billing;
    }

    fn fetch_billing_records(&mut self) {
        let api = self.api.clone();
        let offset = self.state.billing.offset;
        self.state
            .billing
            .records_feed
            .spawn_once(async move { api.billing_records(PAGE_SIZE, offset).await });
    }

    pub(crate) fn tick_billing(&mut self) {
        let state = &mut self.state.billing;
        if let Some(result) = state.usage_feed.latest() {
            match result {
                Ok(usage) => state.usage = Some(usage),
                Err(err) => tracing::debug!("billing usage unavailable: {}", err),
            }
        }
        if let Some(result) = state.records_feed.latest() {
            match result {
                Ok(page) => {
                    state.records = page.records;
                    state.total = page.total;
                    state.error = None;
                    state.selection.clamp(state.records.len());
                }
                Err(err) => state.error = Some(err.to_string()),
            }
            state.loaded = true;
        }
    }

    pub fn draw_billing(&mut self, frame: &mut Frame) {
        let area = frame.area();

        let vertical = Layout::vertical([
            Constraint::Length(3), // Title
            Constraint::Length(3), // Usage
            Constraint::Min(0),    // Records
            Constraint::Length(3), // Footer
        ]);
        let [title_area, usage_area, table_area, footer_area] = vertical.areas(area);

        let title = Line::from("Billing").bold().cyan().centered();
        frame.render_widget(Paragraph::new(title), title_area);

        let state = &mut self.state.billing;
        let usage = match &state.usage {
            Some(usage) => Line::from(vec![
                Span::styled(" Total Cost (7d) ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    format!("${:.2}", usage.total_amount),
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                ),
                Span::styled("   GPU Hours ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    format!("{:.1}h", usage.total_hours()),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
            ]),
            None => Line::from(" Loading usage...").dim(),
        };
        frame.render_widget(Paragraph::new(usage).block(Block::bordered()), usage_area);

        if !state.loaded {
            frame.render_widget(
                Paragraph::new("Loading billing records...")
                    .block(Block::bordered())
                    .centered(),
                table_area,
            );
        } else if state.records.is_empty() {
            let text = match &state.error {
                Some(err) => Line::from(format!("Error: {}", err)).red(),
                None => Line::from("No billing records"),
            };
            frame.render_widget(
                Paragraph::new(text).block(Block::bordered()).centered(),
                table_area,
            );
        } else {
            let rows: Vec<Row> = state
                .records
                .iter()
                .map(|r| {
                    Row::new(vec![
                        Line::from(r.worker_id.clone()),
                        Line::from(r.endpoint_name.clone()),
                        Line::from(r.spec_name.clone()),
                        Line::from(format!("{:.2}h", r.duration_seconds / 3600.0)),
                        Line::from(format!("${:.4}", r.amount)),
                        Line::from(r.status.clone()).style(Style::default().fg(status_color(&r.status))),
                        Line::from(local_time(r.created_at.as_deref())),
                    ])
                })
                .collect();

            let mut block = Block::bordered().title(format!(
                " Page {} of {} ({} records) ",
                state.page(),
                state.page_count(),
                state.total
            ));
            if let Some(err) = &state.error {
                block = block.title_bottom(Line::from(format!(" Refresh failed: {} ", err)).red());
            }
            let table = SelectTable::new(
                rows,
                [
                    Constraint::Fill(3),
                    Constraint::Fill(2),
                    Constraint::Fill(2),
                    Constraint::Length(9),
                    Constraint::Length(10),
                    Constraint::Length(11),
                    Constraint::Length(20),
                ],
            )
            .header(Row::new(vec![
                "Worker", "Endpoint", "Spec", "Duration", "Amount", "Status", "Created",
            ]))
            .block(block);
            frame.render_stateful_widget(table, table_area, &mut state.selection);
        }

        self.draw_footer(
            frame,
            footer_area,
            "↑↓: Select  |  ←→: Page  |  r: Refresh  |  Esc: Back",
        );
    }

    pub fn handle_billing_input(&mut self, key: KeyEvent) {
        match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c') | KeyCode::Char('C')) => self.quit(),
            (_, KeyCode::Esc) => {
                self.state.billing = BillingState::default();
                self.view = AppView::Menu;
            }
            (_, KeyCode::Up) => self.state.billing.selection.move_up(),
            (_, KeyCode::Down) => {
                let len = self.state.billing.records.len();
                self.state.billing.selection.move_down(len);
            }
            (_, KeyCode::Right) => {
                if self.state.billing.next_page() {
                    self.state.billing.selection.reset();
                    self.fetch_billing_records();
                }
            }
            (_, KeyCode::Left) => {
                if self.state.billing.prev_page() {
                    self.state.billing.selection.reset();
                    self.fetch_billing_records();
                }
            }
            (_, KeyCode::Char('r')) => self.open_billing(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billing_paging() {
        let mut state = BillingState {
            total: 45,
            ..Default::default()
        };
        assert_eq!(state.page_count(), 3);
        assert!(!state.prev_page());
        assert!(state.next_page());
        assert!(state.next_page());
        assert_eq!(state.page(), 3);
        assert!(!state.next_page());
        assert!(state.prev_page());
        assert_eq!(state.offset, 20);

        let empty = BillingState::default();
        assert_eq!(empty.page_count(), 1);
    }
}
