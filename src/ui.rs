use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Cell, Clear, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Table, Wrap,
    },
};

use crate::model::{LoadState, Model, UIData};

pub const STATUSLINE_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
/// Terminal row of the header, mouse clicks on it toggle the sort.
pub const TABLE_HEADER_ROW: u16 = 0;
pub const SCROLLBAR_WIDTH: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 2;
pub const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);

const SORTED_HEADER: Style = Style::new().fg(Color::Black).bg(Color::LightBlue);
const SELECTED_ROW: Style = Style::new().bg(Color::DarkGray);
const SELECTED_CELL: Style = Style::new().fg(Color::Black).bg(Color::Yellow);

#[derive(Debug, Default)]
pub struct TableUI {}

impl TableUI {
    pub fn new() -> Self {
        Self {}
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [main_area, status_area] = Layout::vertical([
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        match uidata.load_state {
            LoadState::Loading => self.draw_loading(frame, main_area),
            LoadState::Errored => self.draw_error(uidata, frame, main_area),
            LoadState::Loaded => self.draw_table(uidata, frame, main_area),
        }
        self.draw_statusline(uidata, frame, status_area);

        if uidata.show_popup {
            self.draw_popup(uidata, frame);
        }
    }

    fn draw_loading(&self, frame: &mut Frame, area: Rect) {
        let [area] = Layout::vertical([Constraint::Length(1)])
            .flex(Flex::Center)
            .areas(area);
        frame.render_widget(
            Paragraph::new("Loading albums ...".italic()).centered(),
            area,
        );
    }

    fn draw_error(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let message = uidata.error_message.as_deref().unwrap_or("unknown error");
        let text = Text::from(vec![
            Line::from("Albums could not be loaded".bold()),
            Line::from(""),
            Line::from(message.red()),
        ]);
        let [area] = Layout::vertical([Constraint::Length(3)])
            .flex(Flex::Center)
            .areas(area);
        frame.render_widget(
            Paragraph::new(text).centered().wrap(Wrap { trim: true }),
            area,
        );
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let [table_area, scrollbar_area] = Layout::horizontal([
            Constraint::Min(0),
            Constraint::Length(SCROLLBAR_WIDTH as u16),
        ])
        .areas(area);

        let header = Row::new(uidata.table.iter().map(|column| {
            let cell = Cell::from(column.name.clone()).bold();
            if column.sorted.is_some() {
                cell.style(SORTED_HEADER)
            } else {
                cell
            }
        }))
        .height(TABLE_HEADER_HEIGHT as u16);

        let nvisible = uidata.table.first().map(|c| c.data.len()).unwrap_or(0);
        let rows = (0..nvisible).map(|ridx| {
            let cells = uidata.table.iter().enumerate().map(|(cidx, column)| {
                let cell = Cell::from(column.data[ridx].as_str());
                if ridx == uidata.selected_row && cidx == uidata.selected_column {
                    cell.style(SELECTED_CELL)
                } else {
                    cell
                }
            });
            let row = Row::new(cells);
            if ridx == uidata.selected_row {
                row.style(SELECTED_ROW)
            } else {
                row
            }
        });

        let widths = uidata
            .table
            .iter()
            .map(|column| Constraint::Length(column.width as u16));

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .flex(Flex::Start);
        frame.render_widget(table, table_area);

        let mut scrollbar_state = ScrollbarState::new(uidata.nrows).position(uidata.abs_selected_row);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(None)
                .end_symbol(None),
            scrollbar_area,
            &mut scrollbar_state,
        );
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::from(format!(" {} ", uidata.name)).reversed()];
        if uidata.load_state == LoadState::Loaded {
            let row = if uidata.nrows == 0 {
                0
            } else {
                uidata.abs_selected_row + 1
            };
            spans.push(Span::from(format!(
                " {} | row {}/{} ",
                uidata.sort_description, row, uidata.nrows
            )));
        }
        let left = Line::from(spans);

        let message = if uidata.last_status_message_update.elapsed() < STATUS_MESSAGE_TIMEOUT {
            uidata.status_message.as_str()
        } else {
            "? for help"
        };
        let right = Line::from(message.blue()).right_aligned();

        let [left_area, right_area] =
            Layout::horizontal([Constraint::Fill(1), Constraint::Fill(1)]).areas(area);
        frame.render_widget(left, left_area);
        frame.render_widget(right, right_area);
    }

    fn draw_popup(&self, uidata: &UIData, frame: &mut Frame) {
        let area = popup_area(frame.area(), 60, 70);
        let block = Block::bordered().title(Line::from(" Help ".bold()).centered());
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(uidata.popup_message.as_str()).block(block),
            area,
        );
    }
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    area
}
