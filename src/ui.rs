use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Clear, Paragraph},
};

use crate::model::{CellView, Model, PickerData, RowView, UIData};

pub const TOGGLE_BAR_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const STATUSLINE_HEIGHT: usize = 1;
// A detail panel renders two lines, description and url.
pub const DETAIL_HEIGHT: usize = 2;
pub const COLUMN_WIDTH_MARGIN: usize = 2;
pub const EXPAND_CONTROL_WIDTH: usize = 2;
pub const MIN_COLUMN_WIDTH: usize = 4;
pub const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(4);

pub struct CatalogUI;

impl CatalogUI {
    pub fn new() -> Self {
        CatalogUI
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [toggle_area, table_area, status_area] = Layout::vertical([
            Constraint::Length(TOGGLE_BAR_HEIGHT as u16),
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        frame.render_widget(toggle_bar(uidata), toggle_area);
        frame.render_widget(table(uidata), table_area);
        frame.render_widget(status_line(uidata), status_area);

        if let Some(picker) = &uidata.picker {
            render_picker(picker, frame);
        }
        if uidata.show_popup {
            render_popup(&uidata.popup_message, frame);
        }
    }
}

fn toggle_bar(uidata: &UIData) -> Paragraph<'_> {
    let mut spans: Vec<Span> = vec![
        Span::styled(
            format!(" {} ", uidata.name),
            Style::new().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
    ];
    for toggle in uidata.toggles.iter() {
        let style = if toggle.active {
            Style::new().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::new().add_modifier(Modifier::DIM)
        };
        spans.push(Span::styled(format!("[{} {}]", toggle.key, toggle.title), style));
        spans.push(Span::raw(" "));
    }
    Paragraph::new(Line::from(spans))
}

fn table(uidata: &UIData) -> Paragraph<'_> {
    let mut lines: Vec<Line> = Vec::with_capacity(uidata.rows.len() + 1);

    let mut header: Vec<Span> = vec![Span::raw(" ".repeat(EXPAND_CONTROL_WIDTH))];
    for column in uidata.headers.iter() {
        let mut title = column.title.clone();
        match column.sort {
            Some(true) => title.push('▲'),
            Some(false) => title.push('▼'),
            None => {}
        }
        let style = if column.selected {
            Style::new()
                .add_modifier(Modifier::BOLD)
                .add_modifier(Modifier::UNDERLINED)
        } else {
            Style::new().add_modifier(Modifier::BOLD)
        };
        header.push(Span::styled(pad(&clip(&title, column.width), column.width), style));
        header.push(Span::raw(" "));
    }
    lines.push(Line::from(header));

    for row in uidata.rows.iter() {
        match row {
            RowView::Record(record) => {
                let mut spans: Vec<Span> = Vec::new();
                let control = if record.expanded { "▾ " } else { "▸ " };
                spans.push(Span::raw(control));
                for (cell, column) in record.cells.iter().zip(uidata.headers.iter()) {
                    match cell {
                        CellView::Text(text) => {
                            spans.push(Span::raw(pad(&clip(text, column.width), column.width)));
                            spans.push(Span::raw(" "));
                        }
                        CellView::Tags(tags) => {
                            let mut used = 0;
                            for tag in tags.iter() {
                                let tag_width = tag.text.chars().count();
                                if used + tag_width + 1 > column.width {
                                    break;
                                }
                                let style = if tag.active {
                                    Style::new()
                                        .fg(Color::Green)
                                        .add_modifier(Modifier::BOLD)
                                        .add_modifier(Modifier::REVERSED)
                                } else {
                                    Style::new().fg(Color::Cyan)
                                };
                                spans.push(Span::styled(tag.text.clone(), style));
                                spans.push(Span::raw(" "));
                                used += tag_width + 1;
                            }
                            if used < column.width + 1 {
                                spans.push(Span::raw(" ".repeat(column.width + 1 - used)));
                            }
                        }
                    }
                }
                let mut line = Line::from(spans);
                if record.selected {
                    line = line.style(Style::new().bg(Color::DarkGray));
                }
                lines.push(line);
            }
            RowView::Detail(detail) => {
                lines.push(Line::from(Span::styled(
                    format!("    {}", detail.description),
                    Style::new().add_modifier(Modifier::ITALIC),
                )));
                lines.push(Line::from(Span::styled(
                    format!("    {}", detail.url),
                    Style::new()
                        .fg(Color::Blue)
                        .add_modifier(Modifier::UNDERLINED),
                )));
            }
        }
    }

    Paragraph::new(Text::from(lines))
}

fn status_line(uidata: &UIData) -> Paragraph<'_> {
    let width = uidata.layout.statusline_width;

    let left = if let Some(prompt) = &uidata.prompt {
        format!(" Search: {prompt}▏")
    } else if uidata.last_status_message_update.elapsed() < STATUS_MESSAGE_TIMEOUT
        && !uidata.status_message.is_empty()
    {
        format!(" {}", uidata.status_message)
    } else if uidata.show_reset {
        format!(" tags: {}", uidata.active_tags.join("+"))
    } else {
        String::new()
    };

    // The reset affordance is shown exactly while tag filters are active.
    let mut right = String::new();
    if uidata.show_reset {
        right.push_str("[r] reset  ");
    }
    if uidata.value_filters_active {
        right.push_str("[filtered]  ");
    }
    if uidata.nrows != uidata.total {
        right.push_str(&format!(
            "{}/{} of {} links  [?] help ",
            uidata.abs_selected_row, uidata.nrows, uidata.total
        ));
    } else {
        right.push_str(&format!(
            "{}/{} links  [?] help ",
            uidata.abs_selected_row, uidata.nrows
        ));
    }

    let used = left.chars().count() + right.chars().count();
    let filler = " ".repeat(width.saturating_sub(used));
    Paragraph::new(Line::from(vec![
        Span::styled(left, Style::new().add_modifier(Modifier::BOLD)),
        Span::raw(filler),
        Span::raw(right),
    ]))
}

fn render_picker(picker: &PickerData, frame: &mut Frame) {
    let area = frame.area();
    let inner_height = std::cmp::min(picker.entries.len(), 16);
    let popup = centered_rect(44, inner_height as u16 + 2, area);

    // Keep the selected entry inside the window.
    let start = picker
        .selected
        .saturating_sub(inner_height.saturating_sub(1));
    let lines: Vec<Line> = picker
        .entries
        .iter()
        .enumerate()
        .skip(start)
        .take(inner_height)
        .map(|(idx, entry)| {
            let marker = if entry.active { "●" } else { " " };
            let mut style = Style::new();
            if entry.active {
                style = style.fg(Color::Green);
            }
            if idx == picker.selected {
                style = style.add_modifier(Modifier::REVERSED);
            }
            Line::from(Span::styled(
                format!(" {marker} {:<32} {:>5} ", clip(&entry.label, 32), entry.count),
                style,
            ))
        })
        .collect();

    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(Text::from(lines)).block(Block::bordered().title(picker.title.clone())),
        popup,
    );
}

fn render_popup(message: &str, frame: &mut Frame) {
    let area = frame.area();
    let height = message.lines().count() as u16 + 2;
    let popup = centered_rect(60, height, area);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(message.to_string()).block(Block::bordered().title(" Help ")),
        popup,
    );
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = std::cmp::min(width, area.width);
    let height = std::cmp::min(height, area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn clip(text: &str, width: usize) -> String {
    if width < 3 {
        return "".to_string();
    }
    if text.chars().count() > width {
        let mut reduced: String = text.chars().take(width - 3).collect();
        reduced.push_str("...");
        reduced
    } else {
        text.to_string()
    }
}

fn pad(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count >= width {
        text.to_string()
    } else {
        format!("{}{}", text, " ".repeat(width - count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_keeps_short_text_and_truncates_long_text() {
        assert_eq!(clip("Title", 10), "Title");
        assert_eq!(clip("A very long column value", 10), "A very ...");
        assert_eq!(clip("anything", 2), "");
    }

    #[test]
    fn pad_fills_up_to_the_column_width() {
        assert_eq!(pad("ab", 4), "ab  ");
        assert_eq!(pad("abcd", 4), "abcd");
        assert_eq!(pad("abcdef", 4), "abcdef");
    }

    #[test]
    fn centered_rect_is_clamped_to_the_area() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = centered_rect(44, 18, area);
        assert_eq!(popup.width, 44);
        assert_eq!(popup.height, 18);
        assert_eq!(popup.x, 28);
        assert_eq!(popup.y, 11);

        let tiny = Rect::new(0, 0, 20, 5);
        let popup = centered_rect(44, 18, tiny);
        assert!(popup.width <= tiny.width);
        assert!(popup.height <= tiny.height);
    }
}
