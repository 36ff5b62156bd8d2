use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use unicode_width::UnicodeWidthStr;

use crate::form::{App, Focus, Outcome, BODY_PLACEHOLDER, SUBJECT_PLACEHOLDER};

const HORIZONTAL_MARGIN: u16 = 2;
const BODY_HEIGHT: u16 = 8;

pub const TITLE: &str = "Email Compliance Classification";
pub const DESCRIPTION: &str = "Classifies email content for competition-law compliance.";
const HELP: &str = "tab: next field · enter: newline / classify · ctrl+r: classify · ctrl+l: clear · esc: quit";

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let green_bold_style = Style::default().patch(bold_style).fg(Color::Green);
        let yellow_style = Style::default().fg(Color::Yellow);
        let red_bold_style = Style::default().patch(bold_style).fg(Color::Red);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let focused_style = Style::default().fg(Color::Cyan);

        let notice_lines = u16::from(self.label_notice.is_some());

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(notice_lines),
                Constraint::Length(2),
                Constraint::Length(BODY_HEIGHT),
                Constraint::Length(1),
                Constraint::Min(4),
                Constraint::Length(1),
            ])
            .split(area);

        Paragraph::new(Span::styled(TITLE, bold_style)).render(chunks[0], buf);
        Paragraph::new(Span::styled(DESCRIPTION, dim_style)).render(chunks[1], buf);
        Paragraph::new(Span::styled(
            format!("✓ Model loaded ({})", self.device),
            green_bold_style,
        ))
        .render(chunks[2], buf);

        if let Some(notice) = &self.label_notice {
            Paragraph::new(Span::styled(
                format!("⚠ Label mapping fallback: {notice}"),
                yellow_style,
            ))
            .render(chunks[3], buf);
        }

        Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled("Enter email details", bold_style)),
        ])
        .render(chunks[4], buf);

        let fields = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[5]);

        let field_block = |title: &'static str, focus: Focus| {
            let block = Block::default().borders(Borders::ALL).title(title);
            if self.focus == focus {
                block.border_style(focused_style)
            } else {
                block
            }
        };
        let field_text = |value: &str, placeholder: &'static str| {
            if value.is_empty() {
                Paragraph::new(Span::styled(placeholder, dim_style))
            } else {
                Paragraph::new(value.to_string())
            }
        };

        let subject_area = Rect {
            height: fields[0].height.min(3),
            ..fields[0]
        };
        field_text(&self.subject, SUBJECT_PLACEHOLDER)
            .block(field_block("Subject", Focus::Subject))
            .render(subject_area, buf);

        // Keep the end of a long body visible.
        let body_rows = wrapped_rows(&self.body, fields[1].width.saturating_sub(2));
        let visible = fields[1].height.saturating_sub(2);
        field_text(&self.body, BODY_PLACEHOLDER)
            .block(field_block("Body", Focus::Body))
            .wrap(Wrap { trim: false })
            .scroll((body_rows.saturating_sub(visible), 0))
            .render(fields[1], buf);

        let button_style = if self.focus == Focus::Classify {
            Style::default()
                .patch(bold_style)
                .fg(Color::Black)
                .bg(Color::Cyan)
        } else {
            bold_style
        };
        Paragraph::new(Span::styled("[ Classify ]", button_style))
            .alignment(Alignment::Center)
            .render(chunks[6], buf);

        let result: Vec<Line> = match &self.outcome {
            None => vec![],
            Some(Outcome::Warning(message)) => {
                vec![Line::from(Span::styled(format!("⚠ {message}"), yellow_style))]
            }
            Some(Outcome::Failed(message)) => {
                vec![Line::from(Span::styled(message.clone(), red_bold_style))]
            }
            Some(Outcome::Classified { prediction, ranked }) => {
                let mut lines = vec![
                    Line::from(""),
                    Line::from(vec![
                        Span::styled("Classification: ", bold_style),
                        Span::raw(prediction.label.clone()),
                    ]),
                    Line::from(vec![
                        Span::styled("Confidence: ", bold_style),
                        Span::raw(format!("{:.4}", prediction.confidence)),
                    ]),
                ];
                if ranked.len() > 1 {
                    lines.push(Line::from(""));
                    lines.extend(ranked.iter().map(|(label, p)| {
                        Line::from(Span::styled(format!("  {label:<30} {p:.4}"), dim_style))
                    }));
                }
                lines
            }
        };
        Paragraph::new(result)
            .wrap(Wrap { trim: false })
            .render(chunks[7], buf);

        Paragraph::new(Span::styled(HELP, dim_style)).render(chunks[8], buf);
    }
}

/// Rows `text` occupies when wrapped at `width` columns.
fn wrapped_rows(text: &str, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = text
        .split('\n')
        .map(|line| line.width().div_ceil(width).max(1))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    #[test]
    fn wrapped_rows_counts_soft_and_hard_breaks() {
        assert_eq!(wrapped_rows("", 10), 1);
        assert_eq!(wrapped_rows("a\n", 10), 2);
        assert_eq!(wrapped_rows(&"x".repeat(25), 10), 3);
        assert_eq!(wrapped_rows("short\n0123456789ab", 10), 3);
        assert_eq!(wrapped_rows(&"\n".repeat(70_000), 10), u16::MAX);
    }

    #[test]
    fn long_unbroken_body_keeps_its_tail_visible() {
        let mut app = App::new("cpu", None);
        app.body = format!("{}END", "x".repeat(300));
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal
            .draw(|f| f.render_widget(&app, f.area()))
            .unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content.iter().map(|cell| cell.symbol()).collect();
        assert!(text.contains("END"));
    }
}
