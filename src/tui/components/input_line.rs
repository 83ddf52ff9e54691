use ratatui::Frame;
use ratatui::layout::{Position, Rect};
use ratatui::widgets::Paragraph;
use unicode_width::UnicodeWidthStr;

use crate::core::theme::RegionStyle;
use crate::tui::component::Component;
use crate::tui::style;

/// Single-line input. Long input scrolls so the cursor stays visible.
pub struct InputLine<'a> {
    pub text: &'a str,
    pub style: &'a RegionStyle,
}

impl InputLine<'_> {
    /// Columns to skip so the end of the text fits in `width`.
    fn scroll_offset(&self, width: u16) -> u16 {
        let text_width = self.text.width() as u16;
        // one column for the cursor
        (text_width + 1).saturating_sub(width)
    }
}

impl Component for InputLine<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let offset = self.scroll_offset(area.width);
        let input = Paragraph::new(self.text)
            .style(style::region(self.style))
            .scroll((0, offset));
        frame.render_widget(input, area);

        let cursor_x = (self.text.width() as u16).saturating_sub(offset);
        frame.set_cursor_position(Position::new(
            area.x + cursor_x.min(area.width.saturating_sub(1)),
            area.y,
        ));
    }
}
