use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::widgets::Paragraph;

use crate::core::markup;
use crate::core::theme::RegionStyle;
use crate::tui::component::Component;
use crate::tui::style;

/// One-line banner above the message pane.
pub struct HeaderBar<'a> {
    /// Banner markup, already `[!]`-prefixed.
    pub content: &'a str,
    pub style: &'a RegionStyle,
}

impl Component for HeaderBar<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let line = style::line(&markup::parse(self.content));
        frame.render_widget(Paragraph::new(line).style(style::region(self.style)), area);
    }
}
