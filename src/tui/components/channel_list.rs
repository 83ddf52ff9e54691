use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Paragraph};

use crate::core::app::ChannelEntry;
use crate::core::theme::ChannelStyle;
use crate::tui::component::Component;
use crate::tui::style;

/// Sidebar of the active guild's text channels.
pub struct ChannelList<'a> {
    pub entries: &'a [ChannelEntry],
    pub style: &'a ChannelStyle,
}

impl ChannelList<'_> {
    fn entry_style(&self, entry: &ChannelEntry) -> Style {
        if entry.active {
            Style::default()
                .fg(style::named(&self.style.foreground_color_hover))
                .bg(style::named(&self.style.background_color_hover))
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    }
}

impl Component for ChannelList<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let lines: Vec<Line> = self
            .entries
            .iter()
            .map(|e| Line::styled(e.label.clone(), self.entry_style(e)))
            .collect();
        let base = Style::default()
            .fg(style::named(&self.style.foreground_color))
            .bg(style::named(&self.style.background_color));
        let list = Paragraph::new(lines)
            .style(base)
            .block(Block::bordered().title("Channels").border_style(base));
        frame.render_widget(list, area);
    }
}
