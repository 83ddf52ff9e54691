//! # MessagePane Component
//!
//! Scrollable view of the output buffer.
//!
//! `MessagePane` is created each frame around `&mut MessagePaneState`,
//! which carries the scroll position between frames. New lines re-pin the
//! view to the bottom; scrolling up unpins it until the user scrolls back
//! down to the end.

use ratatui::Frame;
use ratatui::layout::{Position, Rect, Size};
use ratatui::text::Line;
use ratatui::widgets::{Paragraph, Wrap};
use tui_scrollview::{ScrollView, ScrollViewState, ScrollbarVisibility};

use crate::core::render::Output;
use crate::core::theme::RegionStyle;
use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;
use crate::tui::style;

/// Must be persisted in the parent TuiState.
pub struct MessagePaneState {
    pub scroll_state: ScrollViewState,
    /// When true, auto-scroll to bottom on new content
    pub stick_to_bottom: bool,
    content_height: u16,
    viewport_height: u16,
}

impl Default for MessagePaneState {
    fn default() -> Self {
        Self::new()
    }
}

impl MessagePaneState {
    pub fn new() -> Self {
        Self {
            scroll_state: ScrollViewState::default(),
            stick_to_bottom: true,
            content_height: 0,
            viewport_height: 0,
        }
    }

    fn max_offset(&self) -> u16 {
        self.content_height.saturating_sub(self.viewport_height)
    }

    fn repin_if_at_bottom(&mut self) {
        let current = self.scroll_state.offset();
        if current.y >= self.max_offset() {
            self.stick_to_bottom = true;
            self.scroll_state.set_offset(Position {
                x: current.x,
                y: self.max_offset(),
            });
        }
    }
}

pub struct MessagePane<'a> {
    pub state: &'a mut MessagePaneState,
    pub output: &'a Output,
    pub style: &'a RegionStyle,
}

impl Component for MessagePane<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let content_width = area.width.saturating_sub(1); // scrollbar column
        let lines: Vec<Line> = self.output.lines().map(|l| style::line(&l.spans)).collect();
        let paragraph = Paragraph::new(lines)
            .style(style::region(self.style))
            .wrap(Wrap { trim: false });
        let content_height = (paragraph.line_count(content_width) as u16).max(area.height);

        self.state.content_height = content_height;
        self.state.viewport_height = area.height;

        let mut scroll_view = ScrollView::new(Size::new(content_width, content_height))
            .vertical_scrollbar_visibility(ScrollbarVisibility::Automatic)
            .horizontal_scrollbar_visibility(ScrollbarVisibility::Never);
        scroll_view.render_widget(paragraph, Rect::new(0, 0, content_width, content_height));

        if self.state.stick_to_bottom {
            self.state.scroll_state.scroll_to_bottom();
        }
        frame.render_stateful_widget(scroll_view, area, &mut self.state.scroll_state);
    }
}

impl EventHandler for MessagePaneState {
    type Event = ();

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::ScrollUp => {
                self.scroll_state.scroll_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollDown => {
                self.scroll_state.scroll_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollPageUp => {
                self.scroll_state.scroll_page_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollPageDown => {
                self.scroll_state.scroll_page_down();
                self.repin_if_at_bottom();
            }
            _ => {}
        }
        None
    }
}
