use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};

use crate::core::app::App;
use crate::tui::TuiState;
use crate::tui::component::Component;
use crate::tui::components::{ChannelList, HeaderBar, InputLine, MessagePane};

/// Sidebar share of the body width.
const CHANNELS_PERCENT: u16 = 25;

pub struct Areas {
    pub header: Option<Rect>,
    pub channels: Option<Rect>,
    pub messages: Rect,
    pub input: Rect,
}

pub fn layout(area: Rect, header_visible: bool, channels_visible: bool) -> Areas {
    use Constraint::{Length, Min, Percentage};

    let header_height = if header_visible { 1 } else { 0 };
    let [header, body, input] =
        Layout::vertical([Length(header_height), Min(0), Length(1)]).areas(area);

    let (channels, messages) = if channels_visible {
        let [channels, messages] =
            Layout::horizontal([Percentage(CHANNELS_PERCENT), Min(0)]).areas(body);
        (Some(channels), messages)
    } else {
        (None, body)
    };

    Areas {
        header: header_visible.then_some(header),
        channels,
        messages,
        input,
    }
}

pub fn draw_ui(frame: &mut Frame, app: &App, tui: &mut TuiState) {
    let header = app.header.content();
    let areas = layout(frame.area(), header.is_some(), app.channels_visible);
    let theme = &app.state.get().theme_data;

    if let (Some(area), Some(content)) = (areas.header, header.as_deref()) {
        HeaderBar {
            content,
            style: &theme.header,
        }
        .render(frame, area);
    }

    if let Some(area) = areas.channels {
        let entries = app.channel_entries();
        ChannelList {
            entries: &entries,
            style: &theme.channels,
        }
        .render(frame, area);
    }

    MessagePane {
        state: &mut tui.message_pane,
        output: &app.output,
        style: &theme.messages,
    }
    .render(frame, areas.messages);

    InputLine {
        text: &app.input,
        style: &theme.input,
    }
    .render(frame, areas.input);
}
