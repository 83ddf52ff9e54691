//! # TUI Components
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │ HeaderBar      [!] banner (when shown)    │
//! ├──────────────┬────────────────────────────┤
//! │ ChannelList  │ MessagePane                │
//! │ (25%, toggle)│ (scrollback, sticks to end)│
//! ├──────────────┴────────────────────────────┤
//! │ InputLine                                 │
//! └───────────────────────────────────────────┘
//! ```
//!
//! Components take their data as props borrowed from `App`; only the
//! message pane keeps state between frames (its scroll position).

mod channel_list;
mod header_bar;
mod input_line;
pub mod message_pane;

pub use channel_list::ChannelList;
pub use header_bar::HeaderBar;
pub use input_line::InputLine;
pub use message_pane::{MessagePane, MessagePaneState};
