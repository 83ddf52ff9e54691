//! # Core Application Logic
//!
//! Everything the client knows and decides, with no terminal and no network.
//!
//! ```text
//!     key press ─┐                       ┌─► Effect::Send / Watch / ...
//!                ├─► Action ─► update() ─┤
//!  transport ────┘     (App mutates)     └─► Effect::ArmTimer / Exit
//! ```
//!
//! The TUI turns input into [`action::Action`]s and executes the
//! [`action::Effect`]s that come back; nothing in here blocks or does I/O
//! except state and theme files.

pub mod action;
pub mod app;
pub mod cipher;
pub mod color;
pub mod commands;
pub mod config;
pub mod directory;
pub mod header;
pub mod markup;
pub mod persist;
pub mod render;
pub mod state;
pub mod tags;
pub mod theme;
pub mod typing;
