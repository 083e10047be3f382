//! Conversation orchestration and the interactive chat application.
//!
//! # Architecture
//!
//! - [`controller`]: single-flight session state machine over a
//!   [`QueryService`](crate::client::QueryService)
//! - [`driver`]: event loop that keeps session resets responsive while a
//!   query is outstanding
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: slash command parsing

pub mod commands;
pub mod config;
pub mod controller;
pub mod driver;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, EXAMPLE_QUESTIONS, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use controller::{
    FALLBACK_TEXT, PendingQuery, SessionController, SessionState, SessionStats, SettleOutcome,
    Settled,
};
pub use driver::{SessionAction, run_session};
