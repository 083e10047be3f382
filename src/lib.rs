//! Conversational client for a natural-language data analytics backend.
//!
//! Questions go to the backend through a [`QueryService`]; answers are kept
//! in a [`Transcript`] by a single-flight [`SessionController`] and parsed
//! into renderable structure by [`markup`].

// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod markup;
pub mod observability;
pub mod render;
pub mod transcript;
pub mod types;

// Re-exports
pub use chat::{SessionController, SessionState, SettleOutcome};
pub use client::{AnalyticsClient, QueryService};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{ChartResolver, PlainTextRenderer, RedrawFlag, Renderer, TranscriptView};
pub use transcript::{Transcript, TranscriptEvent, TranscriptObserver};
pub use types::*;
