//! Markup parsing for assistant answers.
//!
//! Answers from the analytics backend are prose with a light, loosely
//! markdown-like markup.  This module turns them into renderable structure:
//!
//! - [`parser`]: splits text into blank-line separated sections and classifies
//!   each line as a [`Block`]
//! - [`inline`]: decorates a single line into nested [`Span`]s
//!
//! Both are pure and total; nothing here can fail.

pub mod inline;
pub mod parser;

pub use inline::{Span, SpanKind, any_span, format, visible_text};
pub use parser::{Block, Section, classify, is_data_line, parse, parse_sections};
