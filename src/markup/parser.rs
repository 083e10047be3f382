//! Block-level classification of raw assistant text.
//!
//! Parsing is total: every line lands in some block, and unrecognized lines
//! fall through to [`Block::Paragraph`].

use std::sync::OnceLock;

use regex::Regex;

use crate::markup::inline::{self, Span};

/// A structurally classified line of assistant text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// `#`, `##` or `###` heading.
    Header {
        /// Number of leading markers, 1 through 3.
        level: u8,
        /// Heading text, not inline formatted.
        text: String,
    },
    /// Bulleted list entry with the glyph removed.
    BulletItem {
        /// Formatted remainder of the line.
        spans: Vec<Span>,
    },
    /// Numbered list entry; the number stays part of the spans.
    NumberedItem {
        /// Parsed list index.
        index: u64,
        /// Formatted full line, index prefix included.
        spans: Vec<Span>,
    },
    /// Tabular or key/value data, rendered verbatim.
    DataLine {
        /// The line as written.
        raw: String,
    },
    /// Embedded image such as a chart.
    ImageEmbed {
        /// Alternate text.
        alt: String,
        /// Image location, possibly relative.
        url: String,
    },
    /// Anything else.
    Paragraph {
        /// Formatted line.
        spans: Vec<Span>,
    },
}

/// Blocks of one blank-line separated group.
///
/// Grouping only controls spacing when rendering; it carries no meaning for
/// the blocks themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Blocks in source order.
    pub blocks: Vec<Block>,
}

static IMAGE_REGEX: OnceLock<Regex> = OnceLock::new();
static HEADER_REGEX: OnceLock<Regex> = OnceLock::new();
static BULLET_REGEX: OnceLock<Regex> = OnceLock::new();
static NUMBERED_REGEX: OnceLock<Regex> = OnceLock::new();
static INDENTED_REGEX: OnceLock<Regex> = OnceLock::new();
static IDENTIFIER_KEY_REGEX: OnceLock<Regex> = OnceLock::new();

fn image_regex() -> &'static Regex {
    IMAGE_REGEX.get_or_init(|| {
        Regex::new(r"!\[(.*?)\]\((.*?)\)").expect("image pattern should compile")
    })
}

fn header_regex() -> &'static Regex {
    HEADER_REGEX.get_or_init(|| Regex::new(r"^(#{1,3})\s").expect("header pattern should compile"))
}

fn bullet_regex() -> &'static Regex {
    BULLET_REGEX.get_or_init(|| Regex::new(r"^[•\-*]\s").expect("bullet pattern should compile"))
}

fn numbered_regex() -> &'static Regex {
    NUMBERED_REGEX
        .get_or_init(|| Regex::new(r"^([0-9]+)\.\s").expect("numbered pattern should compile"))
}

fn indented_regex() -> &'static Regex {
    INDENTED_REGEX.get_or_init(|| Regex::new(r"^\s{2}").expect("indent pattern should compile"))
}

fn identifier_key_regex() -> &'static Regex {
    IDENTIFIER_KEY_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_]+_[A-Za-z0-9_]+:").expect("identifier pattern should compile")
    })
}

/// True for lines that look like tabular or key/value data.
pub fn is_data_line(line: &str) -> bool {
    indented_regex().is_match(line)
        || (line.contains(':') && line.contains('$'))
        || identifier_key_regex().is_match(line)
}

/// Classify a single line.  Returns `None` for blank lines.
///
/// The first matching rule wins: image embed, header, bullet, numbered item,
/// data line, paragraph.
pub fn classify(line: &str) -> Option<Block> {
    if line.trim().is_empty() {
        return None;
    }

    if let Some(caps) = image_regex().captures(line) {
        let alt = caps.get(1).map_or("", |m| m.as_str());
        let url = caps.get(2).map_or("", |m| m.as_str());
        return Some(Block::ImageEmbed {
            alt: alt.to_string(),
            url: url.to_string(),
        });
    }

    if let Some(caps) = header_regex().captures(line) {
        let markers = caps.get(1).map_or(1, |m| m.len());
        let rest = caps.get(0).map_or(line, |m| &line[m.end()..]);
        return Some(Block::Header {
            level: markers as u8,
            text: rest.to_string(),
        });
    }

    if let Some(found) = bullet_regex().find(line) {
        return Some(Block::BulletItem {
            spans: inline::format(&line[found.end()..]),
        });
    }

    if let Some(caps) = numbered_regex().captures(line) {
        // A digit run too long for u64 still parses; the index saturates.
        let index = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(u64::MAX);
        return Some(Block::NumberedItem {
            index,
            spans: inline::format(line),
        });
    }

    if is_data_line(line) {
        return Some(Block::DataLine {
            raw: line.to_string(),
        });
    }

    Some(Block::Paragraph {
        spans: inline::format(line),
    })
}

/// Split raw text into blank-line separated sections of classified blocks.
///
/// Sections without any non-blank line are omitted.
pub fn parse_sections(raw: &str) -> Vec<Section> {
    let normalized = raw.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .map(|group| Section {
            blocks: group.split('\n').filter_map(classify).collect(),
        })
        .filter(|section| !section.blocks.is_empty())
        .collect()
}

/// Parse raw text into an ordered sequence of blocks.
///
/// Blocks appear in source line order.  This function never fails.
pub fn parse(raw: &str) -> Vec<Block> {
    parse_sections(raw)
        .into_iter()
        .flat_map(|section| section.blocks)
        .collect()
}
