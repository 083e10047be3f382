//! Terminal rendering of transcripts.
//!
//! Assistant text is parsed into blocks and spans by [`crate::markup`] and
//! turned into lines here.  Rendering is driven by [`TranscriptView`], which
//! prints each settled message once, and [`RedrawFlag`], which folds any
//! number of transcript notifications into a single redraw.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use url::Url;

use crate::client::normalize_base_url;
use crate::error::Result;
use crate::markup::{Block, Section, Span, parse_sections};
use crate::transcript::{TranscriptEvent, TranscriptObserver};
use crate::types::{Message, MessageId, MessageStatus, Role};

/// ANSI escape code for bold text (bold spans and headers).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for dim text (loading indicator, role labels).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for underlined text (top-level headers).
const ANSI_UNDERLINE: &str = "\x1b[4m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for red text (failed answers, errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for green text (currency amounts).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for yellow text (inline code).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for blue text (numbers).
const ANSI_BLUE: &str = "\x1b[34m";

/// ANSI escape code for magenta text (charts and images).
const ANSI_MAGENTA: &str = "\x1b[35m";

/// ANSI escape code for cyan text (data lines).
const ANSI_CYAN: &str = "\x1b[36m";

/// Text of the loading indicator.
pub const PENDING_TEXT: &str = "Analyzing your data...";

///////////////////////////////////////// Charts /////////////////////////////////////////

/// Resolves chart paths and image URLs against the backend origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartResolver {
    base: Url,
}

impl ChartResolver {
    /// Creates a resolver for the given backend origin.
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base: normalize_base_url(base_url)?,
        })
    }

    /// Absolute form of `path`.
    ///
    /// Absolute URLs pass through unchanged.  Other paths, including
    /// root-relative ones such as `/charts/x.png`, are appended to the
    /// backend's base path, the same way request endpoints are.  Anything
    /// that cannot be joined is returned as written.
    pub fn resolve(&self, path: &str) -> String {
        let path = path.trim();
        if let Ok(url) = Url::parse(path) {
            return url.to_string();
        }
        match self.base.join(path.trim_start_matches('/')) {
            Ok(url) => url.to_string(),
            Err(err) => {
                tracing::debug!(path, error = %err, "could not resolve chart path");
                path.to_string()
            }
        }
    }
}

///////////////////////////////////////// Formatting /////////////////////////////////////////

/// How blocks are turned into text.
#[derive(Debug, Clone, Default)]
pub struct Style {
    /// Emit ANSI escape codes.
    pub use_color: bool,
    /// Resolver for image embeds; relative URLs are shown as written without one.
    pub charts: Option<ChartResolver>,
}

impl Style {
    /// Plain output without color or URL resolution.
    pub fn plain() -> Self {
        Self::default()
    }

    /// Colored output.
    pub fn colored() -> Self {
        Self {
            use_color: true,
            charts: None,
        }
    }

    /// Resolve image embeds with `charts`.
    pub fn with_charts(mut self, charts: ChartResolver) -> Self {
        self.charts = Some(charts);
        self
    }

    fn resolve(&self, url: &str) -> String {
        match &self.charts {
            Some(charts) => charts.resolve(url),
            None => url.to_string(),
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_color {
            format!("{code}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

/// Renders sections as lines, with a blank line between sections.
pub fn format_blocks(sections: &[Section], style: &Style) -> String {
    sections
        .iter()
        .map(|section| {
            section
                .blocks
                .iter()
                .map(|block| format_block(block, style))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Renders one block as one or more lines.
pub fn format_block(block: &Block, style: &Style) -> String {
    match block {
        Block::Header { level, text } => {
            if style.use_color {
                let underline = if *level == 1 { ANSI_UNDERLINE } else { "" };
                format!("{ANSI_BOLD}{underline}{text}{ANSI_RESET}")
            } else {
                let rule = match *level {
                    1 => Some('='),
                    2 => Some('-'),
                    _ => None,
                };
                match rule {
                    Some(c) => format!("{text}\n{}", c.to_string().repeat(text.chars().count())),
                    None => text.clone(),
                }
            }
        }
        Block::BulletItem { spans } => format!("  • {}", format_spans(spans, style)),
        Block::NumberedItem { spans, .. } => format!("  {}", format_spans(spans, style)),
        Block::DataLine { raw } => style.paint(ANSI_CYAN, raw),
        Block::ImageEmbed { alt, url } => {
            let label = if alt.is_empty() { "image" } else { alt.as_str() };
            style.paint(
                ANSI_MAGENTA,
                &format!("[{label}] {}", style.resolve(url)),
            )
        }
        Block::Paragraph { spans } => format_spans(spans, style),
    }
}

/// Renders spans on one line.
///
/// With color, each decoration opens its own style and, when it ends,
/// restores the styles of the decorations enclosing it.
pub fn format_spans(spans: &[Span], style: &Style) -> String {
    let mut out = String::new();
    if style.use_color {
        let mut active = Vec::new();
        push_colored(&mut out, spans, &mut active);
    } else {
        for span in spans {
            out.push_str(&span.text());
        }
    }
    out
}

fn span_code(span: &Span) -> Option<&'static str> {
    match span {
        Span::Plain(_) => None,
        Span::Bold(_) => Some(ANSI_BOLD),
        Span::Code(_) => Some(ANSI_YELLOW),
        Span::Currency(_) => Some(ANSI_GREEN),
        Span::Number(_) => Some(ANSI_BLUE),
    }
}

fn push_colored(out: &mut String, spans: &[Span], active: &mut Vec<&'static str>) {
    for span in spans {
        let Some(code) = span_code(span) else {
            out.push_str(&span.text());
            continue;
        };
        out.push_str(code);
        active.push(code);
        match span {
            Span::Number(text) | Span::Plain(text) => out.push_str(text),
            Span::Bold(children) | Span::Code(children) | Span::Currency(children) => {
                push_colored(out, children, active)
            }
        }
        active.pop();
        out.push_str(ANSI_RESET);
        for outer in active.iter() {
            out.push_str(outer);
        }
    }
}

/// Renders a whole message, label and chart included, without a trailing newline.
pub fn format_message(message: &Message, style: &Style) -> String {
    let label = match message.role {
        Role::User => "you",
        Role::Assistant => "askdata",
    };
    let mut out = style.paint(ANSI_DIM, &format!("{label}>"));
    out.push('\n');
    match (message.role, message.status) {
        (_, MessageStatus::Pending) => out.push_str(&style.paint(ANSI_DIM, PENDING_TEXT)),
        (Role::User, _) => out.push_str(&message.text),
        (Role::Assistant, MessageStatus::Failed) => {
            out.push_str(&style.paint(ANSI_RED, &message.text))
        }
        (Role::Assistant, MessageStatus::Complete) => {
            out.push_str(&format_blocks(&parse_sections(&message.text), style))
        }
    }
    if let Some(chart) = &message.chart {
        out.push_str("\n\n");
        out.push_str(&style.paint(
            ANSI_MAGENTA,
            &format!(
                "[chart: {}] {}",
                chart.display_title(),
                style.resolve(&chart.url)
            ),
        ));
    }
    out
}

///////////////////////////////////////// Renderer /////////////////////////////////////////

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies, such as
/// styled terminal output or plain text for piping.
pub trait Renderer: Send {
    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print a settled message.
    fn render_message(&mut self, message: &Message);

    /// Print the loading indicator for an outstanding query.
    fn print_pending(&mut self);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    style: Style,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            style: Style {
                use_color,
                charts: None,
            },
        }
    }

    /// Resolves chart and image links against the backend origin.
    pub fn with_charts(mut self, charts: ChartResolver) -> Self {
        self.style.charts = Some(charts);
        self
    }

    /// The style used for formatting.
    pub fn style(&self) -> &Style {
        &self.style
    }

    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_info(&mut self, info: &str) {
        println!("{info}");
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        eprintln!("{}", self.style.paint(ANSI_RED, &format!("Error: {error}")));
    }

    fn render_message(&mut self, message: &Message) {
        println!("{}\n", format_message(message, &self.style));
        self.flush();
    }

    fn print_pending(&mut self) {
        println!("{}", self.style.paint(ANSI_DIM, PENDING_TEXT));
        self.flush();
    }
}

///////////////////////////////////////// Redraw /////////////////////////////////////////

/// Transcript observer that marks the display as stale.
///
/// Clones share one flag, so a clone can be subscribed while the original
/// is polled with [`RedrawFlag::take`].
#[derive(Debug, Clone, Default)]
pub struct RedrawFlag {
    dirty: Arc<AtomicBool>,
}

impl RedrawFlag {
    /// Creates a clear flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the flag, returning whether a redraw was due.
    pub fn take(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Whether a redraw is due.
    pub fn is_set(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

impl TranscriptObserver for RedrawFlag {
    fn notify(&mut self, _: &TranscriptEvent, _: &[Message]) {
        self.dirty.store(true, Ordering::Release);
    }
}

/// Incremental printer for a transcript.
///
/// Remembers how far the transcript was printed, so each
/// [`TranscriptView::redraw`] prints only settled messages that were not
/// printed yet, and shows the loading indicator once per placeholder.
#[derive(Debug, Clone)]
pub struct TranscriptView {
    anchor: Option<MessageId>,
    printed: usize,
    pending_shown: Option<MessageId>,
    echo_user: bool,
}

impl TranscriptView {
    /// Creates a view that prints every message.
    pub fn new() -> Self {
        Self {
            anchor: None,
            printed: 0,
            pending_shown: None,
            echo_user: true,
        }
    }

    /// Whether user messages are printed.  A REPL has already echoed them.
    pub fn with_user_echo(mut self, echo_user: bool) -> Self {
        self.echo_user = echo_user;
        self
    }

    /// Prints what changed since the last redraw and returns the number of
    /// messages rendered.
    pub fn redraw(&mut self, messages: &[Message], renderer: &mut dyn Renderer) -> usize {
        // A different first message means the transcript was cleared.
        let anchor = messages.first().map(|m| m.id);
        if anchor != self.anchor {
            self.anchor = anchor;
            self.printed = 0;
            self.pending_shown = None;
        }

        let mut rendered = 0;
        for message in messages.iter().skip(self.printed) {
            if message.is_pending() {
                if self.pending_shown != Some(message.id) {
                    renderer.print_pending();
                    self.pending_shown = Some(message.id);
                }
                break;
            }
            if self.echo_user || message.role != Role::User {
                renderer.render_message(message);
                rendered += 1;
            }
            self.printed += 1;
        }
        rendered
    }
}

impl Default for TranscriptView {
    fn default() -> Self {
        Self::new()
    }
}
