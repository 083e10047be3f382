//! Inline formatting of a single line of assistant text.
//!
//! Decorations are applied one rule at a time, in a fixed order, to every
//! undecorated run of text, including runs already wrapped by an earlier
//! rule.  A later rule therefore nests inside an earlier one instead of
//! competing with it: `**up 12%**` becomes a bold span containing a number.
//! A match never spans the edge of an earlier decoration.

use std::sync::OnceLock;

use regex::Regex;

/// Outer tag of a [`Span`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SpanKind {
    /// Undecorated text.
    Plain,
    /// Text delimited by `**`.
    Bold,
    /// Text delimited by backticks.
    Code,
    /// A currency amount such as `$1,200.50`.
    Currency,
    /// A standalone digit run.
    Number,
}

/// An inline-formatted piece of a line.
///
/// `Plain` and `Number` are leaves.  The remaining variants hold the spans
/// produced by the rules that ran after them, which is how stacked
/// decorations are represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    /// Undecorated text.
    Plain(String),
    /// Bold text, delimiters stripped.
    Bold(Vec<Span>),
    /// Inline code, delimiters stripped.
    Code(Vec<Span>),
    /// Currency amount.
    Currency(Vec<Span>),
    /// Standalone integer.
    Number(String),
}

impl Span {
    /// The outer tag of this span.
    pub fn kind(&self) -> SpanKind {
        match self {
            Span::Plain(_) => SpanKind::Plain,
            Span::Bold(_) => SpanKind::Bold,
            Span::Code(_) => SpanKind::Code,
            Span::Currency(_) => SpanKind::Currency,
            Span::Number(_) => SpanKind::Number,
        }
    }

    /// Visible text of this span, including all nested spans.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    /// Spans nested inside this one.
    pub fn children(&self) -> &[Span] {
        match self {
            Span::Bold(children) | Span::Code(children) | Span::Currency(children) => children,
            Span::Plain(_) | Span::Number(_) => &[],
        }
    }

    fn push_text(&self, out: &mut String) {
        match self {
            Span::Plain(text) | Span::Number(text) => out.push_str(text),
            Span::Bold(children) | Span::Code(children) | Span::Currency(children) => {
                for child in children {
                    child.push_text(out);
                }
            }
        }
    }
}

/// Concatenated visible text of a span sequence.
pub fn visible_text(spans: &[Span]) -> String {
    let mut out = String::new();
    for span in spans {
        span.push_text(&mut out);
    }
    out
}

/// Returns true if any span in the tree, at any depth, satisfies `pred`.
pub fn any_span(spans: &[Span], pred: &dyn Fn(&Span) -> bool) -> bool {
    spans
        .iter()
        .any(|span| pred(span) || any_span(span.children(), pred))
}

///////////////////////////////////////////// Rules ////////////////////////////////////////////

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Rule {
    Bold,
    Code,
    Currency,
    Number,
}

const RULES: [Rule; 4] = [Rule::Bold, Rule::Code, Rule::Currency, Rule::Number];

static BOLD_REGEX: OnceLock<Regex> = OnceLock::new();
static CODE_REGEX: OnceLock<Regex> = OnceLock::new();
static CURRENCY_REGEX: OnceLock<Regex> = OnceLock::new();
static NUMBER_REGEX: OnceLock<Regex> = OnceLock::new();

impl Rule {
    fn regex(self) -> &'static Regex {
        match self {
            Rule::Bold => BOLD_REGEX.get_or_init(|| {
                Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern should compile")
            }),
            Rule::Code => CODE_REGEX
                .get_or_init(|| Regex::new(r"`(.*?)`").expect("code pattern should compile")),
            Rule::Currency => CURRENCY_REGEX.get_or_init(|| {
                Regex::new(r"\$[0-9,]+\.?[0-9]*").expect("currency pattern should compile")
            }),
            // Word boundaries are ASCII so that "Q3" stays plain but "é5" splits.
            Rule::Number => NUMBER_REGEX.get_or_init(|| {
                Regex::new(r"(?-u:\b)[0-9]+(?-u:\b)").expect("number pattern should compile")
            }),
        }
    }

    fn wrap(self, token: &str) -> Span {
        match self {
            Rule::Bold => Span::Bold(plain_leaf(token)),
            Rule::Code => Span::Code(plain_leaf(token)),
            Rule::Currency => Span::Currency(plain_leaf(token)),
            Rule::Number => Span::Number(token.to_string()),
        }
    }

    fn apply(self, spans: Vec<Span>) -> Vec<Span> {
        let mut out = Vec::with_capacity(spans.len());
        for span in spans {
            match span {
                Span::Plain(text) => self.split(&text, &mut out),
                Span::Bold(children) => out.push(Span::Bold(self.apply(children))),
                Span::Code(children) => out.push(Span::Code(self.apply(children))),
                Span::Currency(children) => out.push(Span::Currency(self.apply(children))),
                number @ Span::Number(_) => out.push(number),
            }
        }
        out
    }

    fn split(self, text: &str, out: &mut Vec<Span>) {
        let mut last = 0;
        for caps in self.regex().captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let token = caps.get(1).unwrap_or(whole).as_str();
            push_plain(out, &text[last..whole.start()]);
            out.push(self.wrap(token));
            last = whole.end();
        }
        push_plain(out, &text[last..]);
    }
}

fn plain_leaf(text: &str) -> Vec<Span> {
    let mut out = Vec::new();
    push_plain(&mut out, text);
    out
}

fn push_plain(out: &mut Vec<Span>, text: &str) {
    if !text.is_empty() {
        out.push(Span::Plain(text.to_string()));
    }
}

/// Convert one line of text into an ordered sequence of spans.
///
/// Rules run in order: bold, inline code, currency, bare integer.  The result
/// covers the whole line; [`visible_text`] of the output equals the line with
/// the bold and code delimiters removed.
pub fn format(line: &str) -> Vec<Span> {
    let mut spans = plain_leaf(line);
    for rule in RULES {
        spans = rule.apply(spans);
    }
    spans
}
