//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::client::{DEFAULT_BACKEND_URL, resolve_backend_url};
use crate::types::{AUTO_CHART_TYPE, QueryRequest};

/// Command-line arguments for the askdata-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Backend origin.
    #[arrrg(optional, "Analytics backend origin (default: $ASKDATA_BACKEND_URL or http://localhost:8001)", "URL")]
    pub backend_url: Option<String>,

    /// Chart type requested with every query.
    #[arrrg(optional, "Chart type to request (default: auto)", "TYPE")]
    pub chart_type: Option<String>,

    /// Do not ask the backend for charts.
    #[arrrg(flag, "Do not request charts")]
    pub no_chart: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Transport timeout in seconds.
    #[arrrg(optional, "HTTP timeout in seconds (default: none)", "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Transcript auto-save path.
    #[arrrg(optional, "Save the transcript here after every answer", "FILE")]
    pub transcript: Option<String>,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Origin of the analytics backend; chart paths resolve against it too.
    pub backend_url: String,

    /// Whether queries ask for a chart.
    pub generate_chart: bool,

    /// Chart type sent with queries.
    pub chart_type: String,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Optional transport timeout.  `None` leaves requests unbounded.
    pub timeout: Option<Duration>,

    /// Path to persist transcripts automatically after each answer.
    pub transcript_path: Option<PathBuf>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Backend: http://localhost:8001
    /// - Charts: requested, type `auto`
    /// - Color: enabled
    /// - Timeout: none
    pub fn new() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            generate_chart: true,
            chart_type: AUTO_CHART_TYPE.to_string(),
            use_color: true,
            timeout: None,
            transcript_path: None,
        }
    }

    /// Sets the backend origin.
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    /// Enables or disables chart generation.
    pub fn with_generate_chart(mut self, generate_chart: bool) -> Self {
        self.generate_chart = generate_chart;
        self
    }

    /// Sets the chart type.
    pub fn with_chart_type(mut self, chart_type: impl Into<String>) -> Self {
        self.chart_type = chart_type.into();
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets the transport timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the transcript auto-save path.
    pub fn with_transcript_path(mut self, path: Option<PathBuf>) -> Self {
        self.transcript_path = path;
        self
    }

    /// Builds the request sent for `query` under this configuration.
    pub fn request_for(&self, query: &str) -> QueryRequest {
        QueryRequest::new(query)
            .with_generate_chart(self.generate_chart)
            .with_chart_type(self.chart_type.clone())
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        ChatConfig {
            backend_url: resolve_backend_url(args.backend_url),
            generate_chart: !args.no_chart,
            chart_type: args
                .chart_type
                .unwrap_or_else(|| AUTO_CHART_TYPE.to_string()),
            use_color: !args.no_color,
            timeout: args.timeout_secs.map(Duration::from_secs),
            transcript_path: args.transcript.map(PathBuf::from),
        }
    }
}
