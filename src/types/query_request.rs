use serde::{Deserialize, Serialize};

/// Chart type that lets the backend pick a suitable visualization.
pub const AUTO_CHART_TYPE: &str = "auto";

/// Body of a natural-language query sent to the analytics backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question, as typed.
    pub query: String,

    /// Whether the backend should try to render a chart.
    pub generate_chart: bool,

    /// Requested chart type, e.g. `auto`, `bar`, `pie`.
    pub chart_type: String,
}

impl QueryRequest {
    /// Create a request that asks for an automatically chosen chart.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            generate_chart: true,
            chart_type: AUTO_CHART_TYPE.to_string(),
        }
    }

    /// Enable or disable chart generation.
    pub fn with_generate_chart(mut self, generate_chart: bool) -> Self {
        self.generate_chart = generate_chart;
        self
    }

    /// Set the requested chart type.
    pub fn with_chart_type(mut self, chart_type: impl Into<String>) -> Self {
        self.chart_type = chart_type.into();
        self
    }
}
