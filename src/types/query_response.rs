use serde::{Deserialize, Serialize};

use crate::types::ChartRef;

/// Body returned by the analytics backend for a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Whether the backend managed to answer.
    pub success: bool,

    /// Prose answer, possibly containing light markup.
    #[serde(default)]
    pub response: String,

    /// Relative path of a generated chart image.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chart_path: Option<String>,

    /// Title of the generated chart.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chart_title: Option<String>,

    /// Names of the backend tools consulted while answering.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tools_used: Vec<String>,

    /// Error description when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl QueryResponse {
    /// A successful answer without a chart.
    pub fn answer(response: impl Into<String>) -> Self {
        Self {
            success: true,
            response: response.into(),
            chart_path: None,
            chart_title: None,
            tools_used: Vec::new(),
            error: None,
        }
    }

    /// A reported failure.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response: String::new(),
            chart_path: None,
            chart_title: None,
            tools_used: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Attach a chart to the answer.
    pub fn with_chart(mut self, path: impl Into<String>, title: Option<String>) -> Self {
        self.chart_path = Some(path.into());
        self.chart_title = title;
        self
    }

    /// The chart reference carried by this response, if any.
    pub fn chart_ref(&self) -> Option<ChartRef> {
        self.chart_path
            .as_ref()
            .map(|path| ChartRef::new(path.clone(), self.chart_title.clone()))
    }
}
