use serde::{Deserialize, Serialize};

/// Title shown for a chart the backend did not name.
pub const DEFAULT_CHART_TITLE: &str = "Generated Chart";

/// Reference to a chart image produced for an assistant answer.
///
/// `url` is stored exactly as the backend returned it, usually a path
/// relative to the backend origin.  Resolution into a loadable URL happens in
/// the display layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRef {
    /// Location of the chart image.
    pub url: String,

    /// Human-readable title.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
}

impl ChartRef {
    /// Create a new chart reference.
    pub fn new(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            url: url.into(),
            title,
        }
    }

    /// The title to display, falling back to [`DEFAULT_CHART_TITLE`].
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_CHART_TITLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_title_fallback() {
        let chart = ChartRef::new("/charts/revenue.png", None);
        assert_eq!(chart.display_title(), "Generated Chart");

        let chart = ChartRef::new("/charts/revenue.png", Some("Revenue by type".to_string()));
        assert_eq!(chart.display_title(), "Revenue by type");
    }
}
