use serde::{Deserialize, Serialize};

/// A named capability (backend tool) advertised for display purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Tool name.
    pub name: String,

    /// What the tool does.
    #[serde(default)]
    pub description: String,
}

/// Body of the capability listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityList {
    /// Advertised capabilities.
    #[serde(default)]
    pub tools: Vec<Capability>,

    /// Total number of capabilities, as reported by the backend.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total_count: Option<usize>,
}
