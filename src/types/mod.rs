// Public modules
pub mod capability;
pub mod chart_ref;
pub mod message;
pub mod query_request;
pub mod query_response;

// Re-exports
pub use capability::{Capability, CapabilityList};
pub use chart_ref::{ChartRef, DEFAULT_CHART_TITLE};
pub use message::{Message, MessageId, MessageStatus, Role};
pub use query_request::{AUTO_CHART_TYPE, QueryRequest};
pub use query_response::QueryResponse;
