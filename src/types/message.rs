use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::ChartRef;

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a transcript message.
///
/// Identifiers come from a process-wide counter and are never reused, so an
/// identifier captured before a session reset can never name a message of
/// the session that replaced it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    /// Allocate a fresh, never before issued identifier.
    pub fn next() -> Self {
        Self(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions.
    User,

    /// The analytics backend.
    Assistant,
}

/// Lifecycle status of a message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Placeholder for an answer that has not arrived yet.
    Pending,

    /// Final text is present.
    Complete,

    /// The query failed; the text is a fallback explanation.
    Failed,
}

impl MessageStatus {
    /// True for `Complete` and `Failed`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, MessageStatus::Pending)
    }
}

/// One entry of the conversation transcript.
///
/// `text` is kept raw; markup is parsed lazily when the message is rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique, immutable identifier.
    pub id: MessageId,

    /// Author of the message.
    pub role: Role,

    /// Raw, unparsed text.
    pub text: String,

    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Chart generated alongside an assistant answer.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chart: Option<ChartRef>,

    /// Lifecycle status.
    pub status: MessageStatus,
}

impl Message {
    /// A completed user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::next(),
            role: Role::User,
            text: text.into(),
            created_at: OffsetDateTime::now_utc(),
            chart: None,
            status: MessageStatus::Complete,
        }
    }

    /// An empty assistant placeholder awaiting its answer.
    pub fn pending_assistant() -> Self {
        Self {
            id: MessageId::next(),
            role: Role::Assistant,
            text: String::new(),
            created_at: OffsetDateTime::now_utc(),
            chart: None,
            status: MessageStatus::Pending,
        }
    }

    /// True while the message is an unresolved placeholder.
    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }
}
