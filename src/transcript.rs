//! The conversation transcript.
//!
//! A [`Transcript`] is the single source of truth for conversation history.
//! It only grows, except for a wholesale [`Transcript::clear`], and the only
//! in-place mutation it permits is resolving the one pending assistant
//! placeholder.  Every successful mutation notifies each observer exactly
//! once, synchronously.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{from_reader, to_writer_pretty};

use crate::error::{Error, Result};
use crate::types::{ChartRef, Message, MessageId, MessageStatus};

/// What changed in a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// A message was appended.
    Appended(MessageId),
    /// The pending placeholder with this id was resolved.
    Updated(MessageId),
    /// The transcript was emptied.
    Cleared,
}

/// Receives transcript change notifications.
///
/// Observers run synchronously inside the mutating call, so they should only
/// record what happened; coalescing redraws is left to the render layer.
pub trait TranscriptObserver: Send {
    /// Called once per successful mutation, after it has been applied.
    fn notify(&mut self, event: &TranscriptEvent, messages: &[Message]);
}

/// Handle returned by [`Transcript::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered, append-mostly log of messages.
#[derive(Default)]
pub struct Transcript {
    messages: Vec<Message>,
    observers: Vec<(SubscriptionId, Box<dyn TranscriptObserver>)>,
    next_subscription: u64,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer.
    pub fn subscribe(&mut self, observer: Box<dyn TranscriptObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, observer));
        id
    }

    /// Removes an observer.  Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    /// Appends a message at the end.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error while a pending message exists, or if a
    /// message with the same id is already present.
    pub fn append(&mut self, message: Message) -> Result<()> {
        if let Some(pending) = self.pending() {
            return Err(Error::invalid_state(format!(
                "message {} is still pending",
                pending.id
            )));
        }
        if self.get(message.id).is_some() {
            return Err(Error::invalid_state(format!(
                "message {} already exists",
                message.id
            )));
        }
        let id = message.id;
        self.messages.push(message);
        self.emit(TranscriptEvent::Appended(id));
        Ok(())
    }

    /// Resolves the pending message `id` to a terminal status.
    ///
    /// # Errors
    ///
    /// Returns a not found error if no message has this id, for instance
    /// because the transcript was cleared before a stale answer arrived.
    /// Returns an invalid state error if the message is not pending or
    /// `status` is not terminal.
    pub fn update_status(
        &mut self,
        id: MessageId,
        status: MessageStatus,
        text: impl Into<String>,
        chart: Option<ChartRef>,
    ) -> Result<()> {
        if !status.is_terminal() {
            return Err(Error::invalid_state(
                "a message can only be resolved to complete or failed",
            ));
        }
        let Some(message) = self.messages.iter_mut().find(|m| m.id == id) else {
            return Err(Error::not_found(
                "no such message in transcript",
                Some(id.to_string()),
            ));
        };
        if !message.is_pending() {
            return Err(Error::invalid_state(format!(
                "message {id} was already resolved"
            )));
        }
        message.status = status;
        message.text = text.into();
        message.chart = chart;
        self.emit(TranscriptEvent::Updated(id));
        Ok(())
    }

    /// Empties the transcript.  Always succeeds.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.emit(TranscriptEvent::Cleared);
    }

    /// All messages in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Looks up a message by id.
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// The pending message, if one exists.
    pub fn pending(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.is_pending())
    }

    /// The most recent message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when there are no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Saves the transcript as pretty-printed JSON.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let transcript = TranscriptFile::new(&self.messages);
        let file = File::create(path.as_ref())
            .map_err(|err| Error::io("failed to create transcript file", err))?;
        let writer = BufWriter::new(file);
        to_writer_pretty(writer, &transcript).map_err(|err| {
            Error::serialization("failed to serialize transcript", Some(Box::new(err)))
        })
    }

    /// Reads the messages of a transcript saved with [`Transcript::save_to`].
    pub fn read_messages<P: AsRef<Path>>(path: P) -> Result<Vec<Message>> {
        let file = File::open(path.as_ref())
            .map_err(|err| Error::io("failed to open transcript file", err))?;
        let reader = BufReader::new(file);
        let transcript: TranscriptFile = from_reader(reader).map_err(|err| {
            Error::serialization("failed to parse transcript", Some(Box::new(err)))
        })?;
        Ok(transcript.messages)
    }

    fn emit(&mut self, event: TranscriptEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer.notify(&event, &self.messages);
        }
    }
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript")
            .field("messages", &self.messages)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct TranscriptFile {
    version: u8,
    messages: Vec<Message>,
}

impl TranscriptFile {
    fn new(messages: &[Message]) -> Self {
        Self {
            version: 1,
            messages: messages.to_vec(),
        }
    }
}
