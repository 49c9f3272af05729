//! Lifecycle events and error types for the message queue.

use shared_types::PeerId;
use thiserror::Error;

use crate::domain::Metadata;

/// Message queue errors.
///
/// Apart from `EmptyMessage`, these only ever reach callers as the cause
/// carried by an [`EventName::Error`] event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageQueueError {
    /// Nothing to send; resolved locally and never published.
    #[error("empty message")]
    EmptyMessage,

    #[error("cant open message sender to peer {peer}: {reason}")]
    SenderOpen { peer: PeerId, reason: String },

    #[error("expended retries on send to peer {peer}: {reason}")]
    SendFailed { peer: PeerId, reason: String },

    #[error("send to peer {peer} cancelled")]
    Cancelled { peer: PeerId },

    #[error("message queue shutdown")]
    Shutdown,

    #[error("message topics exhausted")]
    TopicsExhausted,
}

/// Kinds of lifecycle event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventName {
    /// The message was dequeued and is about to be sent.
    Queued,
    /// The transport accepted the message.
    Sent,
    /// The message will never be delivered.
    Error,
}

/// One lifecycle event published on a message's topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub name: EventName,
    /// Cause, set only for `EventName::Error`.
    pub error: Option<MessageQueueError>,
    pub metadata: Metadata,
}

impl Event {
    pub fn queued(metadata: Metadata) -> Self {
        Self {
            name: EventName::Queued,
            error: None,
            metadata,
        }
    }

    pub fn sent(metadata: Metadata) -> Self {
        Self {
            name: EventName::Sent,
            error: None,
            metadata,
        }
    }

    pub fn error(metadata: Metadata, error: MessageQueueError) -> Self {
        Self {
            name: EventName::Error,
            error: Some(error),
            metadata,
        }
    }

    /// True for `Sent` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self.name, EventName::Sent | EventName::Error)
    }
}
