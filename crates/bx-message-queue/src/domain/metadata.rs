//! Topics and the metadata snapshot taken when a builder is finalized.

use shared_types::{BlockData, RequestId, ResponseStatusCode};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::Span;

use crate::ports::outbound::ResponseStream;

/// Identifies one message across build, send, publish and close.
///
/// Topics are allocated in strictly increasing order per queue and are
/// never reused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(u64);

impl Topic {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The topic allocated after this one, or `None` once the id space is
    /// used up. Topics never wrap around.
    pub(crate) const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(next) => Some(Self(next)),
            None => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Public view of a finalized message, attached to every lifecycle event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Blocks handled per request.
    pub block_data: HashMap<RequestId, Vec<BlockData>>,
    /// Response status per request.
    pub response_codes: HashMap<RequestId, ResponseStatusCode>,
}

/// Everything the worker needs after a builder has been finalized.
pub(crate) struct InternalMetadata {
    /// Span of the message; ends when the metadata is dropped.
    pub span: Span,
    pub public: Metadata,
    pub topic: Topic,
    /// Block bytes reserved for this message.
    pub msg_size: u64,
    /// Streams to close if the message cannot be delivered.
    pub response_streams: HashMap<RequestId, Arc<dyn ResponseStream>>,
}

impl fmt::Debug for InternalMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalMetadata")
            .field("topic", &self.topic)
            .field("msg_size", &self.msg_size)
            .field("public", &self.public)
            .field("response_streams", &self.response_streams.len())
            .finish()
    }
}
