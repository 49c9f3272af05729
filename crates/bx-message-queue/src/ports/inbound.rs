//! Inbound ports (API) for the message queue.

use async_trait::async_trait;
use shared_types::RequestId;

use crate::domain::MessageBuilder;

/// Primary API of a per-peer message queue.
///
/// Every method may be called concurrently from any task. Outcomes are
/// never returned to the caller; they are observed through the lifecycle
/// events of the message's topic.
#[async_trait]
pub trait MessageQueueApi: Send + Sync {
    /// Reserve `size` block bytes for the peer, then mutate the message
    /// currently being built.
    ///
    /// With a nonzero `size` this waits for the allocator (backpressure) and
    /// returns without effect if the queue's context is cancelled first.
    /// `build` runs under the builder lock and must not block.
    async fn allocate_and_build_message<F>(&self, size: u64, build: F)
    where
        F: FnOnce(&mut MessageBuilder) + Send;

    /// Launch the background worker. Call once.
    fn startup(&self);

    /// Ask the worker to drain and stop. Idempotent; does not wait.
    fn shutdown(&self);

    /// Remove every pending entry for `request_ids` and release the freed
    /// block memory.
    fn scrub_responses(&self, request_ids: &[RequestId]);
}
