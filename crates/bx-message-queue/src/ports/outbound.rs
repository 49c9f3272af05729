//! Outbound ports (SPI) for the message queue.

use async_trait::async_trait;
use shared_types::PeerId;
use std::time::Duration;
use thiserror::Error;

use crate::domain::{AllocatorConfig, MessageQueueConfig, PeerMessage};

/// Retry settings forwarded to the transport when a sender is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageSenderOpts {
    pub max_retries: u32,
    pub send_timeout: Duration,
    pub send_error_backoff: Duration,
}

/// Errors reported by the network and its senders.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Connection to peer {peer} failed: {reason}")]
    ConnectionFailed { peer: PeerId, reason: String },

    #[error("Send timed out after {0:?}")]
    Timeout(Duration),

    #[error("Stream reset")]
    StreamReset,

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("I/O error: {0}")]
    Io(String),
}

/// Errors reported by the memory allocator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocatorError {
    /// The peer's budget was released while the allocation was pending.
    #[error("Memory for peer {0} was released")]
    PeerReleased(PeerId),

    #[error("No memory allocated for peer {0}")]
    UnknownPeer(PeerId),

    #[error("Cannot release {requested} bytes, only {allocated} allocated")]
    ReleaseExceedsAllocation { requested: u64, allocated: u64 },
}

/// Network able to reach peers and open message senders.
#[async_trait]
pub trait MessageNetwork: Send + Sync {
    /// Open a sender bound to `peer`.
    ///
    /// The sender applies `opts` itself: per-attempt timeout, retry count
    /// and backoff between attempts.
    async fn new_message_sender(
        &self,
        peer: PeerId,
        opts: MessageSenderOpts,
    ) -> Result<Box<dyn MessageSender>, NetworkError>;

    /// Establish a connection to `peer` ahead of any send.
    async fn connect_to(&self, peer: PeerId) -> Result<(), NetworkError>;
}

/// A sender bound to a single peer.
#[async_trait]
pub trait MessageSender: Send {
    /// Deliver one message. An error means the transport's own retries
    /// are exhausted.
    async fn send_msg(&mut self, message: &PeerMessage) -> Result<(), NetworkError>;

    /// Abort any pending operation and drop the underlying stream.
    async fn reset(&mut self) -> Result<(), NetworkError>;
}

/// Peer-scoped block memory budget.
///
/// Allocation may wait until memory is released; releases never block.
#[async_trait]
pub trait Allocator: Send + Sync {
    /// Wait until `amount` bytes are granted for `peer`.
    async fn allocate_block_memory(&self, peer: PeerId, amount: u64)
        -> Result<(), AllocatorError>;

    /// Return `amount` bytes of `peer`'s allocation.
    fn release_block_memory(&self, peer: PeerId, amount: u64) -> Result<(), AllocatorError>;

    /// Return everything `peer` holds and fail its pending allocations.
    fn release_peer_memory(&self, peer: PeerId) -> Result<(), AllocatorError>;
}

/// Stream handle tied to one request, closed when its data can no
/// longer be delivered.
pub trait ResponseStream: Send + Sync {
    fn close(&self) -> Result<(), NetworkError>;
}

/// Source of queue and allocator configuration.
pub trait ConfigProvider: Send + Sync {
    fn message_queue_config(&self) -> MessageQueueConfig;

    fn allocator_config(&self) -> AllocatorConfig;
}
