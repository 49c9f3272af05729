//! # Block-Exchange Message Queue
//!
//! Per-peer outgoing message dispatch for the block-exchange protocol.
//!
//! Any number of tasks append responses and blocks for one remote peer. The
//! queue batches them into messages of at most [`MAX_BLOCK_SIZE`] block
//! bytes, sends them strictly in order over a single sender, holds producers
//! back through a peer-scoped memory allocator and reports every message's
//! fate as lifecycle events on its own topic.
//!
//! ## Architecture
//!
//! Hexagonal layout:
//! - **Domain:** message builder, builder queue and batching rule, metadata, config
//! - **Events:** `Queued` / `Sent` / `Error` events and the error enum
//! - **Ports:** `MessageQueueApi` (inbound); network, sender, allocator and
//!   response stream traits (outbound)
//! - **Service:** the `MessageQueue` actor and its worker task
//! - **Adapters:** reference allocator, retrying sender, config providers
//!
//! ## Message Lifecycle
//!
//! ```text
//! allocate_and_build_message ──▶ tail builder ──▶ worker pops head
//!                                                      │
//!                      Queued ◀── build + subscribe ◀──┘
//!                        │
//!                      send ──▶ Sent  ─┐
//!                        └───▶ Error  ─┴─▶ close(topic)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use bx_message_queue::{LinkAction, MessageQueue, MessageQueueApi, MessageQueueConfig};
//! use shared_bus::topic_channel;
//!
//! let queue = MessageQueue::new(ctx, peer, network, allocator, MessageQueueConfig::default())?;
//! queue.startup();
//!
//! let (sink, mut events) = topic_channel();
//! queue
//!     .allocate_and_build_message(block.size(), move |b| {
//!         b.add_link(request_id, block.link, LinkAction::Present);
//!         b.add_block(block);
//!         b.add_notifee(request_id, sink);
//!     })
//!     .await;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event.name);
//! }
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod events;
pub mod ports;
pub mod service;

/// Mock collaborators for tests.
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Domain
pub use domain::{
    AllocatorConfig, Block, ConfigError, LinkAction, LinkMetadata, MessageBuilder,
    MessageQueueConfig, Metadata, PeerMessage, ResponseMessage, Topic, MAX_BLOCK_SIZE,
};

// Events
pub use events::{Event, EventName, MessageQueueError};

// Ports
pub use ports::{
    Allocator, AllocatorError, ConfigProvider, MessageNetwork, MessageQueueApi, MessageSender,
    MessageSenderOpts, NetworkError, ResponseStream,
};

// Service
pub use service::MessageQueue;

// Adapters
pub use adapters::{
    AllocatorStats, MemoryAllocator, MessageStream, RetryingSender, StaticConfigProvider,
};
#[cfg(feature = "toml-config")]
pub use adapters::TomlConfigProvider;
