//! Domain Layer - message assembly with no I/O
//!
//! - Message contents (blocks, link metadata, responses)
//! - Message builder (per-message accumulator)
//! - Builder queue (FIFO of builders and the batching rule)
//! - Topics and metadata snapshots
//! - Queue and allocator configuration

pub mod builder;
pub(crate) mod builder_queue;
pub mod config;
pub mod message;
pub mod metadata;

pub use builder::MessageBuilder;
pub use config::{AllocatorConfig, ConfigError, MessageQueueConfig, MAX_BLOCK_SIZE};
pub use message::{Block, LinkAction, LinkMetadata, PeerMessage, ResponseMessage};
pub use metadata::{Metadata, Topic};

pub(crate) use builder_queue::BuilderQueue;
pub(crate) use metadata::InternalMetadata;
