//! # Message Queue Service
//!
//! The per-peer actor implementing the `MessageQueueApi` port.
//!
//! Producers reserve block memory, mutate the tail builder and wake the
//! worker. The worker sends builders strictly FIFO through one message
//! sender and publishes `Queued`, then `Sent` or `Error`, then closes each
//! message's topic.
//!
//! ## Shutdown
//!
//! - `shutdown()` drains: every pending builder gets an `Error` event with
//!   a shutdown cause before the worker stops.
//! - Cancelling the governing context stops without draining and aborts an
//!   in-flight send.
//! - A failed open or send publishes `Error` and then drains like
//!   `shutdown()`.
//!
//! Every path ends in the same teardown: release the peer's memory and
//! shut the publisher down.

// Semantic submodules
mod api;
mod core;
mod worker;

// Re-export public API
pub use self::core::MessageQueue;
