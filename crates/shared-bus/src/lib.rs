//! # Shared Bus - Per-Topic Event Publisher
//!
//! Routes lifecycle events to the subscribers of a single topic.
//!
//! ## Topic Lifecycle
//!
//! ```text
//!   subscribe(topic, sink) ──┐
//!                            ▼
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │  Publisher   │───▶│ topic → sinks│───▶│ Subscription │ recv() → Some(event)
//! └──────────────┘    └──────────────┘    └──────────────┘
//!        │ close(topic)       │ sinks dropped        │ recv() → None
//!        └────────────────────┘──────────────────────┘
//! ```
//!
//! A topic carries any number of events followed by exactly one close.
//! Closing drops every sink registered for the topic, so subscribers see
//! the end of their stream instead of waiting forever. Shutting the bus
//! down closes every topic at once.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use publisher::{BusState, InMemoryTopicBus, TopicPublisher};
pub use subscriber::{topic_channel, EventStream, SubscriptionError, TopicSink, TopicSubscription};
