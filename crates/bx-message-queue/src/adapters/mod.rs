//! # Adapters
//!
//! Reference implementations of the outbound ports.
//!
//! - `allocator` - in-process memory budget with FIFO waiters
//! - `retry` - `MessageSender` applying retries, timeouts and backoff
//! - `config` - static and TOML configuration providers

pub mod allocator;
pub mod config;
pub mod retry;

pub use allocator::{AllocatorStats, MemoryAllocator};
pub use config::StaticConfigProvider;
#[cfg(feature = "toml-config")]
pub use config::TomlConfigProvider;
pub use retry::{MessageStream, RetryingSender};
