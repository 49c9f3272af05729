//! Ports layer: the API the queue offers and the collaborators it consumes.
//!
//! ## Inbound Ports (API)
//!
//! - `MessageQueueApi`: build messages, start/stop the worker, scrub requests
//!
//! ## Outbound Ports (SPI)
//!
//! - `MessageNetwork`: opens senders and connections to the peer
//! - `MessageSender`: delivers one finalized message, retrying internally
//! - `Allocator`: peer-scoped block memory budget
//! - `ResponseStream`: per-request stream handle closed on delivery failure
//! - `ConfigProvider`: queue and allocator configuration source

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
