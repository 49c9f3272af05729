//! # Shared Types Crate
//!
//! Identifiers and metadata types shared across the block-exchange crates.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: peer, request and block identifiers are
//!   defined once here and reused by the queue, the bus and the adapters.
//! - **Wire-agnostic**: nothing in this crate knows how messages are encoded.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
