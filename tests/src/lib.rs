//! # Block-Exchange Test Suite
//!
//! Cross-crate flows for the message queue.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── flows.rs      # queue + reference allocator + retrying sender + bus
//!     └── batching.rs   # randomized batching and concurrent producers
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p bx-tests
//! cargo test -p bx-tests integration::batching::
//! ```

pub mod integration;
