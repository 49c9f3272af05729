//! # Error Types
//!
//! Errors raised while interpreting shared protocol values.

use thiserror::Error;

/// Errors that can occur when decoding protocol-level values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A numeric response status code that the protocol does not define.
    #[error("Unknown response status code: {0}")]
    UnknownStatusCode(u16),

    /// A request identifier that is not a valid UUID.
    #[error("Invalid request id: {0}")]
    InvalidRequestId(String),
}
