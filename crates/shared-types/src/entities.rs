//! # Core Domain Entities
//!
//! Identifiers and metadata exchanged between the block-exchange crates.
//!
//! ## Clusters
//!
//! - **Networking**: `PeerId`
//! - **Requests**: `RequestId`, `ResponseStatusCode`
//! - **Blocks**: `Hash`, `BlockData`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::ProtocolError;

// =============================================================================
// CLUSTER A: NETWORKING
// =============================================================================

/// A 32-byte content hash used as a block link.
pub type Hash = [u8; 32];

/// Unique identifier for a remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct PeerId(pub [u8; 32]);

impl PeerId {
    /// Create a peer id from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes of the identifier.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PeerId {
    /// Short hex form, enough to tell peers apart in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..6] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

// =============================================================================
// CLUSTER B: REQUESTS
// =============================================================================

/// Identifier of a single block-exchange request.
///
/// Responses, blocks and streams are all keyed by the request they answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh random request id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RequestId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ProtocolError::InvalidRequestId(s.to_string()))
    }
}

/// Status codes carried by responses.
///
/// Values below 20 are informational, 20-29 are successful terminal
/// codes and 30 and above are failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ResponseStatusCode {
    RequestAcknowledged = 10,
    AdditionalPeers = 11,
    NotEnoughGas = 12,
    OtherProtocol = 13,
    PartialResponse = 14,
    RequestPaused = 15,
    RequestCompletedFull = 20,
    RequestCompletedPartial = 21,
    RequestRejected = 30,
    RequestFailedBusy = 31,
    RequestFailedUnknown = 32,
    RequestFailedLegal = 33,
    RequestFailedContentNotFound = 34,
    RequestCancelled = 35,
}

impl ResponseStatusCode {
    /// Numeric wire value.
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// True when no further responses follow for the request.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.code() >= 20
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(
            self,
            Self::RequestCompletedFull | Self::RequestCompletedPartial
        )
    }

    #[must_use]
    pub const fn is_failure(self) -> bool {
        self.code() >= 30
    }
}

impl TryFrom<u16> for ResponseStatusCode {
    type Error = ProtocolError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            10 => Self::RequestAcknowledged,
            11 => Self::AdditionalPeers,
            12 => Self::NotEnoughGas,
            13 => Self::OtherProtocol,
            14 => Self::PartialResponse,
            15 => Self::RequestPaused,
            20 => Self::RequestCompletedFull,
            21 => Self::RequestCompletedPartial,
            30 => Self::RequestRejected,
            31 => Self::RequestFailedBusy,
            32 => Self::RequestFailedUnknown,
            33 => Self::RequestFailedLegal,
            34 => Self::RequestFailedContentNotFound,
            35 => Self::RequestCancelled,
            other => return Err(ProtocolError::UnknownStatusCode(other)),
        };
        Ok(code)
    }
}

// =============================================================================
// CLUSTER C: BLOCKS
// =============================================================================

/// Describes one block as it was handled for a request.
///
/// Published to event subscribers so callers can account for what was
/// actually put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockData {
    /// Link of the block.
    pub link: Hash,
    /// Size of the block payload.
    pub block_size: u64,
    /// Bytes this block contributed to the message; zero when the block
    /// was already sent earlier and only the link travels.
    pub block_size_on_wire: u64,
    /// Position of the block in the request's traversal.
    pub index: i64,
}
