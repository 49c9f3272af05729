//! Finalized wire-level message contents.
//!
//! These are the immutable values a builder produces. How they are encoded
//! on the wire is the transport's business.

use shared_types::{Hash, RequestId, ResponseStatusCode};
use std::collections::{BTreeMap, HashMap};

/// A block payload addressed by its link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub link: Hash,
    pub data: Vec<u8>,
}

impl Block {
    pub fn new(link: Hash, data: Vec<u8>) -> Self {
        Self { link, data }
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// What happened to a link during a request's traversal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkAction {
    /// The block is carried in this message.
    Present,
    /// The block is not available locally.
    Missing,
    /// The block was sent in an earlier message.
    DuplicateNotSent,
}

/// One traversal entry reported back to the requester.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkMetadata {
    pub link: Hash,
    pub action: LinkAction,
}

/// The response section for a single request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseMessage {
    pub request_id: RequestId,
    pub status: ResponseStatusCode,
    pub metadata: Vec<LinkMetadata>,
    pub extensions: BTreeMap<String, Vec<u8>>,
}

/// A finalized outgoing message for one peer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeerMessage {
    responses: Vec<ResponseMessage>,
    blocks: Vec<Block>,
}

impl PeerMessage {
    pub(crate) fn new(responses: Vec<ResponseMessage>, blocks: Vec<Block>) -> Self {
        Self { responses, blocks }
    }

    pub fn responses(&self) -> &[ResponseMessage] {
        &self.responses
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Status code of every response in the message.
    pub fn response_codes(&self) -> HashMap<RequestId, ResponseStatusCode> {
        self.responses
            .iter()
            .map(|r| (r.request_id, r.status))
            .collect()
    }

    /// Total block payload carried.
    pub fn block_size(&self) -> u64 {
        self.blocks.iter().map(Block::size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty() && self.blocks.is_empty()
    }
}
