//! The message builder: one pending outgoing message.
//!
//! A builder collects responses, blocks and per-request bookkeeping from any
//! number of producer calls while it is the tail of the queue, and is turned
//! into an immutable [`PeerMessage`] exactly once by the worker.

use shared_bus::{TopicPublisher, TopicSink};
use shared_types::{BlockData, Hash, RequestId, ResponseStatusCode};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::Span;

use super::message::{Block, LinkAction, LinkMetadata, PeerMessage, ResponseMessage};
use super::metadata::{InternalMetadata, Metadata, Topic};
use crate::events::{Event, MessageQueueError};
use crate::ports::outbound::ResponseStream;

/// A block queued in a builder and how many times it was added.
struct PendingBlock {
    block: Block,
    contributions: u64,
}

impl PendingBlock {
    fn reserved(&self) -> u64 {
        self.block.size() * self.contributions
    }
}

/// Accumulator for one outgoing message.
///
/// Invariant: `block_size` equals the sum of every block's size times the
/// number of times it was added, which is what producers reserved for it.
pub struct MessageBuilder {
    topic: Topic,
    span: Span,
    block_size: u64,
    blocks: HashMap<Hash, PendingBlock>,
    /// Insertion order of `blocks`.
    block_order: Vec<Hash>,
    links: BTreeMap<RequestId, Vec<LinkMetadata>>,
    completed: BTreeMap<RequestId, ResponseStatusCode>,
    extensions: BTreeMap<RequestId, BTreeMap<String, Vec<u8>>>,
    block_data: HashMap<RequestId, Vec<BlockData>>,
    response_streams: HashMap<RequestId, Arc<dyn ResponseStream>>,
    notifees: HashMap<RequestId, Vec<TopicSink<Event>>>,
}

impl MessageBuilder {
    pub(crate) fn new(topic: Topic, span: Span) -> Self {
        Self {
            topic,
            span,
            block_size: 0,
            blocks: HashMap::new(),
            block_order: Vec::new(),
            links: BTreeMap::new(),
            completed: BTreeMap::new(),
            extensions: BTreeMap::new(),
            block_data: HashMap::new(),
            response_streams: HashMap::new(),
            notifees: HashMap::new(),
        }
    }

    /// Topic the message's lifecycle events are published on.
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Block payload accumulated so far.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// True when finalizing would produce nothing to send.
    ///
    /// Streams, notifees and block data alone do not make a message.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
            && self.links.is_empty()
            && self.completed.is_empty()
            && self.extensions.is_empty()
    }

    /// True if any response entry for `request_id` is pending here.
    pub fn contains_request(&self, request_id: &RequestId) -> bool {
        self.links.contains_key(request_id)
            || self.completed.contains_key(request_id)
            || self.extensions.contains_key(request_id)
    }

    /// Add a block payload.
    ///
    /// A block already present is sent once but its size is counted again,
    /// matching the memory reserved by each producer that added it.
    pub fn add_block(&mut self, block: Block) {
        self.block_size += block.size();
        match self.blocks.entry(block.link) {
            Entry::Occupied(mut pending) => pending.get_mut().contributions += 1,
            Entry::Vacant(slot) => {
                self.block_order.push(block.link);
                slot.insert(PendingBlock {
                    block,
                    contributions: 1,
                });
            }
        }
    }

    /// Record a traversed link for a request.
    ///
    /// Only links recorded as [`LinkAction::Present`] keep their block in
    /// the message when other requests are scrubbed.
    pub fn add_link(&mut self, request_id: RequestId, link: Hash, action: LinkAction) {
        self.links
            .entry(request_id)
            .or_default()
            .push(LinkMetadata { link, action });
    }

    /// Set the status a request's response carries.
    pub fn add_response_code(&mut self, request_id: RequestId, status: ResponseStatusCode) {
        self.completed.insert(request_id, status);
    }

    pub fn add_extension_data(
        &mut self,
        request_id: RequestId,
        name: impl Into<String>,
        data: Vec<u8>,
    ) {
        self.extensions
            .entry(request_id)
            .or_default()
            .insert(name.into(), data);
    }

    /// Describe a block for the public metadata of this message.
    pub fn add_block_data(&mut self, request_id: RequestId, block_data: BlockData) {
        self.block_data
            .entry(request_id)
            .or_default()
            .push(block_data);
    }

    /// Attach the stream that must be closed if this message is never
    /// delivered.
    pub fn set_response_stream(&mut self, request_id: RequestId, stream: Arc<dyn ResponseStream>) {
        self.response_streams.insert(request_id, stream);
    }

    /// Subscribe `sink` to this message's topic once it is finalized.
    ///
    /// Dropped without any event if the request is scrubbed first.
    pub fn add_notifee(&mut self, request_id: RequestId, sink: TopicSink<Event>) {
        self.notifees.entry(request_id).or_default().push(sink);
    }

    /// Remove everything belonging to `request_ids`.
    ///
    /// Blocks no longer referenced by a present link of a remaining request
    /// are dropped too. A block still referenced keeps at most one
    /// contribution per remaining reference. Returns the block bytes freed.
    pub fn scrub_responses(&mut self, request_ids: &[RequestId]) -> u64 {
        let mut touched = false;
        for request_id in request_ids {
            touched |= self.links.remove(request_id).is_some();
            touched |= self.completed.remove(request_id).is_some();
            touched |= self.extensions.remove(request_id).is_some();
            self.block_data.remove(request_id);
            self.response_streams.remove(request_id);
            self.notifees.remove(request_id);
        }
        if !touched {
            return 0;
        }

        let mut references: HashMap<Hash, u64> = HashMap::new();
        for metadata in self.links.values().flatten() {
            if metadata.action == LinkAction::Present {
                *references.entry(metadata.link).or_default() += 1;
            }
        }

        self.block_order.retain(|link| references.contains_key(link));
        self.blocks.retain(|link, pending| match references.get(link) {
            Some(&count) => {
                pending.contributions = pending.contributions.min(count);
                true
            }
            None => false,
        });

        let old_size = self.block_size;
        self.block_size = self.blocks.values().map(PendingBlock::reserved).sum();
        old_size.saturating_sub(self.block_size)
    }

    /// Finalize into a message plus the metadata the worker tracks.
    ///
    /// Notifees are subscribed to the topic on `publisher` here, before any
    /// event for the topic can be published.
    pub(crate) fn build(
        self,
        publisher: &dyn TopicPublisher<Topic, Event>,
    ) -> Result<(PeerMessage, InternalMetadata), MessageQueueError> {
        if self.is_empty() {
            return Err(MessageQueueError::EmptyMessage);
        }

        let Self {
            topic,
            span,
            block_size,
            mut blocks,
            block_order,
            mut links,
            completed,
            mut extensions,
            block_data,
            response_streams,
            notifees,
        } = self;

        let request_ids: BTreeSet<RequestId> = links
            .keys()
            .chain(completed.keys())
            .chain(extensions.keys())
            .copied()
            .collect();

        let responses = request_ids
            .into_iter()
            .map(|request_id| ResponseMessage {
                request_id,
                status: completed
                    .get(&request_id)
                    .copied()
                    .unwrap_or(ResponseStatusCode::PartialResponse),
                metadata: links.remove(&request_id).unwrap_or_default(),
                extensions: extensions.remove(&request_id).unwrap_or_default(),
            })
            .collect();

        let ordered_blocks = block_order
            .into_iter()
            .filter_map(|link| blocks.remove(&link).map(|pending| pending.block))
            .collect();

        let message = PeerMessage::new(responses, ordered_blocks);

        for sink in notifees.into_values().flatten() {
            publisher.subscribe(topic, sink);
        }

        let metadata = InternalMetadata {
            span,
            public: Metadata {
                block_data,
                response_codes: message.response_codes(),
            },
            topic,
            msg_size: block_size,
            response_streams,
        };

        Ok((message, metadata))
    }
}

impl fmt::Debug for MessageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBuilder")
            .field("topic", &self.topic)
            .field("block_size", &self.block_size)
            .field("blocks", &self.blocks.len())
            .field("requests", &self.links.len())
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}
