//! Shared fixtures for the integration flows.

use bx_message_queue::{
    Allocator, Block, Event, EventName, LinkAction, MessageNetwork, MessageQueue, MessageQueueApi,
};
use shared_bus::{topic_channel, TopicSink, TopicSubscription};
use shared_types::{PeerId, RequestId};
use std::time::Duration;
use tokio::time::timeout;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;

/// Upper bound for any single wait in a flow.
pub const WAIT: Duration = Duration::from_secs(5);

pub fn peer(n: u8) -> PeerId {
    PeerId::new([n; 32])
}

/// A block of `size` bytes whose link is derived from `seed`.
pub fn block(seed: u32, size: u64) -> Block {
    let mut link = [0u8; 32];
    link[..4].copy_from_slice(&seed.to_be_bytes());
    Block::new(link, vec![seed as u8; size as usize])
}

/// Queue one present block for `request_id`, notifying `sink`.
pub async fn send_block_to<N, A>(
    queue: &MessageQueue<N, A>,
    request_id: RequestId,
    seed: u32,
    size: u64,
    sink: TopicSink<Event>,
) where
    N: MessageNetwork + 'static,
    A: Allocator + 'static,
{
    let blk = block(seed, size);
    queue
        .allocate_and_build_message(size, move |b| {
            b.add_link(request_id, blk.link, LinkAction::Present);
            b.add_block(blk);
            b.add_notifee(request_id, sink);
        })
        .await;
}

pub async fn send_block<N, A>(
    queue: &MessageQueue<N, A>,
    request_id: RequestId,
    seed: u32,
    size: u64,
) -> TopicSubscription<Event>
where
    N: MessageNetwork + 'static,
    A: Allocator + 'static,
{
    let (sink, sub) = topic_channel();
    send_block_to(queue, request_id, seed, size, sink).await;
    sub
}

/// Every event of a topic, waiting for it to close.
pub async fn events(sub: TopicSubscription<Event>) -> Vec<Event> {
    timeout(WAIT, sub.collect())
        .await
        .expect("topic never closed")
}

pub fn names(events: &[Event]) -> Vec<EventName> {
    events.iter().map(|e| e.name).collect()
}

/// Let spawned tasks run up to their next suspension point.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
