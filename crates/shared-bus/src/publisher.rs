//! # Topic Publisher
//!
//! Defines the publishing side of the bus.

use crate::subscriber::TopicSink;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Trait for publishing events to per-topic subscribers.
///
/// The message queue only relies on this contract: start accepting
/// publishes, publish to a topic, close a topic, shut everything down.
pub trait TopicPublisher<T, E>: Send + Sync {
    /// Begin accepting publishes.
    fn startup(&self);

    /// Publish an event to every subscriber of `topic`.
    ///
    /// # Returns
    ///
    /// The number of subscribers that received the event. Events for a
    /// topic without subscribers are dropped silently.
    fn publish(&self, topic: T, event: E) -> usize;

    /// Close a topic. Its subscribers observe the end of their stream.
    fn close(&self, topic: T);

    /// Close every topic and stop accepting publishes and subscriptions.
    fn shutdown(&self);

    /// Register a sink for `topic`.
    fn subscribe(&self, topic: T, sink: TopicSink<E>);
}

/// Lifecycle of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    /// Created, publishes are not yet accepted.
    Idle,
    /// Publishing.
    Running,
    /// Shut down; terminal.
    Stopped,
}

struct BusInner<T, E> {
    state: BusState,
    topics: HashMap<T, Vec<TopicSink<E>>>,
}

/// In-memory implementation of the topic bus.
///
/// Each topic keeps its own list of sinks; delivery is synchronous and in
/// publish order. Suitable for a single process.
pub struct InMemoryTopicBus<T, E> {
    inner: RwLock<BusInner<T, E>>,

    /// Total events published (including ones nobody received).
    events_published: AtomicU64,
}

impl<T, E> InMemoryTopicBus<T, E>
where
    T: Copy + Eq + Hash + Debug,
    E: Clone,
{
    /// Create a new, idle bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BusInner {
                state: BusState::Idle,
                topics: HashMap::new(),
            }),
            events_published: AtomicU64::new(0),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BusState {
        self.inner.read().state
    }

    /// Number of live sinks registered for a topic.
    #[must_use]
    pub fn subscriber_count(&self, topic: T) -> usize {
        self.inner
            .read()
            .topics
            .get(&topic)
            .map_or(0, |sinks| sinks.iter().filter(|s| !s.is_closed()).count())
    }

    /// Number of topics that have subscribers and are not yet closed.
    #[must_use]
    pub fn open_topics(&self) -> usize {
        self.inner.read().topics.len()
    }

    /// Get the total number of events published.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

impl<T, E> Default for InMemoryTopicBus<T, E>
where
    T: Copy + Eq + Hash + Debug,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> TopicPublisher<T, E> for InMemoryTopicBus<T, E>
where
    T: Copy + Eq + Hash + Debug + Send + Sync,
    E: Clone + Send + Sync,
{
    fn startup(&self) {
        let mut inner = self.inner.write();
        if inner.state == BusState::Idle {
            inner.state = BusState::Running;
            debug!("Topic bus started");
        }
    }

    fn publish(&self, topic: T, event: E) -> usize {
        let mut inner = self.inner.write();
        if inner.state != BusState::Running {
            warn!(topic = ?topic, state = ?inner.state, "Event dropped (bus not running)");
            return 0;
        }

        self.events_published.fetch_add(1, Ordering::Relaxed);

        let Some(sinks) = inner.topics.get_mut(&topic) else {
            return 0;
        };

        sinks.retain(|sink| !sink.is_closed());
        let delivered = sinks
            .iter()
            .filter(|sink| sink.send(event.clone()))
            .count();

        debug!(topic = ?topic, receivers = delivered, "Event published");
        delivered
    }

    fn close(&self, topic: T) {
        if self.inner.write().topics.remove(&topic).is_some() {
            debug!(topic = ?topic, "Topic closed");
        }
    }

    fn shutdown(&self) {
        let mut inner = self.inner.write();
        inner.state = BusState::Stopped;
        let closed = inner.topics.len();
        inner.topics.clear();
        debug!(closed_topics = closed, "Topic bus shut down");
    }

    fn subscribe(&self, topic: T, sink: TopicSink<E>) {
        let mut inner = self.inner.write();
        if inner.state == BusState::Stopped {
            // Dropping the sink ends the subscription right away.
            return;
        }
        inner.topics.entry(topic).or_default().push(sink);
    }
}
