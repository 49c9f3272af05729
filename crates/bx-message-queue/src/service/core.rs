use parking_lot::Mutex;
use shared_bus::{InMemoryTopicBus, TopicPublisher};
use shared_types::{PeerId, RequestId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info_span, Span};

use crate::domain::{BuilderQueue, ConfigError, MessageBuilder, MessageQueueConfig, Topic};
use crate::events::Event;
use crate::ports::{Allocator, MessageNetwork};

/// Outgoing message queue for a single peer.
///
/// Producers append to the tail builder through
/// [`MessageQueueApi`](crate::ports::MessageQueueApi); one background worker,
/// launched by `startup`, sends builders in FIFO order and publishes their
/// lifecycle events.
///
/// Dropping the queue requests a graceful shutdown.
///
/// # Example
///
/// ```rust,ignore
/// let queue = MessageQueue::new(ctx, peer, network, allocator, MessageQueueConfig::default())?;
/// queue.startup();
///
/// queue
///     .allocate_and_build_message(block.size(), |b| {
///         b.add_link(request_id, block.link, LinkAction::Present);
///         b.add_block(block);
///     })
///     .await;
/// ```
pub struct MessageQueue<N, A> {
    pub(crate) inner: Arc<QueueInner<N, A>>,
}

/// State shared between the handle and the worker task.
pub(crate) struct QueueInner<N, A> {
    pub(crate) peer: PeerId,
    pub(crate) network: Arc<N>,
    pub(crate) allocator: Arc<A>,
    pub(crate) publisher: Arc<dyn TopicPublisher<Topic, Event>>,
    pub(crate) builders: Mutex<BuilderQueue>,
    /// Capacity-one wake signal; a full channel means work is already pending.
    pub(crate) outgoing_work: mpsc::Sender<()>,
    /// Receiving side of `outgoing_work`, taken by the worker on startup.
    pub(crate) work_receiver: Mutex<Option<mpsc::Receiver<()>>>,
    /// Graceful shutdown request.
    pub(crate) done: CancellationToken,
    /// Governing context. Cancelling it aborts without draining.
    pub(crate) ctx: CancellationToken,
    /// Cancelled once the worker has torn down.
    pub(crate) stopped: CancellationToken,
    pub(crate) config: MessageQueueConfig,
    pub(crate) span: Span,
}

impl<N, A> MessageQueue<N, A>
where
    N: MessageNetwork + 'static,
    A: Allocator + 'static,
{
    /// Create a queue for `peer` publishing on its own in-memory bus.
    ///
    /// Nothing is sent until [`startup`](crate::ports::MessageQueueApi::startup).
    ///
    /// # Errors
    ///
    /// Returns the validation error if `config` is invalid.
    pub fn new(
        ctx: CancellationToken,
        peer: PeerId,
        network: Arc<N>,
        allocator: Arc<A>,
        config: MessageQueueConfig,
    ) -> Result<Self, ConfigError> {
        Self::with_publisher(
            ctx,
            peer,
            network,
            allocator,
            config,
            Arc::new(InMemoryTopicBus::new()),
        )
    }

    /// Create a queue publishing lifecycle events on `publisher`.
    ///
    /// The worker starts the publisher and shuts it down when it stops, so
    /// the publisher must not be shared with another queue.
    pub fn with_publisher(
        ctx: CancellationToken,
        peer: PeerId,
        network: Arc<N>,
        allocator: Arc<A>,
        config: MessageQueueConfig,
        publisher: Arc<dyn TopicPublisher<Topic, Event>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let (outgoing_work, work_receiver) = mpsc::channel(1);
        let span = info_span!("message_queue", peer = %peer);

        Ok(Self {
            inner: Arc::new(QueueInner {
                peer,
                network,
                allocator,
                publisher,
                builders: Mutex::new(BuilderQueue::new()),
                outgoing_work,
                work_receiver: Mutex::new(Some(work_receiver)),
                done: CancellationToken::new(),
                ctx,
                stopped: CancellationToken::new(),
                config,
                span,
            }),
        })
    }
}

impl<N, A> MessageQueue<N, A> {
    /// The peer this queue sends to.
    pub fn peer(&self) -> PeerId {
        self.inner.peer
    }

    pub fn config(&self) -> &MessageQueueConfig {
        &self.inner.config
    }

    /// Number of builders waiting to be sent, including the open tail.
    pub fn pending_builders(&self) -> usize {
        self.inner.builders.lock().len()
    }

    /// True once the worker has released the peer's memory and shut the
    /// publisher down.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.is_cancelled()
    }

    /// Wait for the worker to stop. Never resolves if the queue was not
    /// started.
    pub async fn stopped(&self) {
        self.inner.stopped.cancelled().await;
    }
}

impl<N, A> Drop for MessageQueue<N, A> {
    fn drop(&mut self) {
        self.inner.done.cancel();
    }
}

impl<N, A> QueueInner<N, A>
where
    A: Allocator,
{
    /// Run `build` against the tail builder under the queue lock.
    ///
    /// Returns true if the worker should be woken. Once the queue is closed,
    /// or no topic is left for a new message, the reservation is handed
    /// straight back.
    pub(crate) fn build_message<F>(&self, size: u64, build: F) -> bool
    where
        F: FnOnce(&mut MessageBuilder),
    {
        let mut builders = self.builders.lock();
        if builders.is_closed() {
            drop(builders);
            debug!(parent: &self.span, size, "queue closed, mutation dropped");
            self.release(size);
            return false;
        }
        let built = builders.build_message(size, &self.span, build);
        match built {
            Ok(non_empty) => non_empty,
            Err(e) => {
                drop(builders);
                error!(parent: &self.span, size, error = %e, "Mutation dropped");
                self.release(size);
                false
            }
        }
    }

    pub(crate) fn signal_work(&self) {
        // Full: a wake-up is already pending. Closed: the worker is gone.
        let _ = self.outgoing_work.try_send(());
    }

    /// Scrub `request_ids` from every pending builder and return the freed
    /// block memory to the allocator.
    pub(crate) fn scrub_responses(&self, request_ids: &[RequestId]) {
        let freed = self.builders.lock().scrub_responses(request_ids);
        self.release(freed);
    }

    /// Return `amount` block bytes for this peer. Failures only get logged.
    pub(crate) fn release(&self, amount: u64) {
        if amount == 0 {
            return;
        }
        if let Err(e) = self.allocator.release_block_memory(self.peer, amount) {
            error!(parent: &self.span, amount, error = %e, "Failed to release block memory");
        }
    }
}
