//! # Message Queue Flows
//!
//! The queue wired to the reference collaborators:
//!
//! 1. **Backpressure**: producers wait on `MemoryAllocator` until sent
//!    messages release their memory
//! 2. **Shutdown**: pending messages and waiting producers all resolve
//! 3. **Retrying transport**: `RetryingSender` absorbs transient stream
//!    failures; exhausted retries tear the queue down
//! 4. **Configuration**: TOML settings reach the network untouched

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    use bx_message_queue::test_utils::MockNetwork;
    use bx_message_queue::{
        AllocatorConfig, ConfigProvider, EventName, MemoryAllocator, MessageNetwork, MessageQueue,
        MessageQueueApi, MessageQueueConfig, MessageQueueError, MessageSender, MessageSenderOpts,
        MessageStream, NetworkError, PeerMessage, RetryingSender, TomlConfigProvider,
    };
    use shared_bus::topic_channel;
    use shared_types::{PeerId, RequestId};

    use crate::integration::support::{
        events, names, peer, send_block, send_block_to, settle, KIB, MIB, WAIT,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    #[derive(Default)]
    struct FlakyState {
        failures_left: AtomicUsize,
        writes: AtomicUsize,
        delivered: Mutex<Vec<PeerMessage>>,
        opts: Mutex<Option<MessageSenderOpts>>,
        connects: Mutex<Vec<PeerId>>,
    }

    /// Stream whose first writes fail, shared across reconnects.
    struct FlakyStream {
        state: Arc<FlakyState>,
    }

    #[async_trait]
    impl MessageStream for FlakyStream {
        async fn write_message(&mut self, message: &PeerMessage) -> Result<(), NetworkError> {
            self.state.writes.fetch_add(1, Ordering::SeqCst);
            let failed = self
                .state
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(NetworkError::StreamReset);
            }
            self.state.delivered.lock().push(message.clone());
            Ok(())
        }

        async fn reset(&mut self) -> Result<(), NetworkError> {
            Ok(())
        }
    }

    /// Network handing out `RetryingSender`s over a `FlakyStream`.
    #[derive(Clone, Default)]
    struct FlakyNetwork {
        state: Arc<FlakyState>,
    }

    impl FlakyNetwork {
        fn failing(failures: usize) -> Self {
            let network = Self::default();
            network.state.failures_left.store(failures, Ordering::SeqCst);
            network
        }

        fn delivered(&self) -> usize {
            self.state.delivered.lock().len()
        }
    }

    #[async_trait]
    impl MessageNetwork for FlakyNetwork {
        async fn new_message_sender(
            &self,
            peer: PeerId,
            opts: MessageSenderOpts,
        ) -> Result<Box<dyn MessageSender>, NetworkError> {
            *self.state.opts.lock() = Some(opts);
            let stream = FlakyStream {
                state: Arc::clone(&self.state),
            };
            Ok(Box::new(RetryingSender::new(peer, stream, opts)))
        }

        async fn connect_to(&self, peer: PeerId) -> Result<(), NetworkError> {
            self.state.connects.lock().push(peer);
            Ok(())
        }
    }

    fn fast_retry_config(max_retries: u32) -> MessageQueueConfig {
        MessageQueueConfig {
            max_retries,
            send_timeout: Duration::from_secs(1),
            send_error_backoff: Duration::from_millis(5),
        }
    }

    fn limited_allocator(per_peer: u64) -> Arc<MemoryAllocator> {
        Arc::new(MemoryAllocator::new(AllocatorConfig {
            max_total_bytes: 64 * MIB,
            max_per_peer_bytes: per_peer,
        }))
    }

    // =============================================================================
    // BACKPRESSURE
    // =============================================================================

    /// A producer over the peer budget waits until an earlier message is sent.
    #[tokio::test]
    async fn test_backpressure_released_by_send() {
        bx_telemetry::init_test_tracing();
        let network = Arc::new(MockNetwork::new());
        let allocator = limited_allocator(100 * KIB);
        let queue = Arc::new(MessageQueue::new(
            CancellationToken::new(),
            peer(1),
            Arc::clone(&network),
            Arc::clone(&allocator),
            MessageQueueConfig::default(),
        ).unwrap());

        network.connect_to(peer(1)).await.unwrap();
        assert_eq!(network.connects(), vec![peer(1)]);

        let first = send_block(&*queue, RequestId::new(), 1, 100 * KIB).await;

        let (sink, second) = topic_channel();
        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                send_block_to(&*queue, RequestId::new(), 2, 50 * KIB, sink).await;
            })
        };
        settle().await;
        assert_eq!(allocator.stats().pending_allocations, 1);
        assert_eq!(queue.pending_builders(), 1);

        queue.startup();

        assert_eq!(names(&events(first).await), vec![EventName::Queued, EventName::Sent]);
        timeout(WAIT, producer).await.unwrap().unwrap();
        assert_eq!(names(&events(second).await), vec![EventName::Queued, EventName::Sent]);

        assert_eq!(network.sent_count(), 2);
        assert_eq!(allocator.stats().total_allocated, 0);
    }

    /// Scrubbing a request hands its memory straight back.
    #[tokio::test]
    async fn test_scrub_returns_memory_to_allocator() {
        let allocator = limited_allocator(MIB);
        let queue = MessageQueue::new(
            CancellationToken::new(),
            peer(2),
            Arc::new(MockNetwork::new()),
            Arc::clone(&allocator),
            MessageQueueConfig::default(),
        )
        .unwrap();

        let cancelled = RequestId::new();
        let sub = send_block(&queue, cancelled, 1, 200 * KIB).await;
        assert_eq!(allocator.peer_allocated(peer(2)), 200 * KIB);

        queue.scrub_responses(&[cancelled]);

        assert_eq!(allocator.peer_allocated(peer(2)), 0);
        assert_eq!(queue.pending_builders(), 0);
        assert!(events(sub).await.is_empty());
    }

    // =============================================================================
    // SHUTDOWN
    // =============================================================================

    /// Shutdown resolves both the pending message and the waiting producer.
    #[tokio::test]
    async fn test_shutdown_resolves_waiting_producer() {
        let network = Arc::new(MockNetwork::new());
        let allocator = limited_allocator(100 * KIB);
        let queue = Arc::new(MessageQueue::new(
            CancellationToken::new(),
            peer(3),
            Arc::clone(&network),
            Arc::clone(&allocator),
            MessageQueueConfig::default(),
        ).unwrap());

        let pending = send_block(&*queue, RequestId::new(), 1, 100 * KIB).await;
        let (sink, waiting) = topic_channel();
        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                send_block_to(&*queue, RequestId::new(), 2, 50 * KIB, sink).await;
            })
        };
        settle().await;

        queue.shutdown();
        queue.startup();
        timeout(WAIT, queue.stopped()).await.unwrap();
        timeout(WAIT, producer).await.unwrap().unwrap();

        let pending = events(pending).await;
        assert_eq!(names(&pending), vec![EventName::Error]);
        assert_eq!(pending[0].error, Some(MessageQueueError::Shutdown));
        assert!(events(waiting).await.is_empty());

        assert_eq!(network.sent_count(), 0);
        assert_eq!(allocator.stats().total_allocated, 0);
        assert_eq!(allocator.stats().pending_allocations, 0);
    }

    /// Dropping the last handle stops the worker and frees the peer budget.
    #[tokio::test]
    async fn test_drop_frees_peer_budget() {
        let allocator = limited_allocator(MIB);
        let queue = MessageQueue::new(
            CancellationToken::new(),
            peer(4),
            Arc::new(MockNetwork::new()),
            Arc::clone(&allocator),
            MessageQueueConfig::default(),
        )
        .unwrap();
        queue.startup();
        let _pending = send_block(&queue, RequestId::new(), 1, 10 * KIB).await;
        drop(queue);

        timeout(WAIT, async {
            while allocator.stats().total_allocated > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("peer budget never released");
    }

    // =============================================================================
    // RETRYING TRANSPORT
    // =============================================================================

    #[tokio::test]
    async fn test_retrying_sender_recovers() {
        let network = Arc::new(FlakyNetwork::failing(2));
        let queue = MessageQueue::new(
            CancellationToken::new(),
            peer(5),
            Arc::clone(&network),
            limited_allocator(MIB),
            fast_retry_config(3),
        )
        .unwrap();
        queue.startup();

        let sub = send_block(&queue, RequestId::new(), 1, KIB).await;

        assert_eq!(names(&events(sub).await), vec![EventName::Queued, EventName::Sent]);
        assert_eq!(network.state.writes.load(Ordering::SeqCst), 3);
        assert_eq!(network.delivered(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_tear_queue_down() {
        let network = Arc::new(FlakyNetwork::failing(usize::MAX));
        let allocator = limited_allocator(MIB);
        let queue = MessageQueue::new(
            CancellationToken::new(),
            peer(6),
            Arc::clone(&network),
            Arc::clone(&allocator),
            fast_retry_config(2),
        )
        .unwrap();

        let failed = send_block(&queue, RequestId::new(), 1, 400 * KIB).await;
        let later = send_block(&queue, RequestId::new(), 2, 400 * KIB).await;
        queue.startup();
        timeout(WAIT, queue.stopped()).await.unwrap();

        let failed = events(failed).await;
        assert_eq!(names(&failed), vec![EventName::Queued, EventName::Error]);
        match &failed[1].error {
            Some(MessageQueueError::SendFailed { peer: p, reason }) => {
                assert_eq!(*p, peer(6));
                assert!(reason.contains("2 attempts"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let later = events(later).await;
        assert_eq!(names(&later), vec![EventName::Error]);
        assert_eq!(later[0].error, Some(MessageQueueError::Shutdown));

        assert_eq!(network.state.writes.load(Ordering::SeqCst), 2);
        assert_eq!(network.delivered(), 0);
        assert_eq!(allocator.stats().total_allocated, 0);
    }

    // =============================================================================
    // CONFIGURATION
    // =============================================================================

    #[tokio::test]
    async fn test_file_config_reaches_network() {
        let provider = TomlConfigProvider::parse(
            r#"
            [message_queue]
            max_retries = 4
            send_timeout_ms = 2500
            send_error_backoff_ms = 5
            "#,
        )
        .unwrap();
        let network = Arc::new(FlakyNetwork::default());
        let queue = MessageQueue::new(
            CancellationToken::new(),
            peer(7),
            Arc::clone(&network),
            limited_allocator(MIB),
            provider.message_queue_config(),
        )
        .unwrap();
        queue.startup();
        events(send_block(&queue, RequestId::new(), 1, KIB).await).await;

        let opts = network.state.opts.lock().expect("sender never opened");
        assert_eq!(opts.max_retries, 4);
        assert_eq!(opts.send_timeout, Duration::from_millis(2500));
        assert_eq!(opts.send_error_backoff, Duration::from_millis(5));

        network.connect_to(peer(7)).await.unwrap();
        assert_eq!(*network.state.connects.lock(), vec![peer(7)]);
    }
}
