//! # Batching Properties
//!
//! Randomized checks of the batching rule and of concurrent producers
//! against the full queue.

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    use bx_message_queue::test_utils::{MockNetwork, RecordingAllocator};
    use bx_message_queue::{
        EventName, MessageQueue, MessageQueueApi, MessageQueueConfig, MAX_BLOCK_SIZE,
    };
    use shared_bus::topic_channel;
    use shared_types::{RequestId, ResponseStatusCode};

    use crate::integration::support::{events, names, peer, send_block, send_block_to, KIB, WAIT};

    /// Expected message block sizes for a sequence of mutation sizes.
    fn expected_batches(sizes: &[u64]) -> Vec<u64> {
        let mut batches: Vec<u64> = Vec::new();
        for &size in sizes {
            match batches.last_mut() {
                Some(tail) if size == 0 || *tail + size <= MAX_BLOCK_SIZE => *tail += size,
                _ => batches.push(size),
            }
        }
        batches
    }

    #[test]
    fn test_expected_batches_model() {
        assert_eq!(
            expected_batches(&[100 * KIB, 100 * KIB, 350 * KIB]),
            vec![200 * KIB, 350 * KIB]
        );
        assert_eq!(expected_batches(&[0, MAX_BLOCK_SIZE, 0]), vec![MAX_BLOCK_SIZE]);
    }

    /// Messages follow the batching rule for random size sequences.
    #[tokio::test]
    async fn test_random_sequences_batch_as_expected() {
        for seed in 0..8u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let sizes: Vec<u64> = (0..24)
                .map(|_| {
                    if rng.gen_bool(0.15) {
                        0
                    } else {
                        rng.gen_range(1..=300 * KIB)
                    }
                })
                .collect();

            let network = Arc::new(MockNetwork::new());
            let allocator = Arc::new(RecordingAllocator::new());
            let queue = MessageQueue::new(
                CancellationToken::new(),
                peer(9),
                Arc::clone(&network),
                Arc::clone(&allocator),
                MessageQueueConfig::default(),
            )
            .unwrap();

            for (index, &size) in sizes.iter().enumerate() {
                let request_id = RequestId::new();
                if size == 0 {
                    queue
                        .allocate_and_build_message(0, move |b| {
                            b.add_response_code(request_id, ResponseStatusCode::RequestCompletedFull)
                        })
                        .await;
                } else {
                    send_block(&queue, request_id, index as u32, size).await;
                }
            }

            let expected = expected_batches(&sizes);
            assert_eq!(queue.pending_builders(), expected.len(), "seed {seed}");

            queue.startup();
            timeout(WAIT, network.wait_for_sent(expected.len()))
                .await
                .unwrap();
            queue.shutdown();
            timeout(WAIT, queue.stopped()).await.unwrap();

            let sent: Vec<u64> = network
                .sent_messages()
                .iter()
                .map(|m| m.block_size())
                .collect();
            assert_eq!(sent, expected, "seed {seed}");
            assert_eq!(allocator.total_released(), allocator.total_allocated(), "seed {seed}");
        }
    }

    /// Concurrent producers all observe a terminal event and every byte is
    /// released.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_all_resolve() {
        bx_telemetry::init_test_tracing();
        let network = Arc::new(MockNetwork::new());
        let allocator = Arc::new(RecordingAllocator::new());
        let queue = Arc::new(MessageQueue::new(
            CancellationToken::new(),
            peer(10),
            Arc::clone(&network),
            Arc::clone(&allocator),
            MessageQueueConfig::default(),
        ).unwrap());
        queue.startup();

        let mut producers = Vec::new();
        for producer in 0..8u32 {
            let queue = Arc::clone(&queue);
            producers.push(tokio::spawn(async move {
                let mut rng = StdRng::seed_from_u64(u64::from(producer));
                let mut subs = Vec::new();
                for n in 0..20u32 {
                    let (sink, sub) = topic_channel();
                    let size = rng.gen_range(1..=64 * KIB);
                    send_block_to(&*queue, RequestId::new(), producer * 100 + n, size, sink).await;
                    subs.push(sub);
                }
                subs
            }));
        }

        let mut outcomes = Vec::new();
        for producer in producers {
            for sub in timeout(WAIT, producer).await.unwrap().unwrap() {
                outcomes.push(names(&events(sub).await));
            }
        }

        assert_eq!(outcomes.len(), 160);
        assert!(outcomes
            .iter()
            .all(|o| o == &vec![EventName::Queued, EventName::Sent]));

        let sent = network.sent_messages();
        assert!(sent.iter().all(|m| m.block_size() <= MAX_BLOCK_SIZE));
        let blocks_sent: usize = sent.iter().map(|m| m.blocks().len()).sum();
        assert_eq!(blocks_sent, 160);

        queue.shutdown();
        timeout(WAIT, queue.stopped()).await.unwrap();
        assert_eq!(allocator.total_released(), allocator.total_allocated());
    }
}
