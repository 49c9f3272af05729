//! Test utilities for the message queue.
//!
//! Scripted collaborators for deterministic tests. Enable with the
//! `test-utils` feature flag.
//!
//! # Example
//!
//! ```rust,ignore
//! use bx_message_queue::test_utils::{MockNetwork, RecordingAllocator};
//!
//! let network = Arc::new(MockNetwork::new());
//! let allocator = Arc::new(RecordingAllocator::new());
//! network.fail_sends(true);
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::PeerId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::domain::PeerMessage;
use crate::ports::outbound::{
    Allocator, AllocatorError, MessageNetwork, MessageSender, MessageSenderOpts, NetworkError,
    ResponseStream,
};

#[derive(Debug, Default)]
struct NetworkState {
    sent: Vec<PeerMessage>,
    opens: usize,
    resets: usize,
    connects: Vec<PeerId>,
    last_opts: Option<MessageSenderOpts>,
    fail_open: bool,
    fail_sends: bool,
    block_sends: bool,
}

/// A network whose senders record messages instead of sending them.
///
/// Clones share state, so a test can keep one handle while the queue owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MockNetwork {
    state: Arc<Mutex<NetworkState>>,
    sent_notify: Arc<Notify>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make opening a sender (and `connect_to`) fail.
    pub fn fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Make every send fail as if retries were exhausted.
    pub fn fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    /// Make sends hang until the sender is dropped.
    pub fn block_sends(&self, block: bool) {
        self.state.lock().block_sends = block;
    }

    /// Messages delivered so far, in send order.
    pub fn sent_messages(&self) -> Vec<PeerMessage> {
        self.state.lock().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().sent.len()
    }

    /// Number of senders opened.
    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    /// Number of sender resets.
    pub fn resets(&self) -> usize {
        self.state.lock().resets
    }

    pub fn connects(&self) -> Vec<PeerId> {
        self.state.lock().connects.clone()
    }

    /// Options passed when the last sender was opened.
    pub fn last_opts(&self) -> Option<MessageSenderOpts> {
        self.state.lock().last_opts
    }

    /// Wait until at least `count` messages have been sent.
    pub async fn wait_for_sent(&self, count: usize) {
        loop {
            let notified = self.sent_notify.notified();
            if self.sent_count() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl MessageNetwork for MockNetwork {
    async fn new_message_sender(
        &self,
        peer: PeerId,
        opts: MessageSenderOpts,
    ) -> Result<Box<dyn MessageSender>, NetworkError> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(NetworkError::ConnectionFailed {
                peer,
                reason: "mock refused".into(),
            });
        }
        state.opens += 1;
        state.last_opts = Some(opts);
        Ok(Box::new(MockSender {
            state: Arc::clone(&self.state),
            sent_notify: Arc::clone(&self.sent_notify),
        }))
    }

    async fn connect_to(&self, peer: PeerId) -> Result<(), NetworkError> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(NetworkError::ConnectionFailed {
                peer,
                reason: "mock refused".into(),
            });
        }
        state.connects.push(peer);
        Ok(())
    }
}

/// Sender handed out by [`MockNetwork`].
#[derive(Debug)]
pub struct MockSender {
    state: Arc<Mutex<NetworkState>>,
    sent_notify: Arc<Notify>,
}

#[async_trait]
impl MessageSender for MockSender {
    async fn send_msg(&mut self, message: &PeerMessage) -> Result<(), NetworkError> {
        let (block, fail) = {
            let state = self.state.lock();
            (state.block_sends, state.fail_sends)
        };
        if block {
            return std::future::pending().await;
        }
        if fail {
            return Err(NetworkError::RetriesExhausted {
                attempts: 1,
                last_error: "mock failure".into(),
            });
        }
        self.state.lock().sent.push(message.clone());
        self.sent_notify.notify_waiters();
        Ok(())
    }

    async fn reset(&mut self) -> Result<(), NetworkError> {
        self.state.lock().resets += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct AllocatorState {
    allocations: Vec<(PeerId, u64)>,
    releases: Vec<(PeerId, u64)>,
    peer_releases: Vec<PeerId>,
    block: bool,
}

/// Allocator that grants everything immediately and records each call.
///
/// With [`block_allocations`](Self::block_allocations) set, allocations
/// never complete.
#[derive(Debug, Clone, Default)]
pub struct RecordingAllocator {
    state: Arc<Mutex<AllocatorState>>,
}

impl RecordingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_allocations(&self, block: bool) {
        self.state.lock().block = block;
    }

    /// Granted amounts, in call order.
    pub fn allocations(&self) -> Vec<u64> {
        self.state.lock().allocations.iter().map(|(_, a)| *a).collect()
    }

    /// Released amounts, in call order.
    pub fn releases(&self) -> Vec<u64> {
        self.state.lock().releases.iter().map(|(_, a)| *a).collect()
    }

    pub fn total_allocated(&self) -> u64 {
        self.allocations().iter().sum()
    }

    pub fn total_released(&self) -> u64 {
        self.releases().iter().sum()
    }

    /// Peers whose whole budget was released.
    pub fn peer_releases(&self) -> Vec<PeerId> {
        self.state.lock().peer_releases.clone()
    }
}

#[async_trait]
impl Allocator for RecordingAllocator {
    async fn allocate_block_memory(
        &self,
        peer: PeerId,
        amount: u64,
    ) -> Result<(), AllocatorError> {
        let blocked = self.state.lock().block;
        if blocked {
            return std::future::pending().await;
        }
        self.state.lock().allocations.push((peer, amount));
        Ok(())
    }

    fn release_block_memory(&self, peer: PeerId, amount: u64) -> Result<(), AllocatorError> {
        self.state.lock().releases.push((peer, amount));
        Ok(())
    }

    fn release_peer_memory(&self, peer: PeerId) -> Result<(), AllocatorError> {
        self.state.lock().peer_releases.push(peer);
        Ok(())
    }
}

/// Response stream that remembers whether it was closed.
#[derive(Debug, Default)]
pub struct MockResponseStream {
    closed: AtomicBool,
}

impl MockResponseStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ResponseStream for MockResponseStream {
    fn close(&self) -> Result<(), NetworkError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
