//! In-process block memory allocator.
//!
//! Tracks block bytes held per peer and in total. Allocations that do not
//! fit wait in a per-peer FIFO and are granted as memory is released.

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::PeerId;
use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;
use tracing::debug;

use crate::domain::AllocatorConfig;
use crate::ports::outbound::{Allocator, AllocatorError};

/// An allocation waiting for memory
struct PendingAllocation {
    amount: u64,
    /// Resolved on grant or when the peer is released
    sender: oneshot::Sender<Result<(), AllocatorError>>,
}

#[derive(Default)]
struct PeerBudget {
    allocated: u64,
    pending: VecDeque<PendingAllocation>,
}

#[derive(Default)]
struct AllocatorState {
    total_allocated: u64,
    peers: HashMap<PeerId, PeerBudget>,
}

/// Snapshot of allocator usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Bytes granted across all peers
    pub total_allocated: u64,
    /// Peers holding memory or waiting for it
    pub peers: usize,
    /// Allocations still waiting
    pub pending_allocations: usize,
}

/// Reference [`Allocator`] with a total and a per-peer byte limit.
///
/// A request larger than a limit is still granted once the holder it would
/// exceed (the peer, or everyone) holds nothing, so it cannot wait forever.
/// A waiter whose future is dropped is never charged.
pub struct MemoryAllocator {
    config: AllocatorConfig,
    state: Mutex<AllocatorState>,
}

impl MemoryAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(AllocatorState::default()),
        }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub fn stats(&self) -> AllocatorStats {
        let state = self.state.lock();
        AllocatorStats {
            total_allocated: state.total_allocated,
            peers: state.peers.len(),
            pending_allocations: state.peers.values().map(|b| b.pending.len()).sum(),
        }
    }

    /// Bytes currently granted to `peer`.
    pub fn peer_allocated(&self, peer: PeerId) -> u64 {
        self.state
            .lock()
            .peers
            .get(&peer)
            .map_or(0, |budget| budget.allocated)
    }

    fn fits(&self, total_allocated: u64, peer_allocated: u64, amount: u64) -> bool {
        let total_ok =
            total_allocated + amount <= self.config.max_total_bytes || total_allocated == 0;
        let peer_ok =
            peer_allocated + amount <= self.config.max_per_peer_bytes || peer_allocated == 0;
        total_ok && peer_ok
    }

    /// Grant queued allocations that now fit, oldest first per peer.
    fn grant_pending(&self, state: &mut AllocatorState) {
        let AllocatorState {
            total_allocated,
            peers,
        } = state;

        for budget in peers.values_mut() {
            while let Some(head) = budget.pending.front() {
                if head.sender.is_closed() {
                    budget.pending.pop_front();
                    continue;
                }
                if !self.fits(*total_allocated, budget.allocated, head.amount) {
                    break;
                }
                let Some(granted) = budget.pending.pop_front() else {
                    break;
                };
                if granted.sender.send(Ok(())).is_ok() {
                    budget.allocated += granted.amount;
                    *total_allocated += granted.amount;
                }
            }
        }

        peers.retain(|_, budget| budget.allocated > 0 || !budget.pending.is_empty());
    }
}

impl Default for MemoryAllocator {
    fn default() -> Self {
        Self::new(AllocatorConfig::default())
    }
}

#[async_trait]
impl Allocator for MemoryAllocator {
    async fn allocate_block_memory(
        &self,
        peer: PeerId,
        amount: u64,
    ) -> Result<(), AllocatorError> {
        let receiver = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let budget = state.peers.entry(peer).or_default();

            if budget.pending.is_empty()
                && self.fits(state.total_allocated, budget.allocated, amount)
            {
                budget.allocated += amount;
                state.total_allocated += amount;
                return Ok(());
            }

            let (sender, receiver) = oneshot::channel();
            budget
                .pending
                .push_back(PendingAllocation { amount, sender });
            debug!(peer = %peer, amount, queued = budget.pending.len(), "Block memory allocation queued");
            receiver
        };

        receiver
            .await
            .unwrap_or(Err(AllocatorError::PeerReleased(peer)))
    }

    fn release_block_memory(&self, peer: PeerId, amount: u64) -> Result<(), AllocatorError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let budget = state
            .peers
            .get_mut(&peer)
            .ok_or(AllocatorError::UnknownPeer(peer))?;

        if amount > budget.allocated {
            return Err(AllocatorError::ReleaseExceedsAllocation {
                requested: amount,
                allocated: budget.allocated,
            });
        }

        budget.allocated -= amount;
        state.total_allocated -= amount;
        self.grant_pending(state);
        Ok(())
    }

    fn release_peer_memory(&self, peer: PeerId) -> Result<(), AllocatorError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(budget) = state.peers.remove(&peer) else {
            return Ok(());
        };

        state.total_allocated -= budget.allocated;
        let failed = budget.pending.len();
        for pending in budget.pending {
            let _ = pending.sender.send(Err(AllocatorError::PeerReleased(peer)));
        }
        debug!(peer = %peer, freed = budget.allocated, failed, "Peer memory released");

        self.grant_pending(state);
        Ok(())
    }
}
