use async_trait::async_trait;
use shared_types::RequestId;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::MessageBuilder;
use crate::ports::{Allocator, MessageNetwork, MessageQueueApi};
use crate::service::MessageQueue;

#[async_trait]
impl<N, A> MessageQueueApi for MessageQueue<N, A>
where
    N: MessageNetwork + 'static,
    A: Allocator + 'static,
{
    async fn allocate_and_build_message<F>(&self, size: u64, build: F)
    where
        F: FnOnce(&mut MessageBuilder) + Send,
    {
        let inner = &self.inner;
        if size > 0 {
            tokio::select! {
                biased;
                _ = inner.ctx.cancelled() => {
                    debug!(parent: &inner.span, size, "Context cancelled while waiting for block memory");
                    return;
                }
                granted = inner.allocator.allocate_block_memory(inner.peer, size) => {
                    if let Err(e) = granted {
                        warn!(parent: &inner.span, size, error = %e, "Block memory allocation failed");
                        return;
                    }
                }
            }
        }

        if inner.build_message(size, build) {
            inner.signal_work();
        }
    }

    fn startup(&self) {
        let Some(outgoing_work) = self.inner.work_receiver.lock().take() else {
            warn!(parent: &self.inner.span, "Message queue already started");
            return;
        };
        tokio::spawn(Arc::clone(&self.inner).run(outgoing_work));
    }

    fn shutdown(&self) {
        self.inner.done.cancel();
    }

    fn scrub_responses(&self, request_ids: &[RequestId]) {
        self.inner.scrub_responses(request_ids);
    }
}
