//! The per-peer worker task.
//!
//! States are running, draining and stopped. The worker owns the message
//! sender outright; nothing else ever touches it.

use shared_types::RequestId;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, Instrument};

use crate::domain::{InternalMetadata, PeerMessage};
use crate::events::{Event, MessageQueueError};
use crate::ports::{Allocator, MessageNetwork, MessageSender};

use super::core::QueueInner;

type BoxedSender = Box<dyn MessageSender>;

/// Runs teardown on every exit path, including task abort.
struct Teardown<'a, N, A: Allocator> {
    inner: &'a QueueInner<N, A>,
}

impl<N, A: Allocator> Drop for Teardown<'_, N, A> {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl<N, A> QueueInner<N, A>
where
    N: MessageNetwork,
    A: Allocator,
{
    pub(crate) async fn run(self: Arc<Self>, mut outgoing_work: mpsc::Receiver<()>) {
        let _teardown = Teardown { inner: &self };
        self.publisher.startup();
        debug!(parent: &self.span, "Message queue worker started");

        let mut sender: Option<BoxedSender> = None;
        loop {
            tokio::select! {
                biased;
                _ = self.ctx.cancelled() => {
                    debug!(parent: &self.span, "Context cancelled, stopping without drain");
                    break;
                }
                _ = self.done.cancelled() => {
                    self.drain(&mut outgoing_work);
                    break;
                }
                signal = outgoing_work.recv() => {
                    if signal.is_none() {
                        break;
                    }
                    self.send_message(&mut sender).await;
                }
            }
        }

        if let Some(active) = sender.take() {
            self.reset_sender(active).await;
        }
    }

    /// Send the oldest builder, if any.
    async fn send_message(&self, sender: &mut Option<BoxedSender>) {
        let Some((message, metadata)) = self.extract_outgoing_message() else {
            return;
        };

        let send_span = info_span!(
            parent: &metadata.span,
            "send_message",
            topic = metadata.topic.as_u64(),
            size = metadata.msg_size,
        );
        self.deliver(&message, &metadata, sender)
            .instrument(send_span)
            .await;
    }

    /// Pop and finalize the head builder. Empty builders resolve to `None`.
    fn extract_outgoing_message(&self) -> Option<(PeerMessage, InternalMetadata)> {
        let builder = {
            let mut builders = self.builders.lock();
            let builder = builders.pop_front()?;
            if !builders.is_empty() {
                self.signal_work();
            }
            builder
        };

        match builder.build(self.publisher.as_ref()) {
            Ok(built) => Some(built),
            Err(MessageQueueError::EmptyMessage) => None,
            Err(e) => {
                error!(parent: &self.span, error = %e, "Unable to assemble message");
                None
            }
        }
    }

    async fn deliver(
        &self,
        message: &PeerMessage,
        metadata: &InternalMetadata,
        sender: &mut Option<BoxedSender>,
    ) {
        self.publisher
            .publish(metadata.topic, Event::queued(metadata.public.clone()));

        match self.transmit(message, sender).await {
            Ok(()) => {
                self.publisher
                    .publish(metadata.topic, Event::sent(metadata.public.clone()));
                self.release(metadata.msg_size);
            }
            Err(e) => {
                self.publish_error(metadata, e);
                self.done.cancel();
            }
        }

        self.publisher.close(metadata.topic);
    }

    /// Open the sender if needed and send one message.
    ///
    /// A sender that failed or was interrupted is reset and discarded.
    async fn transmit(
        &self,
        message: &PeerMessage,
        sender: &mut Option<BoxedSender>,
    ) -> Result<(), MessageQueueError> {
        let mut active = match sender.take() {
            Some(active) => active,
            None => self.open_sender().await?,
        };

        let result = tokio::select! {
            biased;
            _ = self.ctx.cancelled() => Err(MessageQueueError::Cancelled { peer: self.peer }),
            sent = active.send_msg(message) => sent.map_err(|e| {
                info!(peer = %self.peer, error = %e, "Could not send message to peer");
                MessageQueueError::SendFailed {
                    peer: self.peer,
                    reason: e.to_string(),
                }
            }),
        };

        match result {
            Ok(()) => {
                *sender = Some(active);
                Ok(())
            }
            Err(e) => {
                self.reset_sender(active).await;
                Err(e)
            }
        }
    }

    async fn open_sender(&self) -> Result<BoxedSender, MessageQueueError> {
        let opened = tokio::select! {
            biased;
            _ = self.ctx.cancelled() => {
                return Err(MessageQueueError::Cancelled { peer: self.peer });
            }
            opened = self.network.new_message_sender(self.peer, self.config.sender_opts()) => opened,
        };

        opened.map_err(|e| {
            info!(peer = %self.peer, error = %e, "Cant open message sender to peer");
            MessageQueueError::SenderOpen {
                peer: self.peer,
                reason: e.to_string(),
            }
        })
    }

    async fn reset_sender(&self, mut active: BoxedSender) {
        if let Err(e) = active.reset().await {
            debug!(parent: &self.span, error = %e, "Sender reset failed");
        }
    }

    /// Report `cause` for a message that will never be delivered.
    ///
    /// The message's requests are scrubbed from every pending builder first,
    /// so none of their entries is sent or reported a second time.
    fn publish_error(&self, metadata: &InternalMetadata, cause: MessageQueueError) {
        metadata.span.record("error", tracing::field::display(&cause));
        metadata.span.record("otel.status_code", "ERROR");

        let mut request_ids: BTreeSet<RequestId> =
            metadata.public.response_codes.keys().copied().collect();
        for (request_id, stream) in &metadata.response_streams {
            if let Err(e) = stream.close() {
                debug!(parent: &self.span, request_id = %request_id, error = %e, "Response stream close failed");
            }
            request_ids.insert(*request_id);
        }
        let request_ids: Vec<RequestId> = request_ids.into_iter().collect();
        self.scrub_responses(&request_ids);

        self.publisher
            .publish(metadata.topic, Event::error(metadata.public.clone(), cause));
        self.release(metadata.msg_size);
    }

    /// Report every pending builder as failed by shutdown, then close the
    /// builder queue.
    fn drain(&self, outgoing_work: &mut mpsc::Receiver<()>) {
        let _ = outgoing_work.try_recv();

        let mut drained = 0usize;
        loop {
            let next = {
                let mut builders = self.builders.lock();
                let next = builders.pop_front();
                if next.is_none() {
                    builders.close();
                }
                next
            };
            let Some(builder) = next else {
                break;
            };

            match builder.build(self.publisher.as_ref()) {
                Ok((_, metadata)) => {
                    self.publish_error(&metadata, MessageQueueError::Shutdown);
                    self.publisher.close(metadata.topic);
                    drained += 1;
                }
                Err(MessageQueueError::EmptyMessage) => continue,
                Err(e) => error!(parent: &self.span, error = %e, "Unable to assemble message"),
            }
        }

        debug!(parent: &self.span, drained, "Message queue drained");
    }
}

impl<N, A: Allocator> QueueInner<N, A> {
    /// Final cleanup shared by every exit path.
    pub(crate) fn teardown(&self) {
        let abandoned = self.builders.lock().close();
        if !abandoned.is_empty() {
            debug!(parent: &self.span, count = abandoned.len(), "Abandoning pending messages");
        }
        drop(abandoned);

        if let Err(e) = self.allocator.release_peer_memory(self.peer) {
            error!(parent: &self.span, error = %e, "Failed to release peer memory");
        }
        self.publisher.shutdown();
        self.stopped.cancel();
        debug!(parent: &self.span, "Message queue worker stopped");
    }
}
