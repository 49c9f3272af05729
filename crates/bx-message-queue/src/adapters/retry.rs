//! Retrying message sender.
//!
//! Applies `MessageSenderOpts` on top of a single-attempt stream: a timeout
//! per attempt, up to `max_retries` attempts, a stream reset after every
//! failed attempt and a backoff pause before the next one.

use async_trait::async_trait;
use shared_types::PeerId;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::domain::PeerMessage;
use crate::ports::outbound::{MessageSender, MessageSenderOpts, NetworkError};

/// One attempt at writing a message to a peer.
#[async_trait]
pub trait MessageStream: Send {
    async fn write_message(&mut self, message: &PeerMessage) -> Result<(), NetworkError>;

    /// Drop the underlying stream; the next write opens a fresh one.
    async fn reset(&mut self) -> Result<(), NetworkError>;
}

/// [`MessageSender`] that retries over a [`MessageStream`].
pub struct RetryingSender<S> {
    peer: PeerId,
    stream: S,
    opts: MessageSenderOpts,
}

impl<S: MessageStream> RetryingSender<S> {
    pub fn new(peer: PeerId, stream: S, opts: MessageSenderOpts) -> Self {
        Self { peer, stream, opts }
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn opts(&self) -> &MessageSenderOpts {
        &self.opts
    }
}

#[async_trait]
impl<S: MessageStream> MessageSender for RetryingSender<S> {
    async fn send_msg(&mut self, message: &PeerMessage) -> Result<(), NetworkError> {
        let attempts = self.opts.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let error = match timeout(self.opts.send_timeout, self.stream.write_message(message)).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => e,
                Err(_) => NetworkError::Timeout(self.opts.send_timeout),
            };
            debug!(peer = %self.peer, attempt, error = %error, "Send attempt failed");

            if let Err(e) = self.stream.reset().await {
                debug!(peer = %self.peer, error = %e, "Stream reset failed");
            }
            last_error = Some(error);

            if attempt < attempts {
                sleep(self.opts.send_error_backoff).await;
            }
        }

        Err(NetworkError::RetriesExhausted {
            attempts,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    async fn reset(&mut self) -> Result<(), NetworkError> {
        self.stream.reset().await
    }
}
