//! # Topic Subscriber
//!
//! Defines the subscription side of the bus: a sink that the publisher
//! writes into and the subscription handle that reads from it.

use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The topic was closed or the bus shut down.
    #[error("Topic closed")]
    Closed,
}

/// Create a connected sink/subscription pair.
///
/// The sink is handed to a publisher (directly or through whoever registers
/// it for a topic); the subscription stays with the party waiting for events.
#[must_use]
pub fn topic_channel<E>() -> (TopicSink<E>, TopicSubscription<E>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (TopicSink { sender }, TopicSubscription { receiver })
}

/// Write side of a subscription, owned by the publisher.
///
/// Dropping the last sink ends the matching subscription.
#[derive(Debug)]
pub struct TopicSink<E> {
    sender: mpsc::UnboundedSender<E>,
}

impl<E> TopicSink<E> {
    /// Deliver an event. Returns false if the subscriber has gone away.
    pub fn send(&self, event: E) -> bool {
        self.sender.send(event).is_ok()
    }

    /// True once the subscription handle has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl<E> Clone for TopicSink<E> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// A subscription handle for receiving the events of one topic.
#[derive(Debug)]
pub struct TopicSubscription<E> {
    receiver: mpsc::UnboundedReceiver<E>,
}

impl<E> TopicSubscription<E> {
    /// Receive the next event.
    ///
    /// # Returns
    ///
    /// - `Some(event)` - The next event, in publish order
    /// - `None` - The topic was closed and every event has been consumed
    pub async fn recv(&mut self) -> Option<E> {
        self.receiver.recv().await
    }

    /// Try to receive the next event without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(event))` - An event was available
    /// - `Ok(None)` - No event available yet
    /// - `Err(SubscriptionError::Closed)` - The topic was closed
    pub fn try_recv(&mut self) -> Result<Option<E>, SubscriptionError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(SubscriptionError::Closed),
        }
    }

    /// Drain every remaining event until the topic closes.
    pub async fn collect(mut self) -> Vec<E> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            events.push(event);
        }
        events
    }

    /// Convert into a `Stream` for use with stream combinators.
    #[must_use]
    pub fn into_stream(self) -> EventStream<E> {
        EventStream { subscription: self }
    }
}

/// A stream wrapper for subscriptions.
///
/// Implements `tokio_stream::Stream`; the stream ends when the topic closes.
pub struct EventStream<E> {
    subscription: TopicSubscription<E>,
}

impl<E> Stream for EventStream<E> {
    type Item = E;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.subscription.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_subscription_recv() {
        let (sink, mut sub) = topic_channel::<u32>();
        assert!(sink.send(7));

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("event");
        assert_eq!(received, 7);
    }

    #[tokio::test]
    async fn test_dropping_sink_ends_subscription() {
        let (sink, mut sub) = topic_channel::<u32>();
        sink.send(1);
        drop(sink);

        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn test_try_recv_states() {
        let (sink, mut sub) = topic_channel::<&str>();
        assert_eq!(sub.try_recv(), Ok(None));

        sink.send("queued");
        assert_eq!(sub.try_recv(), Ok(Some("queued")));

        drop(sink);
        assert_eq!(sub.try_recv(), Err(SubscriptionError::Closed));
    }

    #[test]
    fn test_sink_reports_dropped_subscriber() {
        let (sink, sub) = topic_channel::<u8>();
        assert!(!sink.is_closed());
        drop(sub);
        assert!(sink.is_closed());
        assert!(!sink.send(1));
    }

    #[tokio::test]
    async fn test_event_stream_ends_on_close() {
        let (sink, sub) = topic_channel::<u32>();
        sink.send(1);
        sink.send(2);
        drop(sink);

        let events: Vec<u32> = sub.into_stream().collect().await;
        assert_eq!(events, vec![1, 2]);
    }
}
