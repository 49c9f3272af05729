//! FIFO of pending message builders.
//!
//! Producers only ever mutate the tail; the worker only ever removes the
//! head. Every access goes through the queue's mutex, so the rules below are
//! plain sequential code.

use shared_types::RequestId;
use std::collections::VecDeque;
use tracing::{info_span, Span};

use super::builder::MessageBuilder;
use super::config::MAX_BLOCK_SIZE;
use super::metadata::Topic;
use crate::events::MessageQueueError;

#[derive(Debug)]
pub(crate) struct BuilderQueue {
    builders: VecDeque<MessageBuilder>,
    /// `None` once every topic has been handed out.
    next_topic: Option<Topic>,
    closed: bool,
}

impl Default for BuilderQueue {
    fn default() -> Self {
        Self {
            builders: VecDeque::new(),
            next_topic: Some(Topic::default()),
            closed: false,
        }
    }
}

impl BuilderQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Apply `build` to the tail builder, first appending a new one when
    /// the batching rule asks for it.
    ///
    /// Returns true if the tail holds something to send afterwards. Fails
    /// without running `build` when a new message is needed but no topic is
    /// left.
    pub(crate) fn build_message<F>(
        &mut self,
        size: u64,
        parent: &Span,
        build: F,
    ) -> Result<bool, MessageQueueError>
    where
        F: FnOnce(&mut MessageBuilder),
    {
        if should_begin_new_message(self.builders.back(), size) {
            let topic = self.next_topic.ok_or(MessageQueueError::TopicsExhausted)?;
            self.next_topic = topic.next();
            let span = info_span!(
                parent: parent,
                "message",
                topic = topic.as_u64(),
                error = tracing::field::Empty,
                otel.status_code = tracing::field::Empty,
            );
            self.builders.push_back(MessageBuilder::new(topic, span));
        }

        Ok(match self.builders.back_mut() {
            Some(tail) => {
                build(tail);
                !tail.is_empty()
            }
            None => false,
        })
    }

    pub(crate) fn pop_front(&mut self) -> Option<MessageBuilder> {
        self.builders.pop_front()
    }

    /// Scrub `request_ids` from every builder, dropping builders left
    /// empty. Returns the total block bytes freed.
    pub(crate) fn scrub_responses(&mut self, request_ids: &[RequestId]) -> u64 {
        let mut freed = 0;
        self.builders.retain_mut(|builder| {
            freed += builder.scrub_responses(request_ids);
            !builder.is_empty()
        });
        freed
    }

    pub(crate) fn len(&self) -> usize {
        self.builders.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Refuse further mutation and hand back whatever is still queued.
    pub(crate) fn close(&mut self) -> VecDeque<MessageBuilder> {
        self.closed = true;
        std::mem::take(&mut self.builders)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Batching rule.
///
/// A new message is begun when none is pending, or when a nonzero `size`
/// would push the tail past [`MAX_BLOCK_SIZE`]. Zero-size mutations always
/// join the tail, and a single oversized block still gets a message of its
/// own.
pub(crate) fn should_begin_new_message(tail: Option<&MessageBuilder>, size: u64) -> bool {
    match tail {
        None => true,
        Some(tail) => size > 0 && tail.block_size() + size > MAX_BLOCK_SIZE,
    }
}
