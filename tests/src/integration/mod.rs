//! Integration flows across bx-message-queue, shared-bus and shared-types.

pub mod batching;
pub mod flows;

#[cfg(test)]
mod support;
