//! Queue and allocator configuration.

use std::time::Duration;

use crate::ports::outbound::MessageSenderOpts;

/// Maximum block payload batched into a single message (512 KiB).
pub const MAX_BLOCK_SIZE: u64 = 512 * 1024;

/// Per-peer queue configuration.
///
/// Every field is forwarded unchanged to the network when a sender is
/// opened; the queue itself never retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageQueueConfig {
    /// Send attempts before the transport gives up
    pub max_retries: u32,
    /// Timeout for a single send attempt
    pub send_timeout: Duration,
    /// Pause between failed attempts
    pub send_error_backoff: Duration,
}

impl Default for MessageQueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            send_timeout: Duration::from_secs(10 * 60),
            send_error_backoff: Duration::from_millis(100),
        }
    }
}

impl MessageQueueConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidLimit("max_retries cannot be 0".into()));
        }

        if self.send_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "send_timeout cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Options handed to the network when opening a sender.
    pub fn sender_opts(&self) -> MessageSenderOpts {
        MessageSenderOpts {
            max_retries: self.max_retries,
            send_timeout: self.send_timeout,
            send_error_backoff: self.send_error_backoff,
        }
    }
}

/// Memory budget for the reference allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Block bytes that may be reserved across all peers
    pub max_total_bytes: u64,
    /// Block bytes a single peer may hold
    pub max_per_peer_bytes: u64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_total_bytes: 256 * 1024 * 1024, // 256 MiB
            max_per_peer_bytes: 16 * 1024 * 1024, // 16 MiB
        }
    }
}

impl AllocatorConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_total_bytes == 0 || self.max_per_peer_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "memory limits cannot be 0".into(),
            ));
        }

        if self.max_per_peer_bytes > self.max_total_bytes {
            return Err(ConfigError::InvalidLimit(format!(
                "max_per_peer_bytes ({}) exceeds max_total_bytes ({})",
                self.max_per_peer_bytes, self.max_total_bytes
            )));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Config file could not be read
    #[error("failed to read {path}: {error}")]
    Io { path: String, error: String },
    /// Config file could not be parsed
    #[error("failed to parse config: {0}")]
    Parse(String),
}
