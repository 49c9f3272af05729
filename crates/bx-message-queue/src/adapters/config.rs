//! Configuration providers.

use crate::domain::{AllocatorConfig, MessageQueueConfig};
use crate::ports::outbound::ConfigProvider;

/// Static configuration provider.
///
/// Useful for tests and embedding. For file-based config, use `TomlConfigProvider`.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    queue: MessageQueueConfig,
    allocator: AllocatorConfig,
}

impl StaticConfigProvider {
    /// Create with default configs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_queue_config(mut self, queue: MessageQueueConfig) -> Self {
        self.queue = queue;
        self
    }

    #[must_use]
    pub fn with_allocator_config(mut self, allocator: AllocatorConfig) -> Self {
        self.allocator = allocator;
        self
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn message_queue_config(&self) -> MessageQueueConfig {
        self.queue
    }

    fn allocator_config(&self) -> AllocatorConfig {
        self.allocator
    }
}

// ============================================================================
// TomlConfigProvider - file config loading (requires "toml-config" feature)
// ============================================================================

#[cfg(feature = "toml-config")]
mod toml_config {
    use super::*;
    use crate::domain::ConfigError;
    use serde::Deserialize;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    /// Configuration file structure.
    #[derive(Debug, Deserialize)]
    struct ConfigFile {
        #[serde(default)]
        message_queue: MessageQueueConfigFile,
        #[serde(default)]
        allocator: AllocatorConfigFile,
    }

    #[derive(Debug, Deserialize, Default)]
    struct MessageQueueConfigFile {
        max_retries: Option<u32>,
        send_timeout_ms: Option<u64>,
        send_error_backoff_ms: Option<u64>,
    }

    #[derive(Debug, Deserialize, Default)]
    struct AllocatorConfigFile {
        max_total_bytes: Option<u64>,
        max_per_peer_bytes: Option<u64>,
    }

    /// TOML-based configuration provider.
    ///
    /// # Config File Format
    ///
    /// ```toml
    /// [message_queue]
    /// max_retries = 10
    /// send_timeout_ms = 600000
    /// send_error_backoff_ms = 100
    ///
    /// [allocator]
    /// max_total_bytes = 268435456
    /// max_per_peer_bytes = 16777216
    /// ```
    ///
    /// Missing keys fall back to defaults. Both sections are validated.
    #[derive(Debug, Clone)]
    pub struct TomlConfigProvider {
        queue: MessageQueueConfig,
        allocator: AllocatorConfig,
    }

    impl TomlConfigProvider {
        /// Load configuration from a TOML file.
        ///
        /// # Errors
        ///
        /// Returns error if the file cannot be read, parsed or validated.
        pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
            let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
                path: path.as_ref().display().to_string(),
                error: e.to_string(),
            })?;

            Self::parse(&content)
        }

        /// Parse configuration from a TOML string.
        pub fn parse(content: &str) -> Result<Self, ConfigError> {
            let file: ConfigFile =
                toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

            let defaults = MessageQueueConfig::default();
            let mq = file.message_queue;
            let queue = MessageQueueConfig {
                max_retries: mq.max_retries.unwrap_or(defaults.max_retries),
                send_timeout: mq
                    .send_timeout_ms
                    .map_or(defaults.send_timeout, Duration::from_millis),
                send_error_backoff: mq
                    .send_error_backoff_ms
                    .map_or(defaults.send_error_backoff, Duration::from_millis),
            };
            queue.validate()?;

            let defaults = AllocatorConfig::default();
            let ac = file.allocator;
            let allocator = AllocatorConfig {
                max_total_bytes: ac.max_total_bytes.unwrap_or(defaults.max_total_bytes),
                max_per_peer_bytes: ac.max_per_peer_bytes.unwrap_or(defaults.max_per_peer_bytes),
            };
            allocator.validate()?;

            Ok(Self { queue, allocator })
        }
    }

    impl ConfigProvider for TomlConfigProvider {
        fn message_queue_config(&self) -> MessageQueueConfig {
            self.queue
        }

        fn allocator_config(&self) -> AllocatorConfig {
            self.allocator
        }
    }
}

#[cfg(feature = "toml-config")]
pub use toml_config::TomlConfigProvider;
