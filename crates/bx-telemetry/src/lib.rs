//! # Block-Exchange Telemetry
//!
//! Logging and tracing setup shared by the block-exchange crates.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bx_telemetry::{init_tracing, TelemetryConfig};
//!
//! let config = TelemetryConfig::for_component("message-queue");
//! let _guard = init_tracing(&config).expect("Failed to init tracing");
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `block-exchange` | Service name in logs |
//! | `BX_LOG_LEVEL` | `info` | Log level filter |
//! | `BX_JSON_LOGS` | `false` | JSON formatted output |
//! | `BX_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::{init_test_tracing, init_tracing, TracingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracerInit(String),
}
