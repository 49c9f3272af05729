//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and tracing output.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Component identifier (e.g. "message-queue")
    pub component: String,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "block-exchange".to_string(),
            component: String::new(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OTEL_SERVICE_NAME`: Service name (default: block-exchange)
    /// - `BX_COMPONENT`: Component name (default: empty)
    /// - `BX_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `BX_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `BX_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let in_container = env::var_os("KUBERNETES_SERVICE_HOST").is_some()
            || env::var_os("DOCKER_CONTAINER").is_some();

        Self {
            service_name: env::var("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),
            component: env::var("BX_COMPONENT").unwrap_or(defaults.component),
            log_level: env::var("BX_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),
            console_output: env_flag("BX_CONSOLE_OUTPUT").unwrap_or(defaults.console_output),
            json_logs: env_flag("BX_JSON_LOGS").unwrap_or(in_container),
        }
    }

    /// Create configuration for a specific component.
    pub fn for_component(component: &str) -> Self {
        let mut config = Self::from_env();
        config.component = component.to_string();
        config
    }

    /// Get the full service name including the component.
    pub fn full_service_name(&self) -> String {
        if self.component.is_empty() {
            self.service_name.clone()
        } else {
            format!("{}-{}", self.service_name, self.component)
        }
    }
}

/// Read a boolean switch. Unset or unrecognised values yield `None`.
fn env_flag(name: &str) -> Option<bool> {
    parse_flag(&env::var(name).ok()?)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
