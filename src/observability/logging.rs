//! # Structured Logging
//!
//! Subscriber setup for the binary and span helpers for the library.
//!
//! Library components never install a subscriber and never log through a
//! global handle of their own: each one is constructed with a parent
//! [`tracing::Span`] and opens its per-operation spans underneath it.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::errors::{Error, Result};

/// Create a child span for one credential operation.
///
/// ```rust,ignore
/// let span = operation_span!(self.span, "delete_user", username = %username);
/// ```
#[macro_export]
macro_rules! operation_span {
    ($parent:expr, $operation:expr) => {
        tracing::info_span!(
            parent: &$parent,
            "credential_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($parent:expr, $operation:expr, $($field:tt)*) => {
        tracing::info_span!(
            parent: &$parent,
            "credential_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a span for one outbound HTTP request.
#[macro_export]
macro_rules! request_span {
    ($parent:expr, $method:expr, $path:expr) => {
        tracing::debug_span!(
            parent: &$parent,
            "http_request",
            method = %$method,
            path = %$path,
            status = tracing::field::Empty
        )
    };
}

/// Install the global subscriber for the binary.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| Error::config(format!("Invalid log level '{}': {}", config.log_level, e)))?;

    let result = if config.json {
        fmt().json().with_env_filter(filter).with_current_span(true).try_init()
    } else {
        fmt().with_env_filter(filter).with_target(false).try_init()
    };

    result.map_err(|e| Error::config(format!("Failed to install log subscriber: {}", e)))
}

/// Root span for a plugin instance; components hang their spans off it.
pub fn plugin_span(plugin_type: &str) -> tracing::Span {
    tracing::info_span!("plugin", plugin_type = %plugin_type, instance_id = %uuid::Uuid::new_v4())
}
