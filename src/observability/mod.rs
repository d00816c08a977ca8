//! # Observability
//!
//! Structured logging for the plugin. Spans are passed to components as
//! explicit constructor arguments; see [`logging`].

pub mod logging;

pub use logging::{init_logging, plugin_span};
