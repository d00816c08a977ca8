//! Handling of credential material inside the plugin.
//!
//! - [`SecretString`] keeps passwords and API secrets out of logs and
//!   serialized output.
//! - [`Redactor`] scrubs secret values out of error text before it reaches the
//!   host.

pub mod redact;
pub mod types;

pub use redact::Redactor;
pub use types::SecretString;
