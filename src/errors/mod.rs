//! # Error Handling
//!
//! Error types for the credential plugin, built with `thiserror`.
//! Lower layers return these unchanged; the host facade scrubs secrets from
//! them before they are handed back to the caller.

pub mod tls;
pub mod types;

pub use tls::TlsError;
pub use types::{Error, Result};
