//! # Error Types
//!
//! Error taxonomy for credential lifecycle operations using `thiserror`.
//!
//! Every variant carries plain strings so that the whole error can be passed
//! through a [`Redactor`] before it leaves the plugin boundary.

use crate::secrets::Redactor;

use super::tls::TlsError;

/// Custom result type for plugin operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the credential plugin
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Bad or missing configuration / request fields
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Configuration could not be loaded or decoded
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// An operation was attempted before `initialize`
    #[error("Connection producer is not initialized")]
    NotInitialized,

    /// A request body could not be serialized
    #[error("Failed to encode request body: {message}")]
    Encoding { message: String },

    /// A request could not be constructed
    #[error("Failed to build request for {endpoint}: {message}")]
    RequestBuild { endpoint: String, message: String },

    /// Network-level failure talking to a remote endpoint
    #[error("Transport error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// A listing request used for identifier resolution returned a non-OK status
    #[error("User lookup failed with status {status} at {endpoint}")]
    Lookup { status: u16, endpoint: String },

    /// The control plane answered with a non-success status
    #[error("{operation} failed with status {status} at {endpoint}: {body}")]
    Remote { operation: String, status: u16, endpoint: String, body: String },

    /// A response body was not the JSON shape we expected
    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// The username has no resolvable identifier
    #[error("No database credential found for user '{username}'")]
    NotFound { username: String },

    /// The access statement is not the expected JSON document
    #[error("Malformed access policy: {reason}")]
    MalformedAccessPolicy { reason: String },

    /// Certificate material could not be turned into a trust store
    #[error(transparent)]
    Tls(#[from] TlsError),

    /// Direct protocol connection failures
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// A bounded wait ran out of time
    #[error("Operation timed out: {operation} after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// The selected credential API cannot perform the operation
    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },
}

impl Error {
    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an encoding error
    pub fn encoding<S: Into<String>>(message: S) -> Self {
        Self::Encoding { message: message.into() }
    }

    /// Create a request construction error
    pub fn request_build<E: Into<String>, S: Into<String>>(endpoint: E, message: S) -> Self {
        Self::RequestBuild { endpoint: endpoint.into(), message: message.into() }
    }

    /// Create a transport error
    pub fn transport<E: Into<String>, S: Into<String>>(endpoint: E, message: S) -> Self {
        Self::Transport { endpoint: endpoint.into(), message: message.into() }
    }

    /// Create a lookup error
    pub fn lookup<E: Into<String>>(status: u16, endpoint: E) -> Self {
        Self::Lookup { status, endpoint: endpoint.into() }
    }

    /// Create a remote error
    pub fn remote<O, E, B>(operation: O, status: u16, endpoint: E, body: B) -> Self
    where
        O: Into<String>,
        E: Into<String>,
        B: Into<String>,
    {
        Self::Remote {
            operation: operation.into(),
            status,
            endpoint: endpoint.into(),
            body: body.into(),
        }
    }

    /// Create a decode error
    pub fn decode<E: Into<String>, S: Into<String>>(endpoint: E, message: S) -> Self {
        Self::Decode { endpoint: endpoint.into(), message: message.into() }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(username: S) -> Self {
        Self::NotFound { username: username.into() }
    }

    /// Create a malformed access policy error
    pub fn malformed_policy<S: Into<String>>(reason: S) -> Self {
        Self::MalformedAccessPolicy { reason: reason.into() }
    }

    /// Create a connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection { message: message.into() }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration_ms: u64) -> Self {
        Self::Timeout { operation: operation.into(), duration_ms }
    }

    /// Create an unsupported operation error
    pub fn unsupported<S: Into<String>>(message: S) -> Self {
        Self::Unsupported { message: message.into() }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Scrub every known secret out of the error's text fields.
    pub fn redact(self, redactor: &Redactor) -> Self {
        let r = |s: String| redactor.apply(&s);
        match self {
            Self::Validation { message, field } => Self::Validation { message: r(message), field },
            Self::Config { message } => Self::Config { message: r(message) },
            Self::NotInitialized => Self::NotInitialized,
            Self::Encoding { message } => Self::Encoding { message: r(message) },
            Self::RequestBuild { endpoint, message } => {
                Self::RequestBuild { endpoint: r(endpoint), message: r(message) }
            }
            Self::Transport { endpoint, message } => {
                Self::Transport { endpoint: r(endpoint), message: r(message) }
            }
            Self::Lookup { status, endpoint } => Self::Lookup { status, endpoint: r(endpoint) },
            Self::Remote { operation, status, endpoint, body } => {
                Self::Remote { operation, status, endpoint: r(endpoint), body: r(body) }
            }
            Self::Decode { endpoint, message } => {
                Self::Decode { endpoint: r(endpoint), message: r(message) }
            }
            Self::NotFound { username } => Self::NotFound { username: r(username) },
            Self::MalformedAccessPolicy { reason } => Self::MalformedAccessPolicy { reason: r(reason) },
            Self::Tls(e) => Self::Tls(e.redact(redactor)),
            Self::Connection { message } => Self::Connection { message: r(message) },
            Self::Timeout { operation, duration_ms } => Self::Timeout { operation, duration_ms },
            Self::Unsupported { message } => Self::Unsupported { message: r(message) },
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Self::config(format!("Configuration loading failed: {}", error))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let field = fields.first().map(|(f, _)| f.to_string());
        let message = fields
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::Validation { message, field }
    }
}
