use thiserror::Error;

use crate::secrets::Redactor;

/// TLS-specific error variants surfaced while building the cluster trust store.
#[derive(Debug, Error)]
pub enum TlsError {
    /// TLS has been enabled but no certificate was supplied.
    #[error("TLS is enabled but base64pem is not configured")]
    MissingCertificate,

    /// The configured certificate is not valid base64.
    #[error("Error decoding base64pem: {message}")]
    InvalidBase64 { message: String },

    /// The decoded certificate contained no PEM certificate blocks.
    #[error("Failed to parse root certificate: no certificates found")]
    EmptyCertificateChain,

    /// The decoded PEM contents were invalid or unreadable.
    #[error("Failed to parse root certificate: {message}")]
    InvalidCertificatePem { message: String },

    /// None of the parsed certificates could be used as a trust anchor.
    #[error("Failed to add root certificate to trust store: {message}")]
    TrustStore { message: String },

    /// The TLS client configuration could not be assembled.
    #[error("Failed to build TLS client configuration: {message}")]
    ClientConfig { message: String },
}

impl TlsError {
    pub(crate) fn redact(self, redactor: &Redactor) -> Self {
        match self {
            Self::InvalidBase64 { message } => Self::InvalidBase64 { message: redactor.apply(&message) },
            Self::InvalidCertificatePem { message } => {
                Self::InvalidCertificatePem { message: redactor.apply(&message) }
            }
            Self::TrustStore { message } => Self::TrustStore { message: redactor.apply(&message) },
            Self::ClientConfig { message } => Self::ClientConfig { message: redactor.apply(&message) },
            other => other,
        }
    }
}
