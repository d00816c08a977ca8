use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rustls::pki_types::{pem::PemObject, CertificateDer};
use rustls::RootCertStore;

use super::ConnectionConfig;
use crate::errors::TlsError;

/// TLS material for the direct cluster connection.
#[derive(Debug, Clone)]
pub struct ClusterTlsConfig {
    pub roots: Arc<RootCertStore>,
    pub skip_verify: bool,
}

impl ClusterTlsConfig {
    /// Decode the configured root certificate, if TLS is enabled.
    pub fn from_connection_config(config: &ConnectionConfig) -> Result<Option<Self>, TlsError> {
        if !config.tls {
            return Ok(None);
        }

        let roots = root_store_from_base64(&config.base64_pem)?;
        Ok(Some(Self { roots: Arc::new(roots), skip_verify: config.insecure_tls }))
    }

    /// Build a rustls client configuration trusting only the decoded roots.
    pub fn client_config(&self) -> Result<rustls::ClientConfig, TlsError> {
        let provider = rustls::crypto::ring::default_provider();
        let config = rustls::ClientConfig::builder_with_provider(provider.into())
            .with_safe_default_protocol_versions()
            .map_err(|e| TlsError::ClientConfig { message: e.to_string() })?
            .with_root_certificates(self.roots.clone())
            .with_no_client_auth();
        Ok(config)
    }
}

/// Decode a base64 PEM bundle into a root certificate store.
pub fn root_store_from_base64(encoded: &str) -> Result<RootCertStore, TlsError> {
    if encoded.trim().is_empty() {
        return Err(TlsError::MissingCertificate);
    }

    let pem = STANDARD
        .decode(encoded.trim())
        .map_err(|e| TlsError::InvalidBase64 { message: e.to_string() })?;

    let certs: Vec<CertificateDer<'static>> = CertificateDer::pem_slice_iter(&pem)
        .collect::<Result<_, _>>()
        .map_err(|e| TlsError::InvalidCertificatePem { message: e.to_string() })?;

    if certs.is_empty() {
        return Err(TlsError::EmptyCertificateChain);
    }

    let mut store = RootCertStore::empty();
    let (added, ignored) = store.add_parsable_certificates(certs);
    if added == 0 {
        return Err(TlsError::TrustStore {
            message: format!("{} certificate(s) could not be parsed", ignored),
        });
    }

    Ok(store)
}
