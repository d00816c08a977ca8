//! # Credential Lifecycle
//!
//! Create, rotate and delete database credentials. One [`CredentialBackend`]
//! exists per credential API generation; [`build_backend`] picks it from the
//! configuration's [`CredentialApi`].

pub mod access;
pub mod direct;
pub mod v3;
pub mod v4;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Span;

use crate::config::{ConnectionConfig, CredentialApi};
use crate::connection::Cluster;
use crate::errors::{Error, Result};
use crate::secrets::{Redactor, SecretString};

pub use access::{access_entries, DEFAULT_ACCESS_STATEMENT};
pub use direct::SecurityManagerBackend;
pub use v3::SignedApiBackend;
pub use v4::ClusterUsersBackend;

/// The plugin's own credential after a root rotation.
///
/// The caller must store it; the old value no longer works.
#[derive(Debug, Clone, PartialEq)]
pub enum RotatedRoot {
    /// New API secret key
    SecretKey(SecretString),
    /// New direct-connection administrator password
    AdminPassword(SecretString),
}

#[async_trait]
pub trait CredentialBackend: Send + Sync {
    fn api(&self) -> CredentialApi;

    /// Create `username` with `password`, granting the first access statement
    /// or the default read-only policy.
    async fn create_user(
        &self,
        username: &str,
        password: &SecretString,
        statement: Option<&str>,
    ) -> Result<()>;

    /// Change a password. Returns the new root credential when `username` is
    /// the plugin's own account.
    async fn rotate_credential(
        &self,
        username: &str,
        new_password: &SecretString,
    ) -> Result<Option<RotatedRoot>>;

    async fn delete_user(&self, username: &str) -> Result<()>;
}

/// Backend for the configured API generation.
///
/// `cluster` is required by, and only used for, the security-manager backend.
pub fn build_backend(
    config: &ConnectionConfig,
    cluster: Option<Arc<dyn Cluster>>,
    span: Span,
) -> Result<Box<dyn CredentialBackend>> {
    match config.credential_api {
        CredentialApi::V4 => Ok(Box::new(ClusterUsersBackend::new(config, span)?)),
        CredentialApi::V3 => Ok(Box::new(SignedApiBackend::new(config, span)?)),
        CredentialApi::SecurityManager => {
            let cluster = cluster.ok_or(Error::NotInitialized)?;
            Ok(Box::new(SecurityManagerBackend::new(config, cluster, span)))
        }
    }
}

/// Remote error for an unexpected status, body scrubbed of `redactor`'s secrets.
pub(crate) async fn remote_error(
    operation: &str,
    endpoint: &str,
    response: reqwest::Response,
    redactor: &Redactor,
    payload: Option<&str>,
) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let detail = match payload {
        Some(payload) => format!("{}, payload = {}", body, payload),
        None => body,
    };
    Error::remote(operation, status, endpoint, redactor.apply(&detail))
}
