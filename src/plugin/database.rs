//! The credential plugin the secrets host drives.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, Instrument, Span};

use super::requests::{
    DeleteUserRequest, DeleteUserResponse, InitializeRequest, InitializeResponse, NewUserRequest,
    NewUserResponse, RawConfig, UpdateUserRequest, UpdateUserResponse,
};
use super::username::UsernameProducer;
use crate::config::ConnectionConfig;
use crate::connection::{ClusterConnector, ConnectionProducer, ManagementConnector};
use crate::errors::Result;
use crate::lifecycle::{build_backend, RotatedRoot};
use crate::observability::plugin_span;
use crate::secrets::{Redactor, SecretString};

/// Plugin type reported to the host.
pub const PLUGIN_TYPE: &str = "couchbasecapella";

/// Couchbase Capella database credential plugin.
///
/// Configuration and the cached cluster connection live in one
/// [`ConnectionProducer`] behind a single lock. Every error returned from
/// here has been scrubbed of configured secrets and of the password in flight.
#[derive(Debug)]
pub struct CapellaDatabase {
    producer: ConnectionProducer,
    usernames: RwLock<UsernameProducer>,
    span: Span,
}

impl Default for CapellaDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl CapellaDatabase {
    pub fn new() -> Self {
        Self::with_connector(Arc::new(ManagementConnector::new()), plugin_span(PLUGIN_TYPE))
    }

    pub fn with_connector(connector: Arc<dyn ClusterConnector>, span: Span) -> Self {
        Self {
            producer: ConnectionProducer::new(connector, span.clone()),
            usernames: RwLock::new(UsernameProducer::default()),
            span,
        }
    }

    pub fn type_name(&self) -> &'static str {
        PLUGIN_TYPE
    }

    pub fn producer(&self) -> &ConnectionProducer {
        &self.producer
    }

    pub async fn initialize(&self, request: InitializeRequest) -> Result<InitializeResponse> {
        let redactor = raw_redactor(&request.config);
        let span = crate::operation_span!(self.span, "initialize");
        let result: Result<InitializeResponse> = async {
            let template = request
                .config
                .get("username_template")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let usernames = UsernameProducer::new(template)?;

            let config = ConnectionConfig::from_raw(&request.config)?;
            self.producer.initialize(config, request.verify_connection).await?;
            *self.usernames.write().await = usernames;

            info!(verify_connection = request.verify_connection, "Plugin initialized");
            Ok(InitializeResponse { config: request.config.clone() })
        }
        .instrument(span)
        .await;

        result.map_err(|e| e.redact(&redactor))
    }

    /// Create a credential.
    ///
    /// Holds the producer's read lock for the whole call, so a concurrent root
    /// rotation waits until this request has finished with the current secret.
    pub async fn new_user(&self, request: NewUserRequest) -> Result<NewUserResponse> {
        let (core, cluster) = self.producer.read_for_operation().await?;
        let config = core.config()?;
        let redactor = config.redactor().secret(request.password.expose_secret(), "[password]");

        let result: Result<NewUserResponse> = async {
            let username = self.usernames.read().await.generate(&request.username_config).to_uppercase();
            let statements = request.statements.non_empty();
            if request.expiration.is_some() {
                debug!("Credential expiration is not enforced by the control plane");
            }

            let backend = build_backend(config, cluster, self.span.clone())?;
            backend.create_user(&username, &request.password, statements.first().copied()).await?;
            Ok(NewUserResponse { username })
        }
        .await;

        result.map_err(|e| e.redact(&redactor))
    }

    /// Change a password; a no-op when the request carries none.
    ///
    /// Runs under the producer's write lock so a root rotation's new secret is
    /// stored before any other operation reads the configuration.
    pub async fn update_user(&self, request: UpdateUserRequest) -> Result<UpdateUserResponse> {
        let Some(change) = request.password else {
            debug!(parent: &self.span, username = %request.username, "No password change requested");
            return Ok(UpdateUserResponse::default());
        };

        let mut core = self.producer.write().await;
        let config = core.config()?.clone();
        let redactor = config.redactor().secret(change.new_password.expose_secret(), "[password]");

        let result: Result<UpdateUserResponse> = async {
            let cluster = if config.needs_direct_connection() {
                Some(core.connection(None).await?)
            } else {
                None
            };
            let backend = build_backend(&config, cluster, self.span.clone())?;
            let rotated = backend.rotate_credential(&request.username, &change.new_password).await?;

            match &rotated {
                Some(RotatedRoot::SecretKey(secret)) => {
                    core.config_mut()?.secret_key = secret.clone();
                    info!(parent: &self.span, "Stored rotated API secret key");
                }
                Some(RotatedRoot::AdminPassword(password)) => {
                    core.config_mut()?.password = password.clone();
                    // the cached connection still authenticates with the old password
                    core.close().await?;
                    info!(parent: &self.span, "Stored rotated administrator password");
                }
                None => {}
            }
            Ok(UpdateUserResponse { rotated_root: rotated })
        }
        .await;

        result.map_err(|e| e.redact(&redactor))
    }

    pub async fn delete_user(&self, request: DeleteUserRequest) -> Result<DeleteUserResponse> {
        let (core, cluster) = self.producer.read_for_operation().await?;
        let config = core.config()?;
        let redactor = config.redactor();

        let result: Result<DeleteUserResponse> = async {
            let backend = build_backend(config, cluster, self.span.clone())?;
            backend.delete_user(&request.username).await?;
            Ok(DeleteUserResponse {})
        }
        .await;

        result.map_err(|e| e.redact(&redactor))
    }

    /// Close the cached connection, if any.
    pub async fn close(&self) -> Result<()> {
        self.producer.close().await
    }
}

/// Scrubs secrets from a configuration map that may not decode.
fn raw_redactor(raw: &RawConfig) -> Redactor {
    let value = |key: &str| raw.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string();
    Redactor::new()
        .secret(value("secret_key"), "[secret_key]")
        .secret(value("password"), "[password]")
        .secret(value("username"), "[username]")
}

/// Store a rotated secret in a raw configuration map, for hosts that persist it.
pub fn apply_rotated_root(raw: &mut RawConfig, rotated: &RotatedRoot) {
    let (key, value): (&str, &SecretString) = match rotated {
        RotatedRoot::SecretKey(secret) => ("secret_key", secret),
        RotatedRoot::AdminPassword(password) => ("password", password),
    };
    raw.insert(key.to_string(), serde_json::Value::String(value.expose_secret().to_string()));
}
