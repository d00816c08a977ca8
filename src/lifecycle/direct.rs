//! User management through the cluster's own security manager.
//!
//! Works on an open [`Cluster`] connection and never calls the control plane.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, Instrument, Span};

use super::{access_entries, CredentialBackend, RotatedRoot};
use crate::config::{ConnectionConfig, CredentialApi};
use crate::connection::{Cluster, User, UserRole};
use crate::errors::{Error, Result};
use crate::secrets::{Redactor, SecretString};

#[derive(Debug, Clone)]
pub struct SecurityManagerBackend {
    cluster: Arc<dyn Cluster>,
    admin_username: String,
    default_role: UserRole,
    redactor: Redactor,
    span: Span,
}

impl SecurityManagerBackend {
    pub fn new(config: &ConnectionConfig, cluster: Arc<dyn Cluster>, span: Span) -> Self {
        let default_role =
            UserRole::new(&config.access_role).on_bucket(config.bucket().unwrap_or("*"));
        Self {
            cluster,
            admin_username: config.username.clone(),
            default_role,
            redactor: config.redactor(),
            span,
        }
    }

    /// Roles for a statement: one per privilege per bucket resource.
    fn roles(&self, statement: Option<&str>) -> Result<Vec<UserRole>> {
        if statement.map_or(true, |s| s.trim().is_empty()) {
            return Ok(vec![self.default_role.clone()]);
        }

        let access = access_entries(statement)?;
        let mut roles = Vec::new();
        for entry in access.as_array().into_iter().flatten() {
            let privileges = entry.get("privileges").and_then(Value::as_array);
            let buckets = entry.pointer("/resources/buckets").and_then(Value::as_array);
            for privilege in privileges.into_iter().flatten().filter_map(Value::as_str) {
                for bucket in buckets.into_iter().flatten() {
                    let mut role = UserRole::new(privilege)
                        .on_bucket(bucket.get("name").and_then(Value::as_str).unwrap_or("*"));
                    role.scope_name =
                        bucket.pointer("/scopes/0/name").and_then(Value::as_str).map(str::to_string);
                    roles.push(role);
                }
            }
        }

        if roles.is_empty() {
            return Err(Error::malformed_policy("access statement grants no bucket privileges"));
        }
        Ok(roles)
    }
}

#[async_trait]
impl CredentialBackend for SecurityManagerBackend {
    fn api(&self) -> CredentialApi {
        CredentialApi::SecurityManager
    }

    async fn create_user(
        &self,
        username: &str,
        password: &SecretString,
        statement: Option<&str>,
    ) -> Result<()> {
        let span = crate::operation_span!(self.span, "create_user", username = %username);
        async move {
            let user = User {
                username: username.to_string(),
                display_name: username.to_string(),
                password: Some(password.clone()),
                roles: self.roles(statement)?,
                groups: Vec::new(),
            };
            let redactor = self.redactor.clone().secret(password.expose_secret(), "[password]");
            self.cluster.upsert_user(&user).await.map_err(|e| e.redact(&redactor))?;
            info!(roles = user.roles.len(), "Cluster user created");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Read the user, replace only its password, and write the full record back.
    async fn rotate_credential(
        &self,
        username: &str,
        new_password: &SecretString,
    ) -> Result<Option<RotatedRoot>> {
        let span = crate::operation_span!(self.span, "rotate_credential", username = %username);
        async move {
            let mut user = self.cluster.get_user(username).await?;
            user.password = Some(new_password.clone());

            let redactor = self.redactor.clone().secret(new_password.expose_secret(), "[password]");
            self.cluster.upsert_user(&user).await.map_err(|e| e.redact(&redactor))?;
            info!("Cluster user password changed");

            if username == self.admin_username {
                return Ok(Some(RotatedRoot::AdminPassword(new_password.clone())));
            }
            Ok(None)
        }
        .instrument(span)
        .await
    }

    async fn delete_user(&self, username: &str) -> Result<()> {
        let span = crate::operation_span!(self.span, "delete_user", username = %username);
        async move {
            self.cluster.drop_user(username).await?;
            info!("Cluster user dropped");
            Ok(())
        }
        .instrument(span)
        .await
    }
}
