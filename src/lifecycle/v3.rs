//! Legacy HMAC-signed public API.
//!
//! Users are created with per-bucket grants instead of an access document.
//! A supplied statement is translated into grants; without one the
//! configured bucket, scope and access role are granted.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{info, Instrument, Span};

use super::{access_entries, remote_error, CredentialBackend, RotatedRoot};
use crate::config::{ConnectionConfig, CredentialApi};
use crate::control_plane::models::{BucketAccess, CreateLegacyUserRequest, UpdatePasswordRequest};
use crate::control_plane::{resolve_user_id, ApiClient};
use crate::errors::{Error, Result};
use crate::secrets::{Redactor, SecretString};

const ALL_BUCKETS: &str = "*";

#[derive(Debug, Clone)]
pub struct SignedApiBackend {
    client: ApiClient,
    credentials_path: String,
    access_key: String,
    default_grant: BucketAccess,
    redactor: Redactor,
    span: Span,
}

impl SignedApiBackend {
    pub fn new(config: &ConnectionConfig, span: Span) -> Result<Self> {
        let client = ApiClient::signed(
            &config.cloud_api_base_url,
            &config.access_key,
            config.secret_key.clone(),
            config.request_timeout(),
            span.clone(),
        )?;
        let default_grant = BucketAccess {
            name: config.bucket().unwrap_or(ALL_BUCKETS).to_string(),
            scope: config.scope_name.clone(),
            access: config.access_role.clone(),
        };
        Ok(Self {
            client,
            credentials_path: config.credentials_path(),
            access_key: config.access_key.clone(),
            default_grant,
            redactor: config.redactor(),
            span,
        })
    }

    fn users_path(&self) -> String {
        format!("{}/users", self.credentials_path)
    }

    /// Bucket grants for a statement: one per privilege per bucket resource.
    fn grants(&self, statement: Option<&str>) -> Result<Vec<BucketAccess>> {
        if statement.map_or(true, |s| s.trim().is_empty()) {
            return Ok(vec![self.default_grant.clone()]);
        }

        let access = access_entries(statement)?;
        let mut grants = Vec::new();
        for entry in access.as_array().into_iter().flatten() {
            let privileges = string_list(entry.get("privileges"));
            let buckets = entry
                .pointer("/resources/buckets")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for bucket in &buckets {
                let name = bucket.get("name").and_then(Value::as_str).unwrap_or(ALL_BUCKETS);
                let scope = bucket
                    .pointer("/scopes/0/name")
                    .and_then(Value::as_str)
                    .unwrap_or(self.default_grant.scope.as_str());
                for privilege in &privileges {
                    grants.push(BucketAccess {
                        name: name.to_string(),
                        scope: scope.to_string(),
                        access: privilege.clone(),
                    });
                }
            }
        }

        if grants.is_empty() {
            return Err(Error::malformed_policy("access statement grants no bucket privileges"));
        }
        Ok(grants)
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

#[async_trait]
impl CredentialBackend for SignedApiBackend {
    fn api(&self) -> CredentialApi {
        CredentialApi::V3
    }

    async fn create_user(
        &self,
        username: &str,
        password: &SecretString,
        statement: Option<&str>,
    ) -> Result<()> {
        let span = crate::operation_span!(self.span, "create_user", username = %username);
        async move {
            let buckets = self.grants(statement)?;
            let endpoint = self.users_path();

            let body = CreateLegacyUserRequest {
                username,
                password: password.expose_secret(),
                buckets: &buckets,
            };
            let response = self.client.send(Method::POST, &endpoint, Some(&body)).await?;
            if response.status() != StatusCode::CREATED {
                let echoed = serde_json::json!({
                    "username": username,
                    "password": "[password]",
                    "buckets": buckets,
                });
                let redactor = self.redactor.clone().secret(password.expose_secret(), "[password]");
                return Err(remote_error(
                    "create user",
                    &endpoint,
                    response,
                    &redactor,
                    Some(&echoed.to_string()),
                )
                .await);
            }

            info!(grants = buckets.len(), "Database credential created");
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn rotate_credential(
        &self,
        username: &str,
        new_password: &SecretString,
    ) -> Result<Option<RotatedRoot>> {
        if username == self.access_key {
            return Err(Error::unsupported(
                "API key rotation is not available on the signed API; use credential_api v4",
            ));
        }

        let span = crate::operation_span!(self.span, "rotate_credential", username = %username);
        async move {
            let id = resolve_user_id(&self.client, &self.credentials_path, username).await?;
            let endpoint = format!("{}/{}", self.users_path(), id);

            let body = UpdatePasswordRequest { password: new_password.expose_secret() };
            let response = self.client.send(Method::PUT, &endpoint, Some(&body)).await?;
            if response.status() != StatusCode::NO_CONTENT {
                let redactor = self.redactor.clone().secret(new_password.expose_secret(), "[password]");
                return Err(remote_error("update user", &endpoint, response, &redactor, None).await);
            }

            info!("Database credential password changed");
            Ok(None)
        }
        .instrument(span)
        .await
    }

    async fn delete_user(&self, username: &str) -> Result<()> {
        let span = crate::operation_span!(self.span, "delete_user", username = %username);
        async move {
            let id = resolve_user_id(&self.client, &self.credentials_path, username).await?;
            let endpoint = format!("{}/{}", self.users_path(), id);

            let response = self.client.send_empty(Method::DELETE, &endpoint).await?;
            if response.status() != StatusCode::NO_CONTENT {
                return Err(remote_error("delete user", &endpoint, response, &self.redactor, None).await);
            }

            info!("Database credential deleted");
            Ok(())
        }
        .instrument(span)
        .await
    }
}
