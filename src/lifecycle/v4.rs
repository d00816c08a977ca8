//! Per-cluster database users API, authenticated with a bearer token.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use tracing::{info, Instrument, Span};

use super::{access_entries, remote_error, CredentialBackend, RotatedRoot};
use crate::config::{ConnectionConfig, CredentialApi};
use crate::control_plane::models::{
    CreateUserRequest, RotateApiKeyRequest, RotateApiKeyResponse, UpdatePasswordRequest,
};
use crate::control_plane::{resolve_user_id, ApiClient};
use crate::errors::{Error, Result};
use crate::secrets::{Redactor, SecretString};

#[derive(Debug, Clone)]
pub struct ClusterUsersBackend {
    client: ApiClient,
    credentials_path: String,
    access_key: String,
    organization: Option<String>,
    redactor: Redactor,
    span: Span,
}

impl ClusterUsersBackend {
    pub fn new(config: &ConnectionConfig, span: Span) -> Result<Self> {
        let client = ApiClient::bearer(
            &config.cloud_api_base_url,
            config.secret_key.clone(),
            config.request_timeout(),
            span.clone(),
        )?;
        Ok(Self {
            client,
            credentials_path: config.credentials_path(),
            access_key: config.access_key.clone(),
            organization: config.organization().ok(),
            redactor: config.redactor(),
            span,
        })
    }

    fn users_path(&self) -> String {
        format!("{}/users", self.credentials_path)
    }

    async fn rotate_api_key(&self, new_secret: &SecretString) -> Result<RotatedRoot> {
        let organization = self.organization.as_deref().ok_or_else(|| {
            Error::validation_field(
                "organization could not be derived from cloud_api_clusters_path and organization_id is not set",
                "organization_id",
            )
        })?;
        let endpoint =
            format!("/organizations/{}/apikeys/{}/rotate", organization, self.access_key);
        let redactor = self.redactor.clone().secret(new_secret.expose_secret(), "[password]");

        let body = RotateApiKeyRequest { secret: new_secret.expose_secret() };
        let response = self.client.send(Method::POST, &endpoint, Some(&body)).await?;
        if response.status() != StatusCode::CREATED {
            return Err(remote_error("rotate API key", &endpoint, response, &redactor, None).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::transport(&endpoint, e.without_url().to_string()))?;
        let rotated: RotateApiKeyResponse = serde_json::from_slice(&bytes)
            .map_err(|e| Error::decode(&endpoint, redactor.apply(&e.to_string())))?;

        info!("API secret key rotated");
        Ok(RotatedRoot::SecretKey(SecretString::new(rotated.secret_key)))
    }

    async fn change_password(&self, username: &str, new_password: &SecretString) -> Result<()> {
        let id = resolve_user_id(&self.client, &self.credentials_path, username).await?;
        let endpoint = format!("{}/{}", self.users_path(), id);

        let body = UpdatePasswordRequest { password: new_password.expose_secret() };
        let response = self.client.send(Method::PUT, &endpoint, Some(&body)).await?;
        if response.status() != StatusCode::NO_CONTENT {
            let redactor = self.redactor.clone().secret(new_password.expose_secret(), "[password]");
            return Err(remote_error(
                "update user",
                &endpoint,
                response,
                &redactor,
                Some(r#"{"password":"[password]"}"#),
            )
            .await);
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialBackend for ClusterUsersBackend {
    fn api(&self) -> CredentialApi {
        CredentialApi::V4
    }

    async fn create_user(
        &self,
        username: &str,
        password: &SecretString,
        statement: Option<&str>,
    ) -> Result<()> {
        let span = crate::operation_span!(self.span, "create_user", username = %username);
        async move {
            let access = access_entries(statement)?;
            let endpoint = self.users_path();

            let body = CreateUserRequest { name: username, password: password.expose_secret(), access: &access };
            let response = self.client.send(Method::POST, &endpoint, Some(&body)).await?;
            if response.status() != StatusCode::CREATED {
                let echoed = serde_json::json!({"name": username, "password": "[password]", "access": access});
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

            info!("Database credential created");
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
        let span = crate::operation_span!(self.span, "rotate_credential", username = %username);
        async move {
            if username == self.access_key {
                return self.rotate_api_key(new_password).await.map(Some);
            }
            self.change_password(username, new_password).await?;
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
