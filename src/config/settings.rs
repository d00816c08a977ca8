//! # Connection Settings
//!
//! The connection configuration handed over by the secrets host, decoded from
//! its raw JSON map, validated, and completed with defaults.

use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::errors::{Error, Result};
use crate::secrets::{Redactor, SecretString};

/// Default control-plane endpoint.
pub const DEFAULT_CLOUD_API_BASE_URL: &str = "https://cloudapi.cloud.couchbase.com";

/// Default role granted by the legacy signed API when no statement is given.
pub const DEFAULT_ACCESS_ROLE: &str = "data_writer";

/// Default scope for bucket grants.
pub const DEFAULT_SCOPE_NAME: &str = "*";

/// Default per-request timeout for control-plane calls.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Scheme prefix required on the host list when TLS is enabled.
pub const TLS_HOSTS_SCHEME: &str = "couchbases://";

/// Deployment flavour of the target cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClusterType {
    #[default]
    Provisioned,
    #[serde(rename = "invpc")]
    InVpc,
}

/// Which credential API generation the plugin talks to.
///
/// Selected once when the configuration is decoded; each variant maps to one
/// [`CredentialBackend`](crate::lifecycle::CredentialBackend) implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CredentialApi {
    /// Per-cluster database users, bearer-token auth.
    #[default]
    V4,
    /// Legacy HMAC-signed public API.
    V3,
    /// The cluster's own security manager over a direct connection.
    SecurityManager,
}

impl std::fmt::Display for CredentialApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialApi::V4 => write!(f, "v4"),
            CredentialApi::V3 => write!(f, "v3"),
            CredentialApi::SecurityManager => write!(f, "security_manager"),
        }
    }
}

/// Connection configuration for one plugin instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct ConnectionConfig {
    /// API access key (the key id of the administrative API key)
    #[validate(length(min = 1, message = "access_key cannot be empty"))]
    pub access_key: String,

    /// API secret key
    pub secret_key: SecretString,

    /// Target cluster identifier
    #[validate(length(min = 1, message = "cluster_id cannot be empty"))]
    pub cluster_id: String,

    pub cluster_type: ClusterType,

    pub credential_api: CredentialApi,

    /// Organization owning the cluster (v4 path construction, root rotation)
    pub organization_id: Option<String>,

    /// Project owning the cluster (v4 path construction)
    pub project_id: Option<String>,

    pub cloud_api_base_url: String,

    /// Credentials endpoint path, relative to the base URL
    pub cloud_api_clusters_path: String,

    pub bucket_name: String,

    pub scope_name: String,

    pub access_role: String,

    /// Direct-connection host list, e.g. `couchbases://cb.example.com`
    pub hosts: String,

    /// Direct-connection administrator
    pub username: String,

    pub password: SecretString,

    #[serde(deserialize_with = "lenient_bool")]
    pub tls: bool,

    #[serde(deserialize_with = "lenient_bool")]
    pub insecure_tls: bool,

    /// Base64-encoded PEM root certificate
    #[serde(rename = "base64pem")]
    pub base64_pem: String,

    #[validate(range(min = 1, max = 300, message = "request timeout must be between 1 and 300 seconds"))]
    #[serde(deserialize_with = "lenient_u64")]
    pub request_timeout_seconds: u64,
}

impl ConnectionConfig {
    /// Decode the host's raw configuration map.
    pub fn from_raw(raw: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let mut config: ConnectionConfig =
            serde_json::from_value(serde_json::Value::Object(raw.clone()))
                .map_err(|e| Error::validation(format!("invalid connection configuration: {}", e)))?;
        if !raw.contains_key("request_timeout_seconds") {
            config.request_timeout_seconds = DEFAULT_REQUEST_TIMEOUT_SECONDS;
        }
        Ok(config)
    }

    /// Validate required fields, apply defaults, and check TLS settings.
    ///
    /// Nothing is returned on failure, so a caller never observes a
    /// half-prepared configuration.
    pub fn prepare(mut self) -> Result<Self> {
        if self.request_timeout_seconds == 0 {
            self.request_timeout_seconds = DEFAULT_REQUEST_TIMEOUT_SECONDS;
        }

        Validate::validate(&self).map_err(Error::from)?;
        if self.secret_key.is_empty() {
            return Err(Error::validation_field("secret_key cannot be empty", "secret_key"));
        }

        if self.cloud_api_base_url.is_empty() {
            self.cloud_api_base_url = match self.credential_api {
                CredentialApi::V4 => format!("{}/v4", DEFAULT_CLOUD_API_BASE_URL),
                _ => DEFAULT_CLOUD_API_BASE_URL.to_string(),
            };
        }
        self.cloud_api_base_url = self.cloud_api_base_url.trim_end_matches('/').to_string();

        if self.cloud_api_clusters_path.is_empty() {
            self.cloud_api_clusters_path = self.default_clusters_path()?;
        }

        if self.access_role.is_empty() {
            self.access_role = DEFAULT_ACCESS_ROLE.to_string();
        }
        if self.scope_name.is_empty() {
            self.scope_name = DEFAULT_SCOPE_NAME.to_string();
        }

        if self.tls {
            if self.base64_pem.is_empty() {
                return Err(Error::validation_field("base64pem cannot be empty", "base64pem"));
            }
            if !self.hosts.starts_with(TLS_HOSTS_SCHEME) {
                return Err(Error::validation_field(
                    "hosts list must start with couchbases:// for TLS connection",
                    "hosts",
                ));
            }
        }

        if self.credential_api == CredentialApi::SecurityManager && self.hosts.is_empty() {
            return Err(Error::validation_field(
                "hosts cannot be empty when credential_api is security_manager",
                "hosts",
            ));
        }

        Ok(self)
    }

    fn default_clusters_path(&self) -> Result<String> {
        match self.credential_api {
            CredentialApi::V4 => match (&self.organization_id, &self.project_id) {
                (Some(org), Some(project)) if !org.is_empty() && !project.is_empty() => Ok(format!(
                    "/organizations/{}/projects/{}/clusters/{}",
                    org, project, self.cluster_id
                )),
                _ => Err(Error::validation_field(
                    "cloud_api_clusters_path, or organization_id and project_id, are required for the v4 API",
                    "cloud_api_clusters_path",
                )),
            },
            CredentialApi::V3 | CredentialApi::SecurityManager => Ok(match self.cluster_type {
                ClusterType::Provisioned => "/v3/clusters".to_string(),
                ClusterType::InVpc => "/v2/clusters".to_string(),
            }),
        }
    }

    /// Path of the cluster whose database users we manage; `/users` hangs off it.
    pub fn credentials_path(&self) -> String {
        match self.credential_api {
            CredentialApi::V4 => self.cloud_api_clusters_path.clone(),
            CredentialApi::V3 | CredentialApi::SecurityManager => {
                format!("{}/{}", self.cloud_api_clusters_path, self.cluster_id)
            }
        }
    }

    /// Organization segment used by the API-key rotate endpoint.
    ///
    /// Taken from the credentials path (`/organizations/{org}/...`), falling
    /// back to `organization_id`.
    pub fn organization(&self) -> Result<String> {
        let segments: Vec<&str> = self.cloud_api_clusters_path.split('/').collect();
        if segments.len() > 2 && segments[1] == "organizations" && !segments[2].is_empty() {
            return Ok(segments[2].to_string());
        }
        self.organization_id
            .clone()
            .filter(|o| !o.is_empty())
            .ok_or_else(|| {
                Error::validation_field(
                    "organization could not be derived from cloud_api_clusters_path and organization_id is not set",
                    "organization_id",
                )
            })
    }

    /// Bucket to wait on when connecting, if one is configured.
    pub fn bucket(&self) -> Option<&str> {
        (!self.bucket_name.is_empty()).then_some(self.bucket_name.as_str())
    }

    /// Whether credentials are managed over the direct cluster connection.
    pub fn needs_direct_connection(&self) -> bool {
        self.credential_api == CredentialApi::SecurityManager
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_seconds)
    }

    /// Secret values this configuration holds, with their redaction markers.
    pub fn redactor(&self) -> Redactor {
        Redactor::new()
            .secret(self.password.expose_secret(), "[password]")
            .secret(self.username.clone(), "[username]")
            .secret(self.secret_key.expose_secret(), "[secret_key]")
    }
}

/// Accept `true`, `"true"`, `"1"`, `"yes"` and friends; hosts often stringify booleans.
fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Str(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::Str(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "" | "0" | "false" | "no" | "off" => Ok(false),
            other => Err(serde::de::Error::custom(format!("invalid boolean value '{}'", other))),
        },
    }
}

/// Accept `30` or `"30"`.
fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrString {
        Num(u64),
        Str(String),
    }

    match NumOrString::deserialize(deserializer)? {
        NumOrString::Num(n) => Ok(n),
        NumOrString::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid integer value '{}'", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    fn v4_raw() -> serde_json::Map<String, serde_json::Value> {
        raw(json!({
            "access_key": "AK",
            "secret_key": "SK",
            "cluster_id": "c-1",
            "organization_id": "org-1",
            "project_id": "proj-1",
        }))
    }

    #[test]
    fn test_v4_defaults() {
        let config = ConnectionConfig::from_raw(&v4_raw()).unwrap().prepare().unwrap();
        assert_eq!(config.cloud_api_base_url, "https://cloudapi.cloud.couchbase.com/v4");
        assert_eq!(config.credentials_path(), "/organizations/org-1/projects/proj-1/clusters/c-1");
        assert_eq!(config.access_role, "data_writer");
        assert_eq!(config.scope_name, "*");
        assert_eq!(config.request_timeout_seconds, DEFAULT_REQUEST_TIMEOUT_SECONDS);
        assert_eq!(config.bucket(), None);
    }

    #[test]
    fn test_v3_paths_follow_cluster_type() {
        let mut map = v4_raw();
        map.insert("credential_api".into(), json!("v3"));
        let provisioned = ConnectionConfig::from_raw(&map).unwrap().prepare().unwrap();
        assert_eq!(provisioned.cloud_api_base_url, DEFAULT_CLOUD_API_BASE_URL);
        assert_eq!(provisioned.credentials_path(), "/v3/clusters/c-1");

        map.insert("cluster_type".into(), json!("invpc"));
        let invpc = ConnectionConfig::from_raw(&map).unwrap().prepare().unwrap();
        assert_eq!(invpc.credentials_path(), "/v2/clusters/c-1");
    }

    #[test]
    fn test_required_fields() {
        for field in ["access_key", "secret_key", "cluster_id"] {
            let mut map = v4_raw();
            map.remove(field);
            let err = ConnectionConfig::from_raw(&map).unwrap().prepare().unwrap_err();
            assert!(
                matches!(err, Error::Validation { ref message, .. } if message.contains(field)),
                "{field}: {err}"
            );
        }
    }

    #[test]
    fn test_tls_requires_certificate() {
        let mut map = v4_raw();
        map.insert("tls".into(), json!(true));
        map.insert("hosts".into(), json!("couchbases://cb.example.com"));
        let err = ConnectionConfig::from_raw(&map).unwrap().prepare().unwrap_err();
        assert!(err.to_string().contains("base64pem cannot be empty"));
    }

    #[test]
    fn test_tls_requires_tls_scheme() {
        let mut map = v4_raw();
        map.insert("tls".into(), json!("true"));
        map.insert("base64pem".into(), json!("Zm9v"));
        map.insert("hosts".into(), json!("couchbase://cb.example.com"));
        let err = ConnectionConfig::from_raw(&map).unwrap().prepare().unwrap_err();
        assert!(err.to_string().contains("couchbases://"));
    }

    #[test]
    fn test_organization_from_path_or_field() {
        let config = ConnectionConfig::from_raw(&v4_raw()).unwrap().prepare().unwrap();
        assert_eq!(config.organization().unwrap(), "org-1");

        let mut map = v4_raw();
        map.insert("cloud_api_clusters_path".into(), json!("/custom/clusters/c-1"));
        map.insert("organization_id".into(), json!("org-2"));
        let config = ConnectionConfig::from_raw(&map).unwrap().prepare().unwrap();
        assert_eq!(config.organization().unwrap(), "org-2");
    }

    #[test]
    fn test_v4_without_path_or_ids_is_rejected() {
        let map = raw(json!({"access_key": "AK", "secret_key": "SK", "cluster_id": "c-1"}));
        let err = ConnectionConfig::from_raw(&map).unwrap().prepare().unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_redactor_covers_config_secrets() {
        let mut map = v4_raw();
        map.insert("password".into(), json!("db-pass"));
        let config = ConnectionConfig::from_raw(&map).unwrap();
        let scrubbed = config.redactor().apply("SK db-pass");
        assert_eq!(scrubbed, "[secret_key] [password]");
    }

    #[test]
    fn test_lenient_bool_rejects_garbage() {
        let mut map = v4_raw();
        map.insert("insecure_tls".into(), json!("maybe"));
        assert!(ConnectionConfig::from_raw(&map).is_err());
    }

    #[test]
    fn test_string_timeout_is_accepted() {
        let mut map = v4_raw();
        map.insert("request_timeout_seconds".into(), json!("30"));
        let config = ConnectionConfig::from_raw(&map).unwrap();
        assert_eq!(config.request_timeout_seconds, 30);
        assert_eq!(config.request_timeout(), std::time::Duration::from_secs(30));

        map.insert("request_timeout_seconds".into(), json!(" 45 "));
        assert_eq!(ConnectionConfig::from_raw(&map).unwrap().request_timeout_seconds, 45);

        map.insert("request_timeout_seconds".into(), json!("soon"));
        assert!(ConnectionConfig::from_raw(&map).is_err());
    }
}
