//! Direct cluster connection contracts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::Span;

use crate::config::ClusterTlsConfig;
use crate::errors::Result;
use crate::secrets::SecretString;

/// One role binding of a cluster-local user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
}

impl UserRole {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into(), bucket_name: None, scope_name: None, collection_name: None }
    }

    pub fn on_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket_name = Some(bucket.into());
        self
    }

    /// Role in the `role[bucket:scope:collection]` notation of the management API.
    pub fn to_rbac_string(&self) -> String {
        let target: Vec<&str> = [&self.bucket_name, &self.scope_name, &self.collection_name]
            .into_iter()
            .map_while(|part| part.as_deref())
            .collect();
        if target.is_empty() {
            self.role.clone()
        } else {
            format!("{}[{}]", self.role, target.join(":"))
        }
    }
}

/// A cluster-local user as held by the security manager.
///
/// The password is write-only: reads never return it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct User {
    pub username: String,
    pub display_name: String,
    pub password: Option<SecretString>,
    pub roles: Vec<UserRole>,
    pub groups: Vec<String>,
}

/// Everything needed to open a connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Host list, e.g. `couchbases://a.example.com,b.example.com`
    pub hosts: String,
    pub username: String,
    pub password: SecretString,
    pub tls: Option<ClusterTlsConfig>,
    pub request_timeout: Duration,
    pub span: Span,
}

/// An open connection to a database cluster.
#[async_trait]
pub trait Cluster: Send + Sync + fmt::Debug {
    /// Block until the cluster, or `bucket` when given, reports ready.
    async fn wait_until_ready(&self, bucket: Option<&str>, timeout: Duration) -> Result<()>;

    /// Fetch a local user; fails with `NotFound` when absent.
    async fn get_user(&self, username: &str) -> Result<User>;

    /// Create or replace a local user.
    async fn upsert_user(&self, user: &User) -> Result<()>;

    async fn drop_user(&self, username: &str) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Opens [`Cluster`] connections.
#[async_trait]
pub trait ClusterConnector: Send + Sync + fmt::Debug {
    async fn connect(&self, options: ConnectOptions) -> Result<Arc<dyn Cluster>>;
}
