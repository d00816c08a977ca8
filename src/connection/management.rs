//! [`Cluster`] over the cluster management REST interface.
//!
//! Readiness is read from node health in `/pools/default` (or the bucket's
//! own document), users are managed under `/settings/rbac/users/local`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn, Instrument, Span};
use url::Url;

use super::cluster::{Cluster, ClusterConnector, ConnectOptions, User, UserRole};
use super::retry::{Probe, RetryPolicy};
use crate::config::settings::TLS_HOSTS_SCHEME;
use crate::errors::{Error, Result};
use crate::secrets::{Redactor, SecretString};

/// Management port for plain connections.
pub const MANAGEMENT_PORT: u16 = 8091;

/// Management port for TLS connections.
pub const MANAGEMENT_TLS_PORT: u16 = 18091;

const PLAIN_HOSTS_SCHEME: &str = "couchbase://";

/// Connects by probing `/pools` on each configured host in turn.
#[derive(Debug, Clone, Default)]
pub struct ManagementConnector {
    retry: RetryPolicy,
}

impl ManagementConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry(retry: RetryPolicy) -> Self {
        Self { retry }
    }
}

impl ManagementConnector {
    /// Open a connection to the first host answering `/pools`.
    pub async fn open(&self, options: ConnectOptions) -> Result<ManagementCluster> {
        let endpoints = management_endpoints(&options.hosts)?;
        let http = http_client(&options)?;

        let mut last_error = None;
        for endpoint in endpoints {
            let cluster = ManagementCluster {
                http: http.clone(),
                endpoint,
                username: options.username.clone(),
                password: options.password.clone(),
                retry: self.retry,
                span: options.span.clone(),
            };
            match cluster.server_version().await {
                Ok(version) => {
                    info!(
                        parent: &options.span,
                        endpoint = %cluster.endpoint,
                        version = %version,
                        "Connected to cluster"
                    );
                    return Ok(cluster);
                }
                Err(e) => {
                    warn!(parent: &options.span, endpoint = %cluster.endpoint, error = %e, "Host unreachable");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::connection("hosts list is empty")))
    }
}

#[async_trait]
impl ClusterConnector for ManagementConnector {
    async fn connect(&self, options: ConnectOptions) -> Result<Arc<dyn Cluster>> {
        Ok(Arc::new(self.open(options).await?))
    }
}

fn http_client(options: &ConnectOptions) -> Result<Client> {
    let mut builder = Client::builder().timeout(options.request_timeout);
    if let Some(tls) = &options.tls {
        builder = if tls.skip_verify {
            builder.danger_accept_invalid_certs(true)
        } else {
            builder.use_preconfigured_tls(tls.client_config()?)
        };
    }
    builder
        .build()
        .map_err(|e| Error::connection(format!("Failed to build management client: {}", e)))
}

/// Management base URLs for a host list.
///
/// `couchbases://` hosts map to `https://host:18091`, `couchbase://` or bare
/// hosts to `http://host:8091`. Entries already written as `http(s)://` URLs
/// are taken as they are.
pub fn management_endpoints(hosts: &str) -> Result<Vec<String>> {
    let hosts = hosts.trim();
    let (scheme, port, list) = if let Some(rest) = hosts.strip_prefix(TLS_HOSTS_SCHEME) {
        ("https", MANAGEMENT_TLS_PORT, rest)
    } else if let Some(rest) = hosts.strip_prefix(PLAIN_HOSTS_SCHEME) {
        ("http", MANAGEMENT_PORT, rest)
    } else if hosts.starts_with("http://") || hosts.starts_with("https://") {
        return Ok(hosts
            .split(',')
            .map(|h| h.trim().trim_end_matches('/').to_string())
            .filter(|h| !h.is_empty())
            .collect());
    } else {
        ("http", MANAGEMENT_PORT, hosts)
    };

    // connection-string options after '?' do not concern the management API
    let list = list.split('?').next().unwrap_or_default();
    let endpoints: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(|h| format!("{}://{}:{}", scheme, strip_port(h), port))
        .collect();

    if endpoints.is_empty() {
        return Err(Error::validation_field("hosts list is empty", "hosts"));
    }
    Ok(endpoints)
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.split_once(']').map(|(h, _)| &host[..h.len() + 1]).unwrap_or(host);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolsInfo {
    #[serde(default)]
    implementation_version: String,
}

#[derive(Debug, Deserialize)]
struct NodesInfo {
    #[serde(default)]
    nodes: Vec<NodeInfo>,
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct LocalUser {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    roles: Vec<AssignedRole>,
    #[serde(default)]
    groups: Vec<String>,
}

/// A role as the cluster reports it, with where the user got it from.
#[derive(Debug, Deserialize)]
struct AssignedRole {
    #[serde(flatten)]
    role: UserRole,
    #[serde(default)]
    origins: Vec<RoleOrigin>,
}

#[derive(Debug, Deserialize)]
struct RoleOrigin {
    #[serde(rename = "type")]
    kind: String,
}

impl AssignedRole {
    /// Granted to the user itself, not only inherited from a group.
    /// Servers that omit origins only report direct grants.
    fn is_direct(&self) -> bool {
        self.origins.is_empty() || self.origins.iter().any(|origin| origin.kind == "user")
    }
}

/// Cluster handle speaking the management REST interface of one node.
#[derive(Debug, Clone)]
pub struct ManagementCluster {
    http: Client,
    endpoint: String,
    username: String,
    password: SecretString,
    retry: RetryPolicy,
    span: Span,
}

impl ManagementCluster {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(super) fn span(&self) -> &Span {
        &self.span
    }

    pub(super) fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub(super) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
    }

    pub(super) fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| Error::connection(format!("Invalid management endpoint: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::connection("Management endpoint cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn transport(&self, e: reqwest::Error) -> Error {
        Error::transport(&self.endpoint, e.without_url().to_string())
    }

    async fn server_version(&self) -> Result<String> {
        let response = self
            .request(Method::GET, self.url(&["pools"])?)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::remote(
                "read cluster version",
                status.as_u16(),
                &self.endpoint,
                response.text().await.unwrap_or_default(),
            ));
        }
        let pools: PoolsInfo =
            response.json().await.map_err(|e| Error::decode(&self.endpoint, e.to_string()))?;
        Ok(pools.implementation_version)
    }

    async fn probe_ready(&self, bucket: Option<&str>) -> Probe<()> {
        let url = match bucket {
            Some(bucket) => self.url(&["pools", "default", "buckets", bucket]),
            None => self.url(&["pools", "default"]),
        };
        let url = match url {
            Ok(url) => url,
            Err(e) => return Probe::Permanent(e),
        };

        let response = match self.request(Method::GET, url).send().await {
            Ok(response) => response,
            Err(e) => return Probe::Retry(e.without_url().to_string()),
        };

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND if bucket.is_some() => {
                return Probe::Permanent(Error::connection(format!(
                    "bucket '{}' not found",
                    bucket.unwrap_or_default()
                )));
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Probe::Permanent(Error::remote(
                    "wait until ready",
                    response.status().as_u16(),
                    &self.endpoint,
                    "cluster rejected the configured credentials",
                ));
            }
            status => return Probe::Retry(format!("status {}", status.as_u16())),
        }

        match response.json::<NodesInfo>().await {
            Ok(info) => {
                let healthy = info.nodes.iter().filter(|n| n.status == "healthy").count();
                if !info.nodes.is_empty() && healthy == info.nodes.len() {
                    Probe::Ready(())
                } else {
                    Probe::Retry(format!("{} of {} nodes healthy", healthy, info.nodes.len()))
                }
            }
            Err(e) => Probe::Retry(format!("unreadable node status: {}", e)),
        }
    }
}

#[async_trait]
impl Cluster for ManagementCluster {
    async fn wait_until_ready(&self, bucket: Option<&str>, timeout: Duration) -> Result<()> {
        let target = bucket.map_or_else(|| "cluster".to_string(), |b| format!("bucket {}", b));
        let span = tracing::debug_span!(parent: &self.span, "wait_until_ready", target = %target);
        self.retry
            .run(&target, timeout, || self.probe_ready(bucket))
            .instrument(span)
            .await
    }

    async fn get_user(&self, username: &str) -> Result<User> {
        let url = self.url(&["settings", "rbac", "users", "local", username])?;
        let response =
            self.request(Method::GET, url).send().await.map_err(|e| self.transport(e))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(Error::not_found(username)),
            status => {
                return Err(Error::remote(
                    "get user",
                    status.as_u16(),
                    &self.endpoint,
                    response.text().await.unwrap_or_default(),
                ))
            }
        }

        let user: LocalUser =
            response.json().await.map_err(|e| Error::decode(&self.endpoint, e.to_string()))?;
        Ok(User {
            username: user.id,
            display_name: user.name,
            password: None,
            roles: user.roles.into_iter().filter(AssignedRole::is_direct).map(|r| r.role).collect(),
            groups: user.groups,
        })
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        let url = self.url(&["settings", "rbac", "users", "local", &user.username])?;
        let roles = user.roles.iter().map(UserRole::to_rbac_string).collect::<Vec<_>>().join(",");
        let groups = user.groups.join(",");

        let mut form = vec![
            ("name", user.display_name.as_str()),
            ("roles", roles.as_str()),
            ("groups", groups.as_str()),
        ];
        if let Some(password) = &user.password {
            form.push(("password", password.expose_secret()));
        }

        debug!(parent: &self.span, username = %user.username, "Upserting user");
        let response =
            self.request(Method::PUT, url).form(&form).send().await.map_err(|e| self.transport(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let redactor = Redactor::new().secret(
            user.password.as_ref().map(|p| p.expose_secret().to_string()).unwrap_or_default(),
            "[password]",
        );
        let body = response.text().await.unwrap_or_default();
        Err(Error::remote("upsert user", status.as_u16(), &self.endpoint, redactor.apply(&body)))
    }

    async fn drop_user(&self, username: &str) -> Result<()> {
        let url = self.url(&["settings", "rbac", "users", "local", username])?;
        let response =
            self.request(Method::DELETE, url).send().await.map_err(|e| self.transport(e))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(Error::not_found(username)),
            status => Err(Error::remote(
                "drop user",
                status.as_u16(),
                &self.endpoint,
                response.text().await.unwrap_or_default(),
            )),
        }
    }

    async fn close(&self) -> Result<()> {
        debug!(parent: &self.span, endpoint = %self.endpoint, "Closing cluster connection");
        Ok(())
    }
}
