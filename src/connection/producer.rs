//! Lazily-opened, cached cluster connection.
//!
//! [`ProducerCore`] holds the configuration and the cached connection and
//! never locks; [`ConnectionProducer`] wraps it in a single read/write lock
//! for outside callers. Code already holding the write guard works on the
//! core directly, so it can close and reopen the connection without taking
//! the lock a second time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument, Span};

use super::cluster::{Cluster, ClusterConnector, ConnectOptions};
use crate::config::{ClusterTlsConfig, ConnectionConfig};
use crate::errors::{Error, Result};

/// Connect-and-ready deadline when the caller gives none.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Lifecycle of a producer.
///
/// `Closed` goes back to `Connected` on the next demand; closing clears the
/// cached connection, not the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    Uninitialized,
    Initialized,
    Connected,
    Closed,
}

/// Unlocked producer state. Every method assumes the caller owns it exclusively
/// (or through the [`ConnectionProducer`] guard).
#[derive(Debug)]
pub struct ProducerCore {
    config: Option<ConnectionConfig>,
    cluster: Option<Arc<dyn Cluster>>,
    state: ProducerState,
    connector: Arc<dyn ClusterConnector>,
    span: Span,
}

impl ProducerCore {
    pub fn new(connector: Arc<dyn ClusterConnector>, span: Span) -> Self {
        Self { config: None, cluster: None, state: ProducerState::Uninitialized, connector, span }
    }

    pub fn state(&self) -> ProducerState {
        self.state
    }

    pub fn config(&self) -> Result<&ConnectionConfig> {
        self.config.as_ref().ok_or(Error::NotInitialized)
    }

    pub fn config_mut(&mut self) -> Result<&mut ConnectionConfig> {
        self.config.as_mut().ok_or(Error::NotInitialized)
    }

    /// The cached connection, if one is open.
    pub fn cached(&self) -> Option<Arc<dyn Cluster>> {
        self.cluster.clone()
    }

    /// Validate and store `config`, then optionally prove it by connecting.
    ///
    /// Only configurations that manage users over the cluster connection are
    /// verified by connecting; control-plane configurations have no hosts to
    /// reach. On any failure the producer is left uninitialized with nothing
    /// cached.
    pub async fn initialize(&mut self, config: ConnectionConfig, verify_connection: bool) -> Result<()> {
        self.close().await?;
        self.config = None;
        self.state = ProducerState::Uninitialized;

        let config = config.prepare()?;
        info!(
            parent: &self.span,
            cluster_id = %config.cluster_id,
            credential_api = %config.credential_api,
            tls = config.tls,
            "Connection configuration accepted"
        );
        self.config = Some(config);
        self.state = ProducerState::Initialized;

        let needs_direct = self.config.as_ref().is_some_and(ConnectionConfig::needs_direct_connection);
        if verify_connection && !needs_direct {
            debug!(parent: &self.span, "No direct connection to verify");
        }
        if verify_connection && needs_direct {
            if let Err(e) = self.connection(None).await {
                warn!(parent: &self.span, error = %e, "Connection verification failed");
                if let Err(close_err) = self.close().await {
                    debug!(parent: &self.span, error = %close_err, "Close after failed verification");
                }
                self.config = None;
                self.state = ProducerState::Uninitialized;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Return the cached connection, opening it first if needed.
    ///
    /// Opening decodes the TLS roots, connects, and waits until the configured
    /// bucket (or the whole cluster) is ready, all within `timeout`
    /// ([`DEFAULT_CONNECT_TIMEOUT`] when `None`).
    pub async fn connection(&mut self, timeout: Option<Duration>) -> Result<Arc<dyn Cluster>> {
        let config = self.config.as_ref().ok_or(Error::NotInitialized)?;
        if let Some(cluster) = &self.cluster {
            return Ok(cluster.clone());
        }

        let timeout = timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let deadline = Instant::now() + timeout;
        let span = tracing::info_span!(parent: &self.span, "connect", hosts = %config.hosts);

        let options = ConnectOptions {
            hosts: config.hosts.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            tls: ClusterTlsConfig::from_connection_config(config)?,
            request_timeout: config.request_timeout(),
            span: span.clone(),
        };
        let bucket = config.bucket().map(str::to_string);
        let connector = self.connector.clone();

        let cluster = async move {
            let cluster = tokio::time::timeout_at(deadline, connector.connect(options))
                .await
                .map_err(|_| Error::timeout("connect", timeout.as_millis() as u64))??;

            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Err(e) = cluster.wait_until_ready(bucket.as_deref(), remaining).await {
                if let Err(close_err) = cluster.close().await {
                    debug!(error = %close_err, "Close after failed readiness wait");
                }
                return Err(e);
            }
            Ok(cluster)
        }
        .instrument(span)
        .await?;

        self.cluster = Some(cluster.clone());
        self.state = ProducerState::Connected;
        Ok(cluster)
    }

    /// Release the cached connection. Safe to call when nothing is cached.
    pub async fn close(&mut self) -> Result<()> {
        let Some(cluster) = self.cluster.take() else {
            return Ok(());
        };
        self.state = ProducerState::Closed;
        debug!(parent: &self.span, "Closing cached connection");
        cluster.close().await
    }
}

/// Lock-guarded facade over [`ProducerCore`].
#[derive(Debug)]
pub struct ConnectionProducer {
    core: RwLock<ProducerCore>,
}

impl ConnectionProducer {
    pub fn new(connector: Arc<dyn ClusterConnector>, span: Span) -> Self {
        Self { core: RwLock::new(ProducerCore::new(connector, span)) }
    }

    pub async fn initialize(&self, config: ConnectionConfig, verify_connection: bool) -> Result<()> {
        self.core.write().await.initialize(config, verify_connection).await
    }

    /// Cached connection, opened on first demand.
    pub async fn connection(&self, timeout: Option<Duration>) -> Result<Arc<dyn Cluster>> {
        {
            let core = self.core.read().await;
            core.config()?;
            if let Some(cluster) = core.cached() {
                return Ok(cluster);
            }
        }
        // another caller may have connected between the two guards; the core re-checks
        self.core.write().await.connection(timeout).await
    }

    pub async fn close(&self) -> Result<()> {
        self.core.write().await.close().await
    }

    pub async fn state(&self) -> ProducerState {
        self.core.read().await.state()
    }

    /// Snapshot of the current configuration.
    pub async fn config(&self) -> Result<ConnectionConfig> {
        self.core.read().await.config().cloned()
    }

    /// Shared access for a credential operation, plus the direct connection
    /// when the configuration manages users through it.
    ///
    /// Callers hold the guard until the operation finishes, so a rotation
    /// that needs the write lock waits for in-flight operations.
    pub async fn read_for_operation(
        &self,
    ) -> Result<(RwLockReadGuard<'_, ProducerCore>, Option<Arc<dyn Cluster>>)> {
        let core = self.core.read().await;
        if !core.config()?.needs_direct_connection() {
            return Ok((core, None));
        }
        if let Some(cluster) = core.cached() {
            return Ok((core, Some(cluster)));
        }
        drop(core);

        let mut core = self.core.write().await;
        // the configuration may have been replaced while unlocked
        if !core.config()?.needs_direct_connection() {
            return Ok((core.downgrade(), None));
        }
        let cluster = core.connection(None).await?;
        Ok((core.downgrade(), Some(cluster)))
    }

    /// Shared access for operations that only read configuration.
    pub async fn read(&self) -> RwLockReadGuard<'_, ProducerCore> {
        self.core.read().await
    }

    /// Exclusive access for operations that mutate configuration or the cache.
    pub async fn write(&self) -> RwLockWriteGuard<'_, ProducerCore> {
        self.core.write().await
    }
}
