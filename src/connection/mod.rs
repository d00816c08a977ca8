//! # Direct Cluster Connection
//!
//! Connection contracts, the management-REST implementation, bounded
//! readiness retry, and the lock-guarded connection producer.

pub mod cluster;
pub mod health;
pub mod management;
pub mod producer;
pub mod retry;

pub use cluster::{Cluster, ClusterConnector, ConnectOptions, User, UserRole};
pub use health::wait_for_sample_bucket;
pub use management::{ManagementCluster, ManagementConnector};
pub use producer::{ConnectionProducer, ProducerCore, ProducerState, DEFAULT_CONNECT_TIMEOUT};
pub use retry::{Probe, RetryPolicy};
