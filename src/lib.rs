//! # Capella Database Plugin
//!
//! A database credential plugin for Couchbase Capella. A secrets host drives
//! it to issue, rotate and revoke database users on a Capella cluster.
//!
//! ## Architecture
//!
//! ```text
//! CapellaDatabase (plugin) → CredentialBackend (lifecycle) → ApiClient (control_plane)
//!          ↓                                ↓
//! ConnectionProducer (connection) → Cluster (management REST)
//! ```
//!
//! ## Core Components
//!
//! - **Control plane client**: HMAC-signed or bearer-token HTTP calls to the Capella API
//! - **Pagination resolver**: maps a username to its server-side id across listing pages
//! - **Credential lifecycle**: create, rotate and delete users on one of three APIs
//! - **Connection producer**: owns the validated configuration and a cached cluster connection
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use capella_dbplugin::plugin::{CapellaDatabase, InitializeRequest};
//!
//! #[tokio::main]
//! async fn main() -> capella_dbplugin::Result<()> {
//!     let db = CapellaDatabase::new();
//!     let config = capella_dbplugin::config::load_raw_config(None)?;
//!     db.initialize(InitializeRequest { config, verify_connection: false }).await?;
//!     db.close().await
//! }
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod control_plane;
pub mod errors;
pub mod lifecycle;
pub mod observability;
pub mod plugin;
pub mod secrets;

// Re-export commonly used types and traits
pub use config::ConnectionConfig;
pub use errors::{Error, Result};
pub use plugin::{CapellaDatabase, PLUGIN_TYPE};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "capella-dbplugin");
    }
}
