//! # Configuration Management
//!
//! Connection settings for the credential plugin plus the loaders the binary
//! uses to assemble them from a file and `CAPELLA_*` environment variables.

pub mod settings;
pub mod tls;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use settings::{ClusterType, ConnectionConfig, CredentialApi};
pub use tls::ClusterTlsConfig;

use crate::Result;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "CAPELLA";

/// Load the raw connection map the way a host would hand it to `initialize`.
///
/// Sources, lowest precedence first: the optional file (JSON, TOML or YAML,
/// chosen by extension), then `CAPELLA_*` environment variables
/// (`CAPELLA_CLUSTER_ID`, `CAPELLA_SECRET_KEY`, ...).
pub fn load_raw_config(path: Option<&Path>) -> Result<serde_json::Map<String, serde_json::Value>> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(false));

    let raw = builder.build()?.try_deserialize::<serde_json::Map<String, serde_json::Value>>()?;
    Ok(raw)
}

/// Logging configuration for the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json: false }
    }
}

impl LoggingConfig {
    /// Read `CAPELLA_LOG_LEVEL` and `CAPELLA_LOG_FORMAT` (`json` or `text`).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let log_level = std::env::var("CAPELLA_LOG_LEVEL").unwrap_or(defaults.log_level);
        let json = std::env::var("CAPELLA_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(defaults.json);
        Self { log_level, json }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.log_level = "debug".to_string();
        }
        self
    }
}
