//! # Command Line Interface
//!
//! Operator commands that drive the plugin against a real control plane, for
//! checking a configuration and managing credentials by hand.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use tracing::debug;

use crate::config::{load_raw_config, ClusterTlsConfig, ConnectionConfig, LoggingConfig};
use crate::connection::{wait_for_sample_bucket, ConnectOptions, ManagementConnector};
use crate::lifecycle::RotatedRoot;
use crate::observability::{init_logging, plugin_span};
use crate::plugin::{
    CapellaDatabase, ChangePassword, DeleteUserRequest, InitializeRequest, NewUserRequest,
    Statements, UpdateUserRequest, UsernameMetadata, PLUGIN_TYPE,
};
use crate::secrets::SecretString;
use crate::{APP_NAME, VERSION};

#[derive(Parser)]
#[command(name = "capella-dbplugin")]
#[command(about = "Couchbase Capella database credential plugin")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Connection configuration file (JSON, TOML or YAML); CAPELLA_* variables override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the configuration, optionally connecting to the cluster
    Verify {
        /// Also open the direct cluster connection and wait until it is ready
        #[arg(long)]
        connect: bool,
    },

    /// Create a database credential
    CreateUser {
        #[arg(long, default_value = "cli")]
        display_name: String,

        #[arg(long, default_value = "manual")]
        role_name: String,

        /// Password to set; a random one is generated when omitted
        #[arg(long)]
        password: Option<String>,

        /// Access statement JSON; the read-only default applies when omitted
        #[arg(long)]
        statement: Option<String>,
    },

    /// Change a credential's password, or rotate the plugin's own API key
    Rotate {
        username: String,

        #[arg(long)]
        password: Option<String>,
    },

    /// Delete a database credential
    DeleteUser { username: String },

    /// Wait until a sample bucket is installed on the configured hosts
    WaitSampleBucket {
        #[arg(default_value = "travel-sample")]
        bucket: String,

        /// Seconds to wait
        #[arg(long, default_value = "20")]
        timeout: u64,
    },
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&LoggingConfig::from_env().verbose(cli.verbose))?;
    debug!(app_name = APP_NAME, version = VERSION, "Starting");

    let raw = load_raw_config(cli.config.as_deref())?;
    let db = CapellaDatabase::new();

    match cli.command {
        Commands::Verify { connect } => {
            db.initialize(InitializeRequest { config: raw, verify_connection: connect }).await?;
            println!("Configuration is valid for plugin type {}", PLUGIN_TYPE);
        }

        Commands::CreateUser { display_name, role_name, password, statement } => {
            db.initialize(InitializeRequest { config: raw, verify_connection: false }).await?;
            let password = password.unwrap_or_else(generate_password);
            let request = NewUserRequest {
                username_config: UsernameMetadata { display_name, role_name },
                statements: Statements { commands: statement.into_iter().collect() },
                password: SecretString::new(password.clone()),
                ..Default::default()
            };
            let response = db.new_user(request).await?;
            println!("username: {}", response.username);
            println!("password: {}", password);
        }

        Commands::Rotate { username, password } => {
            db.initialize(InitializeRequest { config: raw, verify_connection: false }).await?;
            let password = password.unwrap_or_else(generate_password);
            let request = UpdateUserRequest {
                username: username.clone(),
                password: Some(ChangePassword {
                    new_password: SecretString::new(password.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            };
            match db.update_user(request).await?.rotated_root {
                Some(RotatedRoot::SecretKey(secret)) => {
                    println!("API key rotated; store the new secret key now:");
                    println!("{}", secret.expose_secret());
                }
                Some(RotatedRoot::AdminPassword(_)) => {
                    println!("Administrator password changed to: {}", password);
                }
                None => println!("Password for {} changed to: {}", username, password),
            }
        }

        Commands::DeleteUser { username } => {
            db.initialize(InitializeRequest { config: raw, verify_connection: false }).await?;
            db.delete_user(DeleteUserRequest { username: username.clone(), ..Default::default() })
                .await?;
            println!("Deleted {}", username);
        }

        Commands::WaitSampleBucket { bucket, timeout } => {
            let config = ConnectionConfig::from_raw(&raw)?.prepare()?;
            let cluster = ManagementConnector::new()
                .open(ConnectOptions {
                    hosts: config.hosts.clone(),
                    username: config.username.clone(),
                    password: config.password.clone(),
                    tls: ClusterTlsConfig::from_connection_config(&config)?,
                    request_timeout: config.request_timeout(),
                    span: plugin_span(PLUGIN_TYPE),
                })
                .await?;
            wait_for_sample_bucket(&cluster, &bucket, Duration::from_secs(timeout)).await?;
            println!("{} is installed", bucket);
        }
    }

    db.close().await?;
    Ok(())
}

fn generate_password() -> String {
    OsRng.sample_iter(&Alphanumeric).take(24).map(char::from).collect()
}
