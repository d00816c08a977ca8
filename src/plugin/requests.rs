//! Request and response types of the host lifecycle contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::RotatedRoot;
use crate::secrets::SecretString;

/// Raw configuration map, as handed over by the host.
pub type RawConfig = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InitializeRequest {
    pub config: RawConfig,
    pub verify_connection: bool,
}

/// Echoes back the configuration the host should persist.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InitializeResponse {
    pub config: RawConfig,
}

/// Inputs to username generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UsernameMetadata {
    pub display_name: String,
    pub role_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Statements {
    pub commands: Vec<String>,
}

impl Statements {
    /// Commands with surrounding whitespace trimmed and blank ones dropped.
    pub fn non_empty(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.trim()).filter(|c| !c.is_empty()).collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewUserRequest {
    pub username_config: UsernameMetadata,
    pub statements: Statements,
    pub rollback_statements: Statements,
    pub password: SecretString,
    pub expiration: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUserResponse {
    pub username: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChangePassword {
    pub new_password: SecretString,
    pub statements: Statements,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChangeExpiration {
    pub new_expiration: Option<DateTime<Utc>>,
    pub statements: Statements,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub username: String,
    pub password: Option<ChangePassword>,
    pub expiration: Option<ChangeExpiration>,
}

/// Carries the plugin's new root credential when the update rotated it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateUserResponse {
    pub rotated_root: Option<RotatedRoot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeleteUserRequest {
    pub username: String,
    pub statements: Statements,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeleteUserResponse {}
