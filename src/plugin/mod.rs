//! # Host Lifecycle Facade
//!
//! [`CapellaDatabase`] implements the generic credential-plugin operations a
//! secrets host invokes: initialize, create, update and delete users.

pub mod database;
pub mod requests;
pub mod username;

pub use database::{apply_rotated_root, CapellaDatabase, PLUGIN_TYPE};
pub use requests::{
    ChangeExpiration, ChangePassword, DeleteUserRequest, DeleteUserResponse, InitializeRequest,
    InitializeResponse, NewUserRequest, NewUserResponse, RawConfig, Statements, UpdateUserRequest,
    UpdateUserResponse, UsernameMetadata,
};
pub use username::{UsernameProducer, DEFAULT_USERNAME_TEMPLATE};
