//! # Control-Plane API
//!
//! Authenticated access to the cloud control plane's database credential
//! endpoints: request signing, the HTTP client in its two authentication
//! modes, wire models, and username resolution over paged listings.

pub mod client;
pub mod models;
pub mod pagination;
pub mod signing;

pub use client::{ApiClient, AuthScheme};
pub use pagination::{resolve_user_id, PAGE_SIZE};
