//! HMAC request signing for the legacy control-plane API.
//!
//! The signed payload is `METHOD\nPATH\nTIMESTAMP`, where the path includes
//! its query string and the timestamp is whole seconds since the epoch. The
//! body is not part of the signature.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Timestamp header carried by every signed request.
pub const HEADER_TIMESTAMP: &str = "Couchbase-Timestamp";

/// Base64 HMAC-SHA256 of the canonical request line.
pub fn sign(secret_key: &str, method: &str, path: &str, timestamp: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(canonical_payload(method, path, timestamp).as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// `Bearer <accessKey>:<signature>`
pub fn authorization_value(
    access_key: &str,
    secret_key: &str,
    method: &str,
    path: &str,
    timestamp: &str,
) -> String {
    format!("Bearer {}:{}", access_key, sign(secret_key, method, path, timestamp))
}

fn canonical_payload(method: &str, path: &str, timestamp: &str) -> String {
    [method, path, timestamp].join("\n")
}

/// Current time as the decimal seconds string used in the timestamp header.
pub fn timestamp_now() -> String {
    chrono::Utc::now().timestamp().to_string()
}
