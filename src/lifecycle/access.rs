//! Access statements: JSON documents granting bucket privileges to a credential.

use serde_json::Value;

use crate::errors::{Error, Result};

/// Statement applied when the role carries none: read-only on every bucket.
pub const DEFAULT_ACCESS_STATEMENT: &str =
    r#"{"access":[{"privileges":["data_reader"],"resources":{"buckets":[{"name":"*"}]}}]}"#;

/// Parse a statement and return its `access` array.
///
/// `None`, or a statement that is only whitespace, falls back to
/// [`DEFAULT_ACCESS_STATEMENT`].
pub fn access_entries(statement: Option<&str>) -> Result<Value> {
    let statement = match statement {
        Some(s) if !s.trim().is_empty() => s,
        _ => DEFAULT_ACCESS_STATEMENT,
    };

    let document: Value = serde_json::from_str(statement)
        .map_err(|e| Error::malformed_policy(format!("access statement is not valid JSON: {}", e)))?;

    match document.get("access") {
        Some(access @ Value::Array(_)) => Ok(access.clone()),
        Some(_) => Err(Error::malformed_policy("'access' must be an array")),
        None => Err(Error::malformed_policy("access statement has no 'access' field")),
    }
}
