//! Wire shapes of the control-plane credential endpoints.

use serde::{Deserialize, Serialize};

/// Cursor links returned with every page of a listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Hrefs {
    pub first: String,
    pub last: String,
    pub next: String,
    pub previous: String,
}

/// Page counters of a listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Pages {
    /// Last page number
    pub last: u32,
    /// Next page number, absent on the last page
    pub next: Option<u32>,
    /// Current page, starting from 1
    pub page: u32,
    pub per_page: u32,
    /// Previous page number, absent on the first page
    pub previous: Option<u32>,
    pub total_items: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Cursor {
    pub hrefs: Hrefs,
    pub pages: Pages,
}

impl Cursor {
    /// Link to the following page, if the cursor reports one.
    pub fn next_link(&self) -> Option<&str> {
        if self.hrefs.next.is_empty() {
            return None;
        }
        match self.pages.next {
            Some(0) => None,
            Some(_) => Some(self.hrefs.next.as_str()),
            // some generations omit the counter and only send the link
            None if self.pages.last != 0 && self.pages.page >= self.pages.last => None,
            None => Some(self.hrefs.next.as_str()),
        }
    }
}

/// One database credential as listed by the control plane.
///
/// The v4 API names the field `name`, the legacy API `username`; some records
/// carry both.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseCredential {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl DatabaseCredential {
    /// Exact, case-sensitive match on either name field.
    pub fn matches(&self, username: &str) -> bool {
        self.name.as_deref() == Some(username) || self.username.as_deref() == Some(username)
    }
}

/// One page of `GET .../users`.
///
/// `data` stays optional so a page without it can be told apart from an
/// empty page.
#[derive(Debug, Clone, Deserialize)]
pub struct ListCredentialsResponse {
    #[serde(default)]
    pub cursor: Cursor,
    pub data: Option<Vec<serde_json::Value>>,
}

/// `POST .../users` body for the v4 API.
#[derive(Debug, Clone, Serialize)]
pub struct CreateUserRequest<'a> {
    pub name: &'a str,
    pub password: &'a str,
    pub access: &'a serde_json::Value,
}

/// Bucket grant in the legacy create payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketAccess {
    pub name: String,
    pub scope: String,
    pub access: String,
}

/// `POST .../users` body for the legacy signed API.
#[derive(Debug, Clone, Serialize)]
pub struct CreateLegacyUserRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub buckets: &'a [BucketAccess],
}

/// `PUT .../users/{id}` body.
#[derive(Debug, Clone, Serialize)]
pub struct UpdatePasswordRequest<'a> {
    pub password: &'a str,
}

/// `POST /organizations/{org}/apikeys/{key}/rotate` body.
#[derive(Debug, Clone, Serialize)]
pub struct RotateApiKeyRequest<'a> {
    pub secret: &'a str,
}

/// Rotate response; the control plane may return a secret other than the one requested.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateApiKeyResponse {
    pub secret_key: String,
}
