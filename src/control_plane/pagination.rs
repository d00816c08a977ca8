//! Username to credential-id resolution over paged listings.

use std::collections::HashSet;

use reqwest::{Method, StatusCode};
use tracing::{debug, Instrument};

use super::client::ApiClient;
use super::models::{DatabaseCredential, ListCredentialsResponse};
use crate::errors::{Error, Result};

/// Page size requested from the listing endpoint.
pub const PAGE_SIZE: u32 = 100;

/// Walk `GET {credentials_path}/users` page by page until a credential whose
/// name equals `username` exactly is found, and return its id.
///
/// Records that lack an id or a name are skipped. The walk stops with
/// [`Error::NotFound`] when the cursor reports no further page, when a page
/// has no `data` array, or when the cursor points back at a page already read.
pub async fn resolve_user_id(
    client: &ApiClient,
    credentials_path: &str,
    username: &str,
) -> Result<String> {
    let span = crate::operation_span!(*client.span(), "resolve_user_id", username = %username);

    async move {
        let mut endpoint = first_page(credentials_path);
        let mut visited = HashSet::new();

        loop {
            if !visited.insert(endpoint.clone()) {
                debug!(%endpoint, "Cursor revisited a page, stopping");
                return Err(Error::not_found(username));
            }

            let page = fetch_page(client, &endpoint).await?;
            let Some(records) = page.data else {
                debug!(%endpoint, "Listing page has no data array");
                return Err(Error::not_found(username));
            };

            let found = records
                .into_iter()
                .filter_map(|record| serde_json::from_value::<DatabaseCredential>(record).ok())
                .find(|credential| credential.matches(username));
            if let Some(credential) = found {
                debug!(page = page.cursor.pages.page, "Resolved credential id");
                return Ok(credential.id);
            }

            match page.cursor.next_link() {
                Some(next) => endpoint = relative_link(client.base_url(), next),
                None => return Err(Error::not_found(username)),
            }
        }
    }
    .instrument(span)
    .await
}

fn first_page(credentials_path: &str) -> String {
    format!("{}/users?page=1&perPage={}", credentials_path, PAGE_SIZE)
}

async fn fetch_page(client: &ApiClient, endpoint: &str) -> Result<ListCredentialsResponse> {
    let response = client.send_empty(Method::GET, endpoint).await?;
    if response.status() != StatusCode::OK {
        return Err(Error::lookup(response.status().as_u16(), endpoint));
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::transport(endpoint, e.without_url().to_string()))?;
    serde_json::from_slice(&body).map_err(|e| Error::decode(endpoint, e.to_string()))
}

/// Turn a cursor link into a path relative to the client's base URL.
///
/// Cursors may carry an absolute URL, a path that repeats the base URL's own
/// path prefix (such as `/v4`), or a path that is already relative.
fn relative_link(base_url: &str, link: &str) -> String {
    let (link_path, base_path) = match (url::Url::parse(link), url::Url::parse(base_url)) {
        (Ok(link_url), Ok(base)) => {
            let mut path = link_url.path().to_string();
            if let Some(query) = link_url.query() {
                path.push('?');
                path.push_str(query);
            }
            (path, base.path().trim_end_matches('/').to_string())
        }
        (Err(_), Ok(base)) => (link.to_string(), base.path().trim_end_matches('/').to_string()),
        _ => (link.to_string(), String::new()),
    };

    if !base_path.is_empty() {
        if let Some(rest) = link_path.strip_prefix(&base_path) {
            if rest.starts_with('/') {
                return rest.to_string();
            }
        }
    }
    link_path
}
