//! Authenticated HTTP client for the control-plane API.
//!
//! Two authentication schemes exist, one per API generation:
//!
//! - [`AuthScheme::Signed`]: every request carries a `Couchbase-Timestamp`
//!   header and `Authorization: Bearer <accessKey>:<base64 HMAC>` (legacy API).
//! - [`AuthScheme::Bearer`]: the secret key is sent as a static bearer token
//!   (per-cluster users API).
//!
//! The client does not interpret status codes and never retries; callers
//! inspect the returned [`reqwest::Response`].

use std::time::Duration;

use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response};
use serde::Serialize;
use tracing::{debug, Instrument, Span};

use super::signing::{self, HEADER_TIMESTAMP};
use crate::errors::{Error, Result};
use crate::secrets::SecretString;

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// How requests are authenticated.
#[derive(Debug, Clone)]
pub enum AuthScheme {
    /// HMAC-SHA256 signature over method, path and timestamp
    Signed { access_key: String, secret_key: SecretString },
    /// Static bearer token
    Bearer { token: SecretString },
}

/// Control-plane HTTP client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    auth: AuthScheme,
    span: Span,
}

impl ApiClient {
    /// Client for the HMAC-signed API.
    pub fn signed(
        base_url: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: SecretString,
        timeout: Duration,
        span: Span,
    ) -> Result<Self> {
        Self::new(
            base_url.into(),
            AuthScheme::Signed { access_key: access_key.into(), secret_key },
            timeout,
            span,
        )
    }

    /// Client for the bearer-token API.
    pub fn bearer(
        base_url: impl Into<String>,
        token: SecretString,
        timeout: Duration,
        span: Span,
    ) -> Result<Self> {
        Self::new(base_url.into(), AuthScheme::Bearer { token }, timeout, span)
    }

    fn new(base_url: String, auth: AuthScheme, timeout: Duration, span: Span) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::request_build(&base_url, format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string(), auth, span })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &AuthScheme {
        &self.auth
    }

    /// Parent span of every request this client sends.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Send a request without a body.
    pub async fn send_empty(&self, method: Method, path: &str) -> Result<Response> {
        self.send::<()>(method, path, None).await
    }

    /// Build, authenticate and send one request to `base_url + path`.
    ///
    /// `body`, when present, is JSON-encoded. The path is used verbatim,
    /// query string included, both for the URL and for the signature.
    pub async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let span = crate::request_span!(self.span, method, path);

        async move {
            let payload = body
                .map(serde_json::to_vec)
                .transpose()
                .map_err(|e| Error::encoding(format!("Failed to marshal body for {}: {}", path, e)))?;

            let mut builder = self.http.request(method.clone(), &url);
            builder = match &self.auth {
                AuthScheme::Signed { access_key, secret_key } => {
                    let timestamp = signing::timestamp_now();
                    let authorization = signing::authorization_value(
                        access_key,
                        secret_key.expose_secret(),
                        method.as_str(),
                        path,
                        &timestamp,
                    );
                    builder
                        .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
                        .header(HEADER_TIMESTAMP, timestamp)
                        .header(AUTHORIZATION, sensitive(&authorization)?)
                }
                AuthScheme::Bearer { token } => {
                    let bearer = format!("Bearer {}", token.expose_secret());
                    let builder = builder.header(AUTHORIZATION, sensitive(&bearer)?);
                    if method == Method::POST || method == Method::PUT {
                        let content_type =
                            if path.contains('?') { CONTENT_TYPE_FORM } else { CONTENT_TYPE_JSON };
                        builder.header(CONTENT_TYPE, content_type)
                    } else {
                        builder
                    }
                }
            };
            if let Some(payload) = payload {
                builder = builder.body(payload);
            }

            let request = builder.build().map_err(|e| Error::request_build(&url, e.to_string()))?;

            debug!(%method, %path, "Sending control-plane request");
            let response = self
                .http
                .execute(request)
                .await
                .map_err(|e| Error::transport(&url, e.without_url().to_string()))?;

            let status = response.status().as_u16();
            Span::current().record("status", status);
            debug!(status, "Control-plane response received");
            Ok(response)
        }
        .instrument(span)
        .await
    }
}

fn sensitive(value: &str) -> Result<HeaderValue> {
    let mut header = HeaderValue::from_str(value)
        .map_err(|_| Error::validation("credentials contain characters not allowed in a header"))?;
    header.set_sensitive(true);
    Ok(header)
}
