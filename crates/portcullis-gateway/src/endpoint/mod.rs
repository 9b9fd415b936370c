//! Outbound HTTP endpoint used by remote mechanisms and the token cache.
//!
//! An endpoint builds one request from its configuration, lets an optional
//! [`AuthStrategy`] decorate it, and sends it within the caller's deadline.

pub mod auth;
pub mod client_credentials;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use portcullis_core::error::{PortcullisError, Result};
use portcullis_core::Context;

pub use auth::{ApiKeyStrategy, AuthConfig, AuthStrategy, BasicAuthStrategy};
pub use client_credentials::{CachedToken, ClientCredentialsConfig, ClientCredentialsStrategy};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_method() -> String {
    "POST".into()
}

/// Retry of transport failures (connect errors, transport timeouts).
/// HTTP error statuses are never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    100
}

pub struct Endpoint {
    url: Url,
    method: Method,
    headers: HeaderMap,
    auth: Option<Arc<dyn AuthStrategy>>,
    retry: Option<RetryConfig>,
    client: reqwest::Client,
}

impl Endpoint {
    pub fn new(cfg: &EndpointConfig) -> Result<Self> {
        let auth = cfg.auth.as_ref().map(AuthConfig::build).transpose()?;
        let mut ep = Self::builder(&cfg.url, &cfg.method)?;
        for (name, value) in &cfg.headers {
            ep = ep.with_header(name, value)?;
        }
        if let Some(retry) = &cfg.retry {
            if retry.max_attempts == 0 {
                return Err(PortcullisError::configuration(
                    "endpoint retry.max_attempts must be at least 1",
                ));
            }
        }
        ep.auth = auth;
        ep.retry = cfg.retry.clone();
        Ok(ep)
    }

    /// Endpoint without auth, headers, or retry.
    pub fn builder(url: &str, method: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| {
            PortcullisError::configuration(format!("invalid endpoint url {url}: {e}"))
        })?;
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|_| {
            PortcullisError::configuration(format!("invalid endpoint method {method}"))
        })?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| PortcullisError::internal_caused_by("failed to create http client", e))?;

        Ok(Self {
            url,
            method,
            headers: HeaderMap::new(),
            auth: None,
            retry: None,
            client,
        })
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| PortcullisError::configuration(format!("invalid header name {name}")))?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            PortcullisError::configuration(format!("invalid value for header {name}"))
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthStrategy>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Build the request without applying auth.
    pub fn create_request(&self, body: Option<Bytes>) -> Result<Request> {
        let mut builder = self
            .client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());
        if let Some(body) = body {
            builder = builder.body(body);
        }
        builder
            .build()
            .map_err(|e| PortcullisError::internal_caused_by("failed to create request", e))
    }

    /// Send one request (retrying transport failures if configured) and
    /// return the body of a 2xx response.
    pub async fn send_request(&self, ctx: &Context, body: Option<Bytes>) -> Result<Bytes> {
        let (status, bytes) = self.execute(ctx, body).await?;
        if !status.is_success() {
            return Err(PortcullisError::Communication(format!(
                "unexpected response from {}: {status}",
                self.url
            )));
        }
        Ok(bytes)
    }

    /// Like [`Endpoint::send_request`] but hands back any status.
    pub async fn execute(&self, ctx: &Context, body: Option<Bytes>) -> Result<(StatusCode, Bytes)> {
        with_deadline(ctx, async {
            let resp = self.send_with_retry(ctx, body).await?;
            let status = resp.status();
            let bytes = resp
                .bytes()
                .await
                .map_err(|e| PortcullisError::internal_caused_by("failed to read response", e))?;
            Ok((status, bytes))
        })
        .await
    }

    async fn send_with_retry(&self, ctx: &Context, body: Option<Bytes>) -> Result<Response> {
        let max_attempts = self.retry.as_ref().map_or(1, |r| r.max_attempts.max(1));
        let mut attempt = 1;

        loop {
            let mut req = self.create_request(body.clone())?;
            if let Some(auth) = &self.auth {
                auth.apply(ctx, &mut req).await?;
            }

            match self.client.execute(req).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < max_attempts && (e.is_connect() || e.is_timeout()) => {
                    let backoff = self
                        .retry
                        .as_ref()
                        .map_or(0, |r| r.backoff_ms)
                        .saturating_mul(u64::from(attempt));
                    tracing::debug!(
                        url = %self.url,
                        attempt,
                        error = %e,
                        "endpoint call failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                Err(e) => return Err(map_transport_error(e)),
            }
        }
    }
}

pub(crate) fn map_transport_error(e: reqwest::Error) -> PortcullisError {
    if e.is_timeout() {
        PortcullisError::CommunicationTimeout(e.to_string())
    } else {
        PortcullisError::Communication(e.to_string())
    }
}

/// Bound `fut` by the context deadline. Expiry is reported as a
/// communication timeout.
pub async fn with_deadline<F, T>(ctx: &Context, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match ctx.deadline() {
        None => fut.await,
        Some(deadline) => {
            tokio::time::timeout_at(tokio::time::Instant::from_std(deadline), fut)
                .await
                .map_err(|_| PortcullisError::CommunicationTimeout("deadline exceeded".into()))?
        }
    }
}
