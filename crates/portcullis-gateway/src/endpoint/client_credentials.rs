//! OAuth2 client-credentials grant with a single-slot token cache.
//!
//! The cache is the only shared mutable state on the request path. Reads
//! take the shared lock; the exclusive lock is held only for the swap and
//! never across the token endpoint call. Two callers that see an expired
//! token at the same time both fetch, and the later write wins. Tokens are
//! interchangeable, so this only costs a redundant call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Request;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use portcullis_core::error::{PortcullisError, Result};
use portcullis_core::Context;

use super::auth::{AuthStrategy, BasicAuthStrategy};
use super::Endpoint;

/// A cached token is only used while it has more than this left.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(15);

/// Longer `expires_in` values are clamped to this.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientCredentialsConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: Instant,
}

impl CachedToken {
    /// More than [`EXPIRY_MARGIN`] of lifetime left at `now`.
    pub fn is_usable_at(&self, now: Instant) -> bool {
        now + EXPIRY_MARGIN < self.expires_at
    }

    pub fn header_value(&self) -> Result<HeaderValue> {
        HeaderValue::from_str(&format!("{} {}", self.token_type, self.access_token))
            .map_err(|e| PortcullisError::internal_caused_by("token not usable as header value", e))
    }
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    token_type: String,
    /// Seconds, relative to issuance.
    expires_in: u64,
}

pub struct ClientCredentialsStrategy {
    config: ClientCredentialsConfig,
    token_endpoint: Endpoint,
    last_token: RwLock<Option<CachedToken>>,
}

impl ClientCredentialsStrategy {
    pub fn new(config: ClientCredentialsConfig) -> Result<Self> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(PortcullisError::configuration(
                "client_credentials auth requires client_id and client_secret",
            ));
        }

        // client id and secret are form-url-encoded before basic auth (RFC 6749, 2.3.1)
        let credentials = BasicAuthStrategy::new(
            form_urlencoded::byte_serialize(config.client_id.as_bytes()).collect::<String>(),
            form_urlencoded::byte_serialize(config.client_secret.as_bytes()).collect::<String>(),
        );
        let token_endpoint = Endpoint::builder(&config.token_url, "POST")?
            .with_header("content-type", "application/x-www-form-urlencoded")?
            .with_header("accept", "application/json")?
            .with_auth(Arc::new(credentials));

        Ok(Self {
            config,
            token_endpoint,
            last_token: RwLock::new(None),
        })
    }

    /// Cached token, if it is still usable.
    pub fn cached_token(&self) -> Option<CachedToken> {
        let now = Instant::now();
        self.last_token
            .read()
            .as_ref()
            .filter(|t| t.is_usable_at(now))
            .cloned()
    }

    fn request_body(&self) -> String {
        let mut form = form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", "client_credentials");
        if !self.config.scopes.is_empty() {
            form.append_pair("scope", &self.config.scopes.join(" "));
        }
        form.finish()
    }

    async fn fetch_token(&self, ctx: &Context) -> Result<CachedToken> {
        tracing::debug!(
            token_url = %self.token_endpoint.url(),
            client_id = %self.config.client_id,
            "requesting access token"
        );

        let raw = self
            .token_endpoint
            .send_request(ctx, Some(Bytes::from(self.request_body())))
            .await?;
        let resp: TokenEndpointResponse = serde_json::from_slice(&raw).map_err(|e| {
            PortcullisError::internal_caused_by("failed to unmarshal token endpoint response", e)
        })?;

        let lifetime = Duration::from_secs(resp.expires_in).min(MAX_TOKEN_LIFETIME);
        let expires_at = Instant::now()
            .checked_add(lifetime)
            .ok_or_else(|| PortcullisError::internal("token expiry not representable"))?;

        Ok(CachedToken {
            access_token: resp.access_token,
            token_type: resp.token_type,
            expires_at,
        })
    }
}

#[async_trait]
impl AuthStrategy for ClientCredentialsStrategy {
    async fn apply(&self, ctx: &Context, req: &mut Request) -> Result<()> {
        let token = match self.cached_token() {
            Some(token) => token,
            None => {
                let token = self.fetch_token(ctx).await?;
                *self.last_token.write() = Some(token.clone());
                token
            }
        };

        req.headers_mut().insert(AUTHORIZATION, token.header_value()?);
        Ok(())
    }
}
