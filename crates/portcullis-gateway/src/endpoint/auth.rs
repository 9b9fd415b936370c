//! Request-level auth decorators for outbound calls.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, COOKIE};
use reqwest::Request;
use serde::{Deserialize, Serialize};

use portcullis_core::error::{PortcullisError, Result};
use portcullis_core::Context;

use super::client_credentials::{ClientCredentialsConfig, ClientCredentialsStrategy};

/// Decorates an outgoing request with credentials.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    async fn apply(&self, ctx: &Context, req: &mut Request) -> Result<()>;
}

/// `{ type: basic_auth | api_key | client_credentials, config: {...} }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum AuthConfig {
    BasicAuth(BasicAuthStrategy),
    ApiKey(ApiKeyStrategy),
    ClientCredentials(ClientCredentialsConfig),
}

impl AuthConfig {
    /// Build a strategy. Each call yields an independent instance, so a
    /// client-credentials strategy always starts with an empty cache.
    pub fn build(&self) -> Result<Arc<dyn AuthStrategy>> {
        let strategy: Arc<dyn AuthStrategy> = match self {
            AuthConfig::BasicAuth(s) => Arc::new(s.clone()),
            AuthConfig::ApiKey(s) => {
                s.validate()?;
                Arc::new(s.clone())
            }
            AuthConfig::ClientCredentials(c) => {
                Arc::new(ClientCredentialsStrategy::new(c.clone())?)
            }
        };
        Ok(strategy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicAuthStrategy {
    pub user: String,
    pub password: String,
}

impl BasicAuthStrategy {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn header_value(&self) -> Result<HeaderValue> {
        let encoded = STANDARD.encode(format!("{}:{}", self.user, self.password));
        HeaderValue::from_str(&format!("Basic {encoded}"))
            .map_err(|e| PortcullisError::internal_caused_by("invalid basic auth header", e))
    }
}

#[async_trait]
impl AuthStrategy for BasicAuthStrategy {
    async fn apply(&self, _ctx: &Context, req: &mut Request) -> Result<()> {
        req.headers_mut().insert(AUTHORIZATION, self.header_value()?);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyLocation {
    Header,
    Cookie,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyStrategy {
    #[serde(rename = "in")]
    pub location: ApiKeyLocation,
    pub name: String,
    pub value: String,
}

impl ApiKeyStrategy {
    fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.value.is_empty() {
            return Err(PortcullisError::configuration(
                "api_key auth requires name and value",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthStrategy for ApiKeyStrategy {
    async fn apply(&self, _ctx: &Context, req: &mut Request) -> Result<()> {
        match self.location {
            ApiKeyLocation::Header => {
                let name = HeaderName::from_bytes(self.name.as_bytes()).map_err(|e| {
                    PortcullisError::internal_caused_by("invalid api key header name", e)
                })?;
                let value = HeaderValue::from_str(&self.value).map_err(|e| {
                    PortcullisError::internal_caused_by("invalid api key header value", e)
                })?;
                req.headers_mut().insert(name, value);
            }
            ApiKeyLocation::Cookie => {
                let value = HeaderValue::from_str(&format!("{}={}", self.name, self.value))
                    .map_err(|e| PortcullisError::internal_caused_by("invalid api key cookie", e))?;
                req.headers_mut().append(COOKIE, value);
            }
        }
        Ok(())
    }
}
