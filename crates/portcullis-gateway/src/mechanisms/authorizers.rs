//! Built-in authorizers.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use portcullis_core::error::{PortcullisError, Result};
use portcullis_core::{Context, SubjectContext};

use super::{derive_config, parse_config, Authorizer, MechanismConfig, NoConfig};
use crate::endpoint::{Endpoint, EndpointConfig};

pub fn new_authorizer(
    id: &str,
    kind: &str,
    config: Option<&MechanismConfig>,
) -> Result<Arc<dyn Authorizer>> {
    let a: Arc<dyn Authorizer> = match kind {
        "allow" => Arc::new(StaticAuthorizer::new(id, true, parse_config(kind, config)?)),
        "deny" => Arc::new(StaticAuthorizer::new(id, false, parse_config(kind, config)?)),
        "remote" => Arc::new(RemoteAuthorizer::new(id, parse_config(kind, config)?)?),
        other => {
            return Err(PortcullisError::configuration(format!(
                "unsupported authorizer type: {other}"
            )))
        }
    };
    Ok(a)
}

/// `allow` / `deny`.
pub struct StaticAuthorizer {
    id: String,
    allow: bool,
    config: NoConfig,
}

impl StaticAuthorizer {
    fn new(id: &str, allow: bool, config: NoConfig) -> Self {
        Self {
            id: id.to_string(),
            allow,
            config,
        }
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn authorize(&self, _ctx: &Context, _sc: &SubjectContext) -> Result<()> {
        if self.allow {
            Ok(())
        } else {
            Err(PortcullisError::Authorization("denied by authorizer".into()))
        }
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Authorizer>> {
        let cfg = derive_config("static authorizer", &self.config, config)?;
        Ok(Arc::new(Self::new(&self.id, self.allow, cfg)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteAuthorizerConfig {
    pub endpoint: EndpointConfig,
}

/// Asks a remote decision service. The subject and attributes are posted as
/// JSON; 2xx grants, 401/403 deny, anything else is a communication error.
pub struct RemoteAuthorizer {
    id: String,
    config: RemoteAuthorizerConfig,
    endpoint: Endpoint,
}

impl RemoteAuthorizer {
    fn new(id: &str, config: RemoteAuthorizerConfig) -> Result<Self> {
        let mut endpoint = Endpoint::new(&config.endpoint)?;
        if !config
            .endpoint
            .headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case("content-type"))
        {
            endpoint = endpoint.with_header("content-type", "application/json")?;
        }

        Ok(Self {
            id: id.to_string(),
            config,
            endpoint,
        })
    }
}

#[async_trait]
impl Authorizer for RemoteAuthorizer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn authorize(&self, ctx: &Context, sc: &SubjectContext) -> Result<()> {
        let body = serde_json::to_vec(&json!({
            "subject": sc.subject,
            "attributes": sc.attributes,
        }))
        .map_err(|e| {
            PortcullisError::internal_caused_by("failed to encode authorization request", e)
        })?;

        let (status, _) = self.endpoint.execute(ctx, Some(Bytes::from(body))).await?;
        match status {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PortcullisError::Authorization(
                format!("denied by {}", self.endpoint.url()),
            )),
            s => Err(PortcullisError::Communication(format!(
                "unexpected response from {}: {s}",
                self.endpoint.url()
            ))),
        }
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Authorizer>> {
        let cfg = derive_config("remote authorizer", &self.config, config)?;
        Ok(Arc::new(Self::new(&self.id, cfg)?))
    }
}
