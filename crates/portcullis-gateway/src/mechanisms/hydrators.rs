//! Built-in hydrators (a.k.a. contextualizers).

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use portcullis_core::error::{PortcullisError, Result};
use portcullis_core::{Context, SubjectContext};

use super::{derive_config, parse_config, Hydrator, MechanismConfig};
use crate::endpoint::{Endpoint, EndpointConfig};

pub fn new_hydrator(
    id: &str,
    kind: &str,
    config: Option<&MechanismConfig>,
) -> Result<Arc<dyn Hydrator>> {
    let h: Arc<dyn Hydrator> = match kind {
        "static" => Arc::new(StaticHydrator::new(id, parse_config(kind, config)?)),
        "generic" => Arc::new(GenericHydrator::new(id, parse_config(kind, config)?)?),
        other => {
            return Err(PortcullisError::configuration(format!(
                "unsupported hydrator type: {other}"
            )))
        }
    };
    Ok(h)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticHydratorConfig {
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Merges a fixed attribute set into the subject context.
pub struct StaticHydrator {
    id: String,
    config: StaticHydratorConfig,
}

impl StaticHydrator {
    fn new(id: &str, config: StaticHydratorConfig) -> Self {
        Self {
            id: id.to_string(),
            config,
        }
    }
}

#[async_trait]
impl Hydrator for StaticHydrator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn hydrate(&self, _ctx: &Context, sc: &mut SubjectContext) -> Result<()> {
        for (k, v) in &self.config.attributes {
            sc.attributes.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Hydrator>> {
        let cfg = derive_config("static hydrator", &self.config, config)?;
        Ok(Arc::new(Self::new(&self.id, cfg)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenericHydratorConfig {
    pub endpoint: EndpointConfig,
    /// Continue without the attribute when the call fails.
    #[serde(default)]
    pub continue_on_error: bool,
}

/// Calls an endpoint with the subject and stores the JSON response under
/// the hydrator id.
pub struct GenericHydrator {
    id: String,
    config: GenericHydratorConfig,
    endpoint: Endpoint,
}

impl GenericHydrator {
    fn new(id: &str, config: GenericHydratorConfig) -> Result<Self> {
        let endpoint = Endpoint::new(&config.endpoint)?;
        Ok(Self {
            id: id.to_string(),
            config,
            endpoint,
        })
    }

    async fn fetch(&self, ctx: &Context, sc: &SubjectContext) -> Result<Value> {
        let body = serde_json::to_vec(&json!({ "subject": sc.subject })).map_err(|e| {
            PortcullisError::internal_caused_by("failed to encode hydration request", e)
        })?;
        let raw = self.endpoint.send_request(ctx, Some(Bytes::from(body))).await?;
        serde_json::from_slice(&raw).map_err(|e| {
            PortcullisError::Hydration(format!("{}: response is not json: {e}", self.id))
        })
    }
}

#[async_trait]
impl Hydrator for GenericHydrator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn hydrate(&self, ctx: &Context, sc: &mut SubjectContext) -> Result<()> {
        match self.fetch(ctx, sc).await {
            Ok(value) => {
                sc.attributes.insert(self.id.clone(), value);
                Ok(())
            }
            Err(e) if self.config.continue_on_error && !e.is_timeout() => {
                tracing::warn!(hydrator = %self.id, error = %e, "hydration failed, continuing");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Hydrator>> {
        let cfg = derive_config("generic hydrator", &self.config, config)?;
        Ok(Arc::new(Self::new(&self.id, cfg)?))
    }
}
