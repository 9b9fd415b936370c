//! Built-in mutators (a.k.a. finalizers).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use portcullis_core::error::{PortcullisError, Result};
use portcullis_core::{Context, SubjectContext};

use super::{derive_config, parse_config, render_template, MechanismConfig, Mutator, NoConfig};

pub fn new_mutator(
    id: &str,
    kind: &str,
    config: Option<&MechanismConfig>,
) -> Result<Arc<dyn Mutator>> {
    let m: Arc<dyn Mutator> = match kind {
        "noop" => Arc::new(NoopMutator::new(id, parse_config(kind, config)?)),
        "header" => Arc::new(TemplateMutator::new(
            id,
            Target::Header,
            parse_config(kind, config)?,
        )?),
        "cookie" => Arc::new(TemplateMutator::new(
            id,
            Target::Cookie,
            parse_config(kind, config)?,
        )?),
        other => {
            return Err(PortcullisError::configuration(format!(
                "unsupported mutator type: {other}"
            )))
        }
    };
    Ok(m)
}

pub struct NoopMutator {
    id: String,
    config: NoConfig,
}

impl NoopMutator {
    fn new(id: &str, config: NoConfig) -> Self {
        Self {
            id: id.to_string(),
            config,
        }
    }
}

#[async_trait]
impl Mutator for NoopMutator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn mutate(&self, _ctx: &Context, _sc: &mut SubjectContext) -> Result<()> {
        Ok(())
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Mutator>> {
        let cfg = derive_config("noop mutator", &self.config, config)?;
        Ok(Arc::new(Self::new(&self.id, cfg)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Header,
    Cookie,
}

impl Target {
    fn kind(self) -> &'static str {
        match self {
            Target::Header => "header mutator",
            Target::Cookie => "cookie mutator",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateMutatorConfig {
    /// name -> template
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// Renders `{subject}` / `{attr:<name>}` templates into upstream headers or
/// cookies.
pub struct TemplateMutator {
    id: String,
    target: Target,
    config: TemplateMutatorConfig,
}

impl TemplateMutator {
    fn new(id: &str, target: Target, config: TemplateMutatorConfig) -> Result<Self> {
        if config.values.is_empty() {
            return Err(PortcullisError::configuration(format!(
                "{} requires at least one entry in values",
                target.kind()
            )));
        }
        Ok(Self {
            id: id.to_string(),
            target,
            config,
        })
    }
}

#[async_trait]
impl Mutator for TemplateMutator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn mutate(&self, _ctx: &Context, sc: &mut SubjectContext) -> Result<()> {
        // render everything first so a failing template leaves sc untouched
        let mut rendered = Vec::with_capacity(self.config.values.len());
        for (name, template) in &self.config.values {
            rendered.push((name.clone(), render_template(template, sc)?));
        }

        let out = match self.target {
            Target::Header => &mut sc.headers,
            Target::Cookie => &mut sc.cookies,
        };
        out.extend(rendered);
        Ok(())
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Mutator>> {
        let cfg = derive_config(self.target.kind(), &self.config, config)?;
        Ok(Arc::new(Self::new(&self.id, self.target, cfg)?))
    }
}
