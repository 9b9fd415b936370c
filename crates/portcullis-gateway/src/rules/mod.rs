//! Rules: composite chains, rule execution, and construction from config.

pub mod builder;
pub mod composite;
pub mod matcher;
pub mod rule;

use std::sync::Arc;

use portcullis_core::error::Result;

pub use builder::build_rule;
pub use composite::{
    Composite, CompositeAuthenticator, CompositeAuthorizer, CompositeErrorHandler,
    CompositeHydrator, CompositeMutator,
};
pub use matcher::RuleMatcher;
pub use rule::{Decision, Rule};

use crate::config::GatewayConfig;
use crate::mechanisms::MechanismFactory;

/// All rules of one configuration, in declaration order.
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Arc<Rule>>,
}

impl RuleSet {
    /// Build every rule; a single failing rule fails the whole set.
    pub fn build(factory: &MechanismFactory, cfg: &GatewayConfig) -> Result<Self> {
        let mut rules = Vec::with_capacity(cfg.rules.len());
        for rc in &cfg.rules {
            let rule = build_rule(factory, &cfg.default_pipeline, rc).map_err(|e| {
                tracing::warn!(rule = %rc.id, error = %e, "rule build failed");
                e
            })?;
            rules.push(Arc::new(rule));
        }
        Ok(Self { rules })
    }

    /// First rule matching the request.
    pub fn find(&self, method: &str, path: &str) -> Option<Arc<Rule>> {
        self.rules.iter().find(|r| r.matches(method, path)).cloned()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Rule>> {
        self.rules.iter().find(|r| r.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
