//! Shared application state for the Portcullis gateway.
//!
//! Holds the compiled configuration (mechanism prototypes + rules) behind a
//! lock that is only taken to clone or swap the current snapshot. A reload
//! builds the complete new snapshot first, so a bad config never replaces a
//! working one.

use std::sync::Arc;

use parking_lot::RwLock;

use portcullis_core::error::Result;

use crate::config::GatewayConfig;
use crate::mechanisms::MechanismFactory;
use crate::rules::RuleSet;

#[derive(Clone)]
pub struct AppState {
    current: Arc<RwLock<Arc<Snapshot>>>,
}

/// One compiled configuration.
pub struct Snapshot {
    pub cfg: GatewayConfig,
    pub rules: RuleSet,
}

impl Snapshot {
    fn build(cfg: GatewayConfig) -> Result<Self> {
        let factory = MechanismFactory::new(&cfg.mechanisms)?;
        let rules = RuleSet::build(&factory, &cfg)?;
        Ok(Self { cfg, rules })
    }
}

impl AppState {
    /// Build application state.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        let snapshot = Snapshot::build(cfg)?;
        tracing::info!(rules = snapshot.rules.len(), "rules loaded");

        Ok(Self {
            current: Arc::new(RwLock::new(Arc::new(snapshot))),
        })
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Replace the running configuration. On error the previous one keeps
    /// serving.
    pub fn reload(&self, cfg: GatewayConfig) -> Result<()> {
        let snapshot = Snapshot::build(cfg).map_err(|e| {
            tracing::warn!(error = %e, "config reload refused");
            e
        })?;
        tracing::info!(rules = snapshot.rules.len(), "rules reloaded");

        *self.current.write() = Arc::new(snapshot);
        Ok(())
    }
}
