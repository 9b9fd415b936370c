//! Gateway config loader (strict parsing).

pub mod schema;

use std::fs;

use portcullis_core::error::{PortcullisError, Result};

pub use schema::{
    GatewayConfig, MatchConfig, MechanismConfig, MechanismDef, MechanismsSection, PipelineRef,
    PipelineSection, RuleConfig, ServeSection,
};

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| PortcullisError::internal_caused_by(format!("read config {path} failed"), e))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| PortcullisError::configuration(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
