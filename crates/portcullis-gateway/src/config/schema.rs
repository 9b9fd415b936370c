use std::collections::HashSet;

use serde::Deserialize;
use portcullis_core::error::{Category, PortcullisError, Result};

/// Raw, mechanism-specific configuration. Each mechanism kind parses it into
/// its own typed config.
pub type MechanismConfig = serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub serve: ServeSection,

    #[serde(default)]
    pub mechanisms: MechanismsSection,

    #[serde(default)]
    pub default_pipeline: PipelineSection,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PortcullisError::configuration(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.serve.validate()?;
        self.mechanisms.validate()?;

        let mut seen = HashSet::new();
        for rule in &self.rules {
            rule.validate()?;
            if !seen.insert(rule.id.as_str()) {
                return Err(PortcullisError::configuration(format!(
                    "duplicate rule id: {}",
                    rule.id
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServeSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Deadline applied to every rule execution.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ServeSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ServeSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=60000).contains(&self.timeout_ms) {
            return Err(PortcullisError::configuration(
                "serve.timeout_ms must be between 100 and 60000",
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:4456".into()
}
fn default_timeout_ms() -> u64 {
    5000
}

/// One prototype definition: `{ id, type, config }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MechanismDef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: Option<MechanismConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MechanismsSection {
    #[serde(default)]
    pub authenticators: Vec<MechanismDef>,
    #[serde(default)]
    pub authorizers: Vec<MechanismDef>,
    #[serde(default, alias = "contextualizers")]
    pub hydrators: Vec<MechanismDef>,
    #[serde(default, alias = "finalizers")]
    pub mutators: Vec<MechanismDef>,
    #[serde(default)]
    pub error_handlers: Vec<MechanismDef>,
}

impl MechanismsSection {
    pub fn defs(&self, category: Category) -> &[MechanismDef] {
        match category {
            Category::Authenticator => &self.authenticators,
            Category::Authorizer => &self.authorizers,
            Category::Hydrator => &self.hydrators,
            Category::Mutator => &self.mutators,
            Category::ErrorHandler => &self.error_handlers,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for category in ALL_CATEGORIES {
            for def in self.defs(category) {
                if def.id.trim().is_empty() {
                    return Err(PortcullisError::configuration(format!(
                        "{category} of type {} has an empty id",
                        def.kind
                    )));
                }
            }
        }
        Ok(())
    }
}

pub const ALL_CATEGORIES: [Category; 5] = [
    Category::Authenticator,
    Category::Authorizer,
    Category::Hydrator,
    Category::Mutator,
    Category::ErrorHandler,
];

/// Pointer to a prototype plus optional inline override.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineRef {
    pub id: String,
    #[serde(default)]
    pub config: Option<MechanismConfig>,
}

impl PipelineRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            config: None,
        }
    }

    pub fn with_config(id: impl Into<String>, config: MechanismConfig) -> Self {
        Self {
            id: id.into(),
            config: Some(config),
        }
    }
}

/// Pipeline-wide defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSection {
    #[serde(default)]
    pub authenticators: Vec<PipelineRef>,
    #[serde(default)]
    pub authorizers: Vec<PipelineRef>,
    #[serde(default, alias = "contextualizers")]
    pub hydrators: Vec<PipelineRef>,
    #[serde(default, alias = "finalizers")]
    pub mutators: Vec<PipelineRef>,
    #[serde(default)]
    pub error_handlers: Vec<PipelineRef>,
}

impl PipelineSection {
    pub fn refs(&self, category: Category) -> &[PipelineRef] {
        match category {
            Category::Authenticator => &self.authenticators,
            Category::Authorizer => &self.authorizers,
            Category::Hydrator => &self.hydrators,
            Category::Mutator => &self.mutators,
            Category::ErrorHandler => &self.error_handlers,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub id: String,

    #[serde(rename = "match", default)]
    pub matcher: MatchConfig,

    #[serde(default)]
    pub authenticators: Vec<PipelineRef>,
    #[serde(default)]
    pub authorizers: Vec<PipelineRef>,
    #[serde(default, alias = "contextualizers")]
    pub hydrators: Vec<PipelineRef>,
    #[serde(default, alias = "finalizers")]
    pub mutators: Vec<PipelineRef>,
    #[serde(default)]
    pub error_handlers: Vec<PipelineRef>,
}

impl RuleConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            matcher: MatchConfig::default(),
            authenticators: Vec::new(),
            authorizers: Vec::new(),
            hydrators: Vec::new(),
            mutators: Vec::new(),
            error_handlers: Vec::new(),
        }
    }

    pub fn refs(&self, category: Category) -> &[PipelineRef] {
        match category {
            Category::Authenticator => &self.authenticators,
            Category::Authorizer => &self.authorizers,
            Category::Hydrator => &self.hydrators,
            Category::Mutator => &self.mutators,
            Category::ErrorHandler => &self.error_handlers,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(PortcullisError::configuration("rule id must not be empty"));
        }
        if !self.matcher.path_prefix.starts_with('/') {
            return Err(PortcullisError::configuration(format!(
                "rule {}: match.path_prefix must start with '/'",
                self.id
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchConfig {
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
    /// Empty means any method.
    #[serde(default)]
    pub methods: Vec<String>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            path_prefix: default_path_prefix(),
            methods: Vec::new(),
        }
    }
}

fn default_path_prefix() -> String {
    "/".into()
}
