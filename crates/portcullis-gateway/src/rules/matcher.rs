//! Minimal request matching: path prefix plus optional method list.

use crate::config::MatchConfig;

#[derive(Debug, Clone)]
pub struct RuleMatcher {
    path_prefix: String,
    methods: Vec<String>,
}

impl RuleMatcher {
    pub fn new(cfg: &MatchConfig) -> Self {
        Self {
            path_prefix: cfg.path_prefix.clone(),
            methods: cfg.methods.iter().map(|m| m.to_ascii_uppercase()).collect(),
        }
    }

    pub fn matches(&self, method: &str, path: &str) -> bool {
        if !path.starts_with(&self.path_prefix) {
            return false;
        }
        self.methods.is_empty() || self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

impl Default for RuleMatcher {
    fn default() -> Self {
        Self::new(&MatchConfig::default())
    }
}
