//! Subject and per-request subject context.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Authenticated principal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    #[serde(default)]
    pub claims: Map<String, Value>,
}

impl Subject {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            claims: Map::new(),
        }
    }
}

/// Mutable accumulator threaded through the four stages of one rule
/// execution.
///
/// Created fresh per call and owned by that call only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubjectContext {
    /// Set by authenticators.
    pub subject: Option<Subject>,
    /// Set by hydrators.
    pub attributes: Map<String, Value>,
    /// Headers to forward upstream (set by mutators).
    pub headers: BTreeMap<String, String>,
    /// Cookies to forward upstream (set by mutators).
    pub cookies: BTreeMap<String, String>,
}

impl SubjectContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.subject.as_ref().map(|s| s.id.as_str())
    }

    /// Attribute rendered as a plain string (strings unquoted, other JSON
    /// values in compact form).
    pub fn attribute_str(&self, name: &str) -> Option<String> {
        self.attributes.get(name).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}
