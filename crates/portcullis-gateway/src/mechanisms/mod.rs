//! Pipeline mechanisms: capability traits, built-in kinds, prototype
//! repository and factory.
//!
//! Every category has its own object-safe trait. Concrete kinds are chosen
//! by the `type` tag of a mechanism definition and dispatched dynamically.
//! Every mechanism can derive a reconfigured copy of itself through
//! `with_config`; the receiver is never touched.

pub mod authenticators;
pub mod authorizers;
pub mod error_handlers;
pub mod factory;
pub mod hydrators;
pub mod mutators;
pub mod repository;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use portcullis_core::error::{PortcullisError, Result};
use portcullis_core::{AuthDataSource, Context, SubjectContext};

pub use crate::config::MechanismConfig;
pub use factory::MechanismFactory;
pub use repository::PrototypeRepository;

#[async_trait]
pub trait Authenticator: Send + Sync {
    fn id(&self) -> &str;
    async fn authenticate(
        &self,
        ctx: &Context,
        ads: &dyn AuthDataSource,
        sc: &mut SubjectContext,
    ) -> Result<()>;
    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Authenticator>>;
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    fn id(&self) -> &str;
    async fn authorize(&self, ctx: &Context, sc: &SubjectContext) -> Result<()>;
    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Authorizer>>;
}

#[async_trait]
pub trait Hydrator: Send + Sync {
    fn id(&self) -> &str;
    async fn hydrate(&self, ctx: &Context, sc: &mut SubjectContext) -> Result<()>;
    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Hydrator>>;
}

#[async_trait]
pub trait Mutator: Send + Sync {
    fn id(&self) -> &str;
    async fn mutate(&self, ctx: &Context, sc: &mut SubjectContext) -> Result<()>;
    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Mutator>>;
}

/// Handles a pipeline failure.
///
/// `Ok` means "handled, respond with this". `Err` means the handler declined
/// and the next one should be tried.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    fn id(&self) -> &str;
    async fn handle_error(&self, ctx: &Context, err: &PortcullisError) -> Result<ErrorResponse>;
    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn ErrorHandler>>;
}

/// Response an error handler decided to send instead of forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// True for an absent override: `null` or `{}`.
pub fn is_empty_config(config: &MechanismConfig) -> bool {
    match config {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Parse the prototype configuration of a mechanism kind. A missing config
/// block is treated as an empty object so defaults apply.
pub(crate) fn parse_config<C: DeserializeOwned>(
    kind: &str,
    raw: Option<&MechanismConfig>,
) -> Result<C> {
    let value = match raw {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(v) => v.clone(),
    };
    serde_json::from_value(value)
        .map_err(|e| PortcullisError::configuration(format!("invalid {kind} config: {e}")))
}

/// Copy-with-override: the base config is serialized, the override is
/// deep-merged over it and the result parsed again. `base` is never
/// modified.
pub(crate) fn derive_config<C>(kind: &str, base: &C, overrides: &MechanismConfig) -> Result<C>
where
    C: Serialize + DeserializeOwned,
{
    let mut merged = serde_json::to_value(base).map_err(|e| {
        PortcullisError::internal_caused_by(format!("{kind} config not serializable"), e)
    })?;
    merge_values(&mut merged, overrides);
    serde_json::from_value(merged)
        .map_err(|e| PortcullisError::configuration(format!("invalid {kind} override: {e}")))
}

fn merge_values(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(t), Value::Object(p)) => {
            for (k, v) in p {
                merge_values(t.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
        (t, p) => *t = p.clone(),
    }
}

/// Placeholder rendering shared by header and cookie mutators:
/// `{subject}` and `{attr:<name>}`.
pub(crate) fn render_template(template: &str, sc: &SubjectContext) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            PortcullisError::Mutation(format!("unterminated placeholder in {template:?}"))
        })?;
        let key = &after[..end];

        if key == "subject" {
            let id = sc
                .subject_id()
                .ok_or_else(|| PortcullisError::Mutation("no subject available".into()))?;
            out.push_str(id);
        } else if let Some(name) = key.strip_prefix("attr:") {
            let value = sc.attribute_str(name).ok_or_else(|| {
                PortcullisError::Mutation(format!("attribute {name} not available"))
            })?;
            out.push_str(&value);
        } else {
            return Err(PortcullisError::Mutation(format!(
                "unknown placeholder {{{key}}}"
            )));
        }

        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Config for kinds that take no options.
#[derive(Debug, Clone, Default, Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct NoConfig {}
