//! Built-in authenticators.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use portcullis_core::error::{PortcullisError, Result};
use portcullis_core::{AuthDataSource, Context, Subject, SubjectContext};

use super::{derive_config, parse_config, Authenticator, MechanismConfig, NoConfig};

/// Instantiate a prototype of the given kind.
pub fn new_authenticator(
    id: &str,
    kind: &str,
    config: Option<&MechanismConfig>,
) -> Result<Arc<dyn Authenticator>> {
    let a: Arc<dyn Authenticator> = match kind {
        "noop" => Arc::new(NoopAuthenticator::new(id, parse_config(kind, config)?)),
        "anonymous" => Arc::new(AnonymousAuthenticator::new(id, parse_config(kind, config)?)),
        "unauthorized" => Arc::new(UnauthorizedAuthenticator::new(id, parse_config(kind, config)?)),
        "basic_auth" => Arc::new(BasicAuthAuthenticator::new(id, parse_config(kind, config)?)?),
        other => {
            return Err(PortcullisError::configuration(format!(
                "unsupported authenticator type: {other}"
            )))
        }
    };
    Ok(a)
}

/// Lets every request through without establishing a subject.
pub struct NoopAuthenticator {
    id: String,
    config: NoConfig,
}

impl NoopAuthenticator {
    fn new(id: &str, config: NoConfig) -> Self {
        Self {
            id: id.to_string(),
            config,
        }
    }
}

#[async_trait]
impl Authenticator for NoopAuthenticator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn authenticate(
        &self,
        _ctx: &Context,
        _ads: &dyn AuthDataSource,
        _sc: &mut SubjectContext,
    ) -> Result<()> {
        Ok(())
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Authenticator>> {
        let cfg = derive_config("noop authenticator", &self.config, config)?;
        Ok(Arc::new(Self::new(&self.id, cfg)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnonymousConfig {
    #[serde(default = "default_anonymous_subject")]
    pub subject: String,
}

fn default_anonymous_subject() -> String {
    "anonymous".into()
}

/// Sets a fixed subject.
pub struct AnonymousAuthenticator {
    id: String,
    config: AnonymousConfig,
}

impl AnonymousAuthenticator {
    fn new(id: &str, config: AnonymousConfig) -> Self {
        Self {
            id: id.to_string(),
            config,
        }
    }
}

#[async_trait]
impl Authenticator for AnonymousAuthenticator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn authenticate(
        &self,
        _ctx: &Context,
        _ads: &dyn AuthDataSource,
        sc: &mut SubjectContext,
    ) -> Result<()> {
        sc.subject = Some(Subject::new(self.config.subject.clone()));
        Ok(())
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Authenticator>> {
        let cfg = derive_config("anonymous authenticator", &self.config, config)?;
        Ok(Arc::new(Self::new(&self.id, cfg)))
    }
}

/// Rejects every request.
pub struct UnauthorizedAuthenticator {
    id: String,
    config: NoConfig,
}

impl UnauthorizedAuthenticator {
    fn new(id: &str, config: NoConfig) -> Self {
        Self {
            id: id.to_string(),
            config,
        }
    }
}

#[async_trait]
impl Authenticator for UnauthorizedAuthenticator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn authenticate(
        &self,
        _ctx: &Context,
        _ads: &dyn AuthDataSource,
        _sc: &mut SubjectContext,
    ) -> Result<()> {
        Err(PortcullisError::Authentication("denied by authenticator".into()))
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Authenticator>> {
        let cfg = derive_config("unauthorized authenticator", &self.config, config)?;
        Ok(Arc::new(Self::new(&self.id, cfg)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicAuthConfig {
    pub user_id: String,
    pub password: String,
}

/// Checks `Authorization: Basic ...` against one configured credential pair.
pub struct BasicAuthAuthenticator {
    id: String,
    config: BasicAuthConfig,
}

impl BasicAuthAuthenticator {
    fn new(id: &str, config: BasicAuthConfig) -> Result<Self> {
        if config.user_id.is_empty() || config.password.is_empty() {
            return Err(PortcullisError::configuration(
                "basic_auth authenticator requires user_id and password",
            ));
        }
        Ok(Self {
            id: id.to_string(),
            config,
        })
    }

    fn credentials(ads: &dyn AuthDataSource) -> Result<(String, String)> {
        let header = ads
            .header("authorization")
            .ok_or_else(|| PortcullisError::Authentication("no authorization header".into()))?;
        let (scheme, encoded) = header.split_once(' ').ok_or_else(|| {
            PortcullisError::Authentication("malformed authorization header".into())
        })?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(PortcullisError::Authentication(format!(
                "unexpected authorization scheme: {scheme}"
            )));
        }

        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| PortcullisError::Authentication("credentials not base64".into()))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| PortcullisError::Authentication("credentials not utf-8".into()))?;
        let (user, password) = decoded
            .split_once(':')
            .ok_or_else(|| PortcullisError::Authentication("malformed credentials".into()))?;

        Ok((user.to_string(), password.to_string()))
    }
}

#[async_trait]
impl Authenticator for BasicAuthAuthenticator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn authenticate(
        &self,
        _ctx: &Context,
        ads: &dyn AuthDataSource,
        sc: &mut SubjectContext,
    ) -> Result<()> {
        let (user, password) = Self::credentials(ads)?;
        if user != self.config.user_id || password != self.config.password {
            return Err(PortcullisError::Authentication("invalid credentials".into()));
        }

        sc.subject = Some(Subject::new(user));
        Ok(())
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Authenticator>> {
        let cfg = derive_config("basic_auth authenticator", &self.config, config)?;
        Ok(Arc::new(Self::new(&self.id, cfg)?))
    }
}
