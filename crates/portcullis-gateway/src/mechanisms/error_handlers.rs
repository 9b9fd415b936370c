//! Built-in error handlers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use portcullis_core::error::{ErrorCode, PortcullisError, Result};
use portcullis_core::Context;

use super::{derive_config, parse_config, ErrorHandler, ErrorResponse, MechanismConfig, NoConfig};

pub fn new_error_handler(
    id: &str,
    kind: &str,
    config: Option<&MechanismConfig>,
) -> Result<Arc<dyn ErrorHandler>> {
    let eh: Arc<dyn ErrorHandler> = match kind {
        "default" => Arc::new(DefaultErrorHandler::new(id, parse_config(kind, config)?)),
        "redirect" => Arc::new(RedirectErrorHandler::new(id, parse_config(kind, config)?)?),
        "www_authenticate" => Arc::new(WwwAuthenticateErrorHandler::new(
            id,
            parse_config(kind, config)?,
        )?),
        other => {
            return Err(PortcullisError::configuration(format!(
                "unsupported error handler type: {other}"
            )))
        }
    };
    Ok(eh)
}

/// HTTP status for an error nobody handled more specifically.
pub fn status_for(err: &PortcullisError) -> StatusCode {
    match err.root().code() {
        ErrorCode::Authentication => StatusCode::UNAUTHORIZED,
        ErrorCode::Authorization => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Communication => StatusCode::BAD_GATEWAY,
        ErrorCode::CommunicationTimeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn parse_codes(kind: &str, raw: &[String]) -> Result<Vec<ErrorCode>> {
    raw.iter()
        .map(|c| {
            ErrorCode::parse(c).ok_or_else(|| {
                PortcullisError::configuration(format!("{kind}: unknown error code in when: {c}"))
            })
        })
        .collect()
}

/// Always handles; the status follows the error code.
pub struct DefaultErrorHandler {
    id: String,
    config: NoConfig,
}

impl DefaultErrorHandler {
    fn new(id: &str, config: NoConfig) -> Self {
        Self {
            id: id.to_string(),
            config,
        }
    }
}

#[async_trait]
impl ErrorHandler for DefaultErrorHandler {
    fn id(&self) -> &str {
        &self.id
    }

    async fn handle_error(&self, _ctx: &Context, err: &PortcullisError) -> Result<ErrorResponse> {
        Ok(ErrorResponse::new(status_for(err)))
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn ErrorHandler>> {
        let cfg = derive_config("default error handler", &self.config, config)?;
        Ok(Arc::new(Self::new(&self.id, cfg)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedirectConfig {
    pub to: String,
    #[serde(default = "default_redirect_code")]
    pub code: u16,
    #[serde(default = "default_when")]
    pub when: Vec<String>,
}

fn default_redirect_code() -> u16 {
    302
}

fn default_when() -> Vec<String> {
    vec![ErrorCode::Authentication.as_str().to_string()]
}

/// Redirects (e.g. to a login page) for the configured error codes.
pub struct RedirectErrorHandler {
    id: String,
    config: RedirectConfig,
    status: StatusCode,
    when: Vec<ErrorCode>,
}

impl RedirectErrorHandler {
    fn new(id: &str, config: RedirectConfig) -> Result<Self> {
        let status = match config.code {
            302 => StatusCode::FOUND,
            303 => StatusCode::SEE_OTHER,
            307 => StatusCode::TEMPORARY_REDIRECT,
            other => {
                return Err(PortcullisError::configuration(format!(
                    "redirect error handler: unsupported code {other}"
                )))
            }
        };
        url::Url::parse(&config.to).map_err(|e| {
            PortcullisError::configuration(format!("redirect error handler: invalid to: {e}"))
        })?;
        let when = parse_codes("redirect error handler", &config.when)?;

        Ok(Self {
            id: id.to_string(),
            config,
            status,
            when,
        })
    }
}

#[async_trait]
impl ErrorHandler for RedirectErrorHandler {
    fn id(&self) -> &str {
        &self.id
    }

    async fn handle_error(&self, _ctx: &Context, err: &PortcullisError) -> Result<ErrorResponse> {
        if !self.when.contains(&err.root().code()) {
            return Err(err.clone());
        }
        Ok(ErrorResponse::new(self.status).with_header("location", self.config.to.clone()))
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn ErrorHandler>> {
        let cfg = derive_config("redirect error handler", &self.config, config)?;
        Ok(Arc::new(Self::new(&self.id, cfg)?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WwwAuthenticateConfig {
    #[serde(default = "default_realm")]
    pub realm: String,
    #[serde(default = "default_when")]
    pub when: Vec<String>,
}

fn default_realm() -> String {
    "Please authenticate".into()
}

/// Answers with a basic auth challenge.
pub struct WwwAuthenticateErrorHandler {
    id: String,
    config: WwwAuthenticateConfig,
    when: Vec<ErrorCode>,
}

impl WwwAuthenticateErrorHandler {
    fn new(id: &str, config: WwwAuthenticateConfig) -> Result<Self> {
        if config.realm.contains('"') {
            return Err(PortcullisError::configuration(
                "www_authenticate error handler: realm must not contain quotes",
            ));
        }
        let when = parse_codes("www_authenticate error handler", &config.when)?;
        Ok(Self {
            id: id.to_string(),
            config,
            when,
        })
    }
}

#[async_trait]
impl ErrorHandler for WwwAuthenticateErrorHandler {
    fn id(&self) -> &str {
        &self.id
    }

    async fn handle_error(&self, _ctx: &Context, err: &PortcullisError) -> Result<ErrorResponse> {
        if !self.when.contains(&err.root().code()) {
            return Err(err.clone());
        }
        Ok(ErrorResponse::new(StatusCode::UNAUTHORIZED).with_header(
            "www-authenticate",
            format!("Basic realm=\"{}\"", self.config.realm),
        ))
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn ErrorHandler>> {
        let cfg = derive_config("www_authenticate error handler", &self.config, config)?;
        Ok(Arc::new(Self::new(&self.id, cfg)?))
    }
}
