//! Shared error type across Portcullis crates.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Mechanism categories a rule is composed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Authenticator,
    Authorizer,
    Hydrator,
    Mutator,
    ErrorHandler,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Authenticator => "authenticator",
            Category::Authorizer => "authorizer",
            Category::Hydrator => "hydrator",
            Category::Mutator => "mutator",
            Category::ErrorHandler => "error handler",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable error codes, used by error handler conditions and in responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Configuration,
    NotFound,
    Creation,
    Authentication,
    Authorization,
    Hydration,
    Mutation,
    Communication,
    CommunicationTimeout,
    Internal,
}

impl ErrorCode {
    /// String representation used in config and JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Configuration => "configuration_error",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Creation => "creation_error",
            ErrorCode::Authentication => "authentication_error",
            ErrorCode::Authorization => "authorization_error",
            ErrorCode::Hydration => "hydration_error",
            ErrorCode::Mutation => "mutation_error",
            ErrorCode::Communication => "communication_error",
            ErrorCode::CommunicationTimeout => "communication_timeout_error",
            ErrorCode::Internal => "internal_error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let code = match s {
            "configuration_error" => ErrorCode::Configuration,
            "not_found" => ErrorCode::NotFound,
            "creation_error" => ErrorCode::Creation,
            "authentication_error" => ErrorCode::Authentication,
            "authorization_error" => ErrorCode::Authorization,
            "hydration_error" => ErrorCode::Hydration,
            "mutation_error" => ErrorCode::Mutation,
            "communication_error" => ErrorCode::Communication,
            "communication_timeout_error" => ErrorCode::CommunicationTimeout,
            "internal_error" => ErrorCode::Internal,
            _ => return None,
        };
        Some(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, PortcullisError>;

/// Underlying cause carried by [`PortcullisError::Internal`].
pub type Cause = Arc<dyn std::error::Error + Send + Sync>;

/// Unified error type used by core and gateway.
///
/// Cloneable so the error handler chain can hand the triggering error to
/// every handler it tries.
#[derive(Debug, Clone, Error)]
pub enum PortcullisError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{category} creation failed: {source}")]
    Creation {
        category: Category,
        #[source]
        source: Box<PortcullisError>,
    },
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("authorization failed: {0}")]
    Authorization(String),
    #[error("hydration failed: {0}")]
    Hydration(String),
    #[error("mutation failed: {0}")]
    Mutation(String),
    #[error("communication error: {0}")]
    Communication(String),
    #[error("communication timeout: {0}")]
    CommunicationTimeout(String),
    #[error("internal: {msg}")]
    Internal {
        msg: String,
        #[source]
        source: Option<Cause>,
    },
}

impl PortcullisError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        PortcullisError::Configuration(msg.into())
    }

    pub fn creation(category: Category, source: PortcullisError) -> Self {
        PortcullisError::Creation {
            category,
            source: Box::new(source),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        PortcullisError::Internal {
            msg: msg.into(),
            source: None,
        }
    }

    pub fn internal_caused_by<E>(msg: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PortcullisError::Internal {
            msg: msg.into(),
            source: Some(Arc::new(cause)),
        }
    }

    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            PortcullisError::Configuration(_) => ErrorCode::Configuration,
            PortcullisError::NotFound(_) => ErrorCode::NotFound,
            PortcullisError::Creation { .. } => ErrorCode::Creation,
            PortcullisError::Authentication(_) => ErrorCode::Authentication,
            PortcullisError::Authorization(_) => ErrorCode::Authorization,
            PortcullisError::Hydration(_) => ErrorCode::Hydration,
            PortcullisError::Mutation(_) => ErrorCode::Mutation,
            PortcullisError::Communication(_) => ErrorCode::Communication,
            PortcullisError::CommunicationTimeout(_) => ErrorCode::CommunicationTimeout,
            PortcullisError::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// Innermost error behind any creation wrappers.
    pub fn root(&self) -> &PortcullisError {
        match self {
            PortcullisError::Creation { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), PortcullisError::CommunicationTimeout(_))
    }
}
