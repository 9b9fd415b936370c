//! Read-only access to the data of an inbound request.

use std::collections::HashMap;

/// Accessors over the inbound request, as seen by authenticators.
///
/// Header names are matched case-insensitively; cookie and query keys are
/// matched exactly.
pub trait AuthDataSource: Send + Sync {
    fn header(&self, name: &str) -> Option<String>;
    fn cookie(&self, name: &str) -> Option<String>;
    fn query(&self, name: &str) -> Option<String>;
}

/// In-memory request data, used by tests and by callers that already hold
/// the request as plain maps.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthData {
    headers: HashMap<String, String>,
    cookies: HashMap<String, String>,
    query: HashMap<String, String>,
}

impl StaticAuthData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }
}

impl AuthDataSource for StaticAuthData {
    fn header(&self, name: &str) -> Option<String> {
        self.headers.get(&name.to_ascii_lowercase()).cloned()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }

    fn query(&self, name: &str) -> Option<String> {
        self.query.get(name).cloned()
    }
}
