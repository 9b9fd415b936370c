//! Recording mechanisms and a local HTTP server shared by the integration
//! tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use serde_json::Value;

use portcullis_core::error::{PortcullisError, Result};
use portcullis_core::{AuthDataSource, Context, Subject, SubjectContext};
use portcullis_gateway::config::{MechanismConfig, PipelineRef};
use portcullis_gateway::mechanisms::{
    Authenticator, Authorizer, ErrorHandler, ErrorResponse, Hydrator, MechanismFactory, Mutator,
    PrototypeRepository,
};

/// Ordered record of `<category>:<id>` invocations.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

/// Derives a copy whose `fail` flag comes from `{"fail": bool}`.
fn parse_fail(config: &MechanismConfig) -> Result<bool> {
    config
        .get("fail")
        .and_then(Value::as_bool)
        .ok_or_else(|| PortcullisError::configuration("mock accepts only {\"fail\": bool}"))
}

pub struct MockAuthenticator {
    pub id: String,
    pub fail: bool,
    pub log: CallLog,
}

impl MockAuthenticator {
    pub fn new(id: &str, fail: bool, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            fail,
            log: log.clone(),
        })
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn authenticate(
        &self,
        _ctx: &Context,
        _ads: &dyn AuthDataSource,
        sc: &mut SubjectContext,
    ) -> Result<()> {
        self.log.record(format!("authenticator:{}", self.id));
        if self.fail {
            return Err(PortcullisError::Authentication(format!("{} failed", self.id)));
        }
        sc.subject = Some(Subject::new(self.id.clone()));
        Ok(())
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Authenticator>> {
        Ok(MockAuthenticator::new(&self.id, parse_fail(config)?, &self.log))
    }
}

pub struct MockAuthorizer {
    pub id: String,
    pub fail: bool,
    pub log: CallLog,
}

impl MockAuthorizer {
    pub fn new(id: &str, fail: bool, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            fail,
            log: log.clone(),
        })
    }
}

#[async_trait]
impl Authorizer for MockAuthorizer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn authorize(&self, _ctx: &Context, _sc: &SubjectContext) -> Result<()> {
        self.log.record(format!("authorizer:{}", self.id));
        if self.fail {
            return Err(PortcullisError::Authorization(format!("{} failed", self.id)));
        }
        Ok(())
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Authorizer>> {
        Ok(MockAuthorizer::new(&self.id, parse_fail(config)?, &self.log))
    }
}

pub struct MockHydrator {
    pub id: String,
    pub fail: bool,
    pub log: CallLog,
}

impl MockHydrator {
    pub fn new(id: &str, fail: bool, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            fail,
            log: log.clone(),
        })
    }
}

#[async_trait]
impl Hydrator for MockHydrator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn hydrate(&self, _ctx: &Context, sc: &mut SubjectContext) -> Result<()> {
        self.log.record(format!("hydrator:{}", self.id));
        if self.fail {
            return Err(PortcullisError::Hydration(format!("{} failed", self.id)));
        }
        sc.attributes.insert(self.id.clone(), Value::Bool(true));
        Ok(())
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Hydrator>> {
        Ok(MockHydrator::new(&self.id, parse_fail(config)?, &self.log))
    }
}

pub struct MockMutator {
    pub id: String,
    pub fail: bool,
    pub log: CallLog,
}

impl MockMutator {
    pub fn new(id: &str, fail: bool, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            fail,
            log: log.clone(),
        })
    }
}

#[async_trait]
impl Mutator for MockMutator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn mutate(&self, _ctx: &Context, sc: &mut SubjectContext) -> Result<()> {
        self.log.record(format!("mutator:{}", self.id));
        if self.fail {
            return Err(PortcullisError::Mutation(format!("{} failed", self.id)));
        }
        sc.headers.insert("x-mutated-by".into(), self.id.clone());
        Ok(())
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn Mutator>> {
        Ok(MockMutator::new(&self.id, parse_fail(config)?, &self.log))
    }
}

/// Handles with 418 + `x-handled-by`, or declines with an internal error
/// naming itself.
pub struct MockErrorHandler {
    pub id: String,
    pub handles: bool,
    pub log: CallLog,
}

impl MockErrorHandler {
    pub fn new(id: &str, handles: bool, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            handles,
            log: log.clone(),
        })
    }
}

#[async_trait]
impl ErrorHandler for MockErrorHandler {
    fn id(&self) -> &str {
        &self.id
    }

    async fn handle_error(&self, _ctx: &Context, err: &PortcullisError) -> Result<ErrorResponse> {
        self.log.record(format!("error_handler:{}", self.id));
        if !self.handles {
            return Err(PortcullisError::internal(format!("{} declined {}", self.id, err.code())));
        }
        Ok(ErrorResponse::new(StatusCode::IM_A_TEAPOT)
            .with_header("x-handled-by", self.id.clone())
            .with_header("x-error-code", err.code().as_str()))
    }

    fn with_config(&self, config: &MechanismConfig) -> Result<Arc<dyn ErrorHandler>> {
        Ok(MockErrorHandler::new(&self.id, !parse_fail(config)?, &self.log))
    }
}

/// Factory with a fixed set of recording prototypes:
///
/// - authenticators: `a1`, `a2` (succeed), `a_fail1`, `a_fail2` (fail)
/// - authorizers: `allow`, `deny`
/// - hydrators: `h1`, `h_fail`
/// - mutators: `A`, `B`, `C`, `m_fail`
/// - error handlers: `eh_decline1`, `eh_decline2`, `eh_handle`
pub fn recording_factory(log: &CallLog) -> MechanismFactory {
    let mut repo = PrototypeRepository::default();

    for (id, fail) in [("a1", false), ("a2", false), ("a_fail1", true), ("a_fail2", true)] {
        repo.add_authenticator(MockAuthenticator::new(id, fail, log)).unwrap();
    }
    for (id, fail) in [("allow", false), ("deny", true)] {
        repo.add_authorizer(MockAuthorizer::new(id, fail, log)).unwrap();
    }
    for (id, fail) in [("h1", false), ("h_fail", true)] {
        repo.add_hydrator(MockHydrator::new(id, fail, log)).unwrap();
    }
    for (id, fail) in [("A", false), ("B", false), ("C", false), ("m_fail", true)] {
        repo.add_mutator(MockMutator::new(id, fail, log)).unwrap();
    }
    for (id, handles) in [("eh_decline1", false), ("eh_decline2", false), ("eh_handle", true)] {
        repo.add_error_handler(MockErrorHandler::new(id, handles, log)).unwrap();
    }

    MechanismFactory::from_repository(repo)
}

pub fn refs(ids: &[&str]) -> Vec<PipelineRef> {
    ids.iter().map(|id| PipelineRef::new(*id)).collect()
}

// --------------------
// Local HTTP server
// --------------------

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub headers: HeaderMap,
    pub body: String,
}

/// Scripted endpoint: the n-th call gets the n-th response (the last one
/// repeats).
#[derive(Clone)]
pub struct ScriptedEndpoint {
    pub hits: Arc<AtomicUsize>,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
    responses: Arc<Vec<(StatusCode, String)>>,
    delay: Duration,
}

impl ScriptedEndpoint {
    pub fn new(responses: Vec<(StatusCode, String)>) -> Self {
        assert!(!responses.is_empty());
        Self {
            hits: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(responses),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Serve on 127.0.0.1 (random port); returns the base url.
    pub async fn serve(&self) -> String {
        let app = Router::new()
            .route("/*path", post(scripted))
            .with_state(self.clone());
        let addr = spawn(app).await;
        format!("http://{addr}")
    }
}

async fn scripted(
    State(ep): State<ScriptedEndpoint>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let n = ep.hits.fetch_add(1, Ordering::SeqCst);
    ep.requests
        .lock()
        .unwrap()
        .push(RecordedRequest { headers, body });
    if !ep.delay.is_zero() {
        tokio::time::sleep(ep.delay).await;
    }
    let idx = n.min(ep.responses.len() - 1);
    ep.responses[idx].clone()
}

pub async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub fn token_json(token: &str, expires_in: u64) -> (StatusCode, String) {
    (
        StatusCode::OK,
        format!(r#"{{"access_token":"{token}","token_type":"Bearer","expires_in":{expires_in}}}"#),
    )
}
