//! Composite chains.
//!
//! Authenticator, authorizer, hydrator and mutator chains run their steps in
//! order until one succeeds: first success wins, and when every step fails
//! the last step's error surfaces. The error handler chain has the opposite
//! polarity: it stops at the first handler that handles the error.
//!
//! A composite is bound to one rule and cannot be reconfigured.

use std::sync::Arc;

use async_trait::async_trait;

use portcullis_core::error::{Category, PortcullisError, Result};
use portcullis_core::{AuthDataSource, Context, SubjectContext};

use crate::mechanisms::{
    Authenticator, Authorizer, ErrorHandler, ErrorResponse, Hydrator, MechanismConfig, Mutator,
};

/// Ordered chain of mechanisms of one category.
pub struct Composite<T: ?Sized> {
    rule_id: String,
    steps: Vec<Arc<T>>,
}

pub type CompositeAuthenticator = Composite<dyn Authenticator>;
pub type CompositeAuthorizer = Composite<dyn Authorizer>;
pub type CompositeHydrator = Composite<dyn Hydrator>;
pub type CompositeMutator = Composite<dyn Mutator>;
pub type CompositeErrorHandler = Composite<dyn ErrorHandler>;

impl<T: ?Sized> Composite<T> {
    pub fn new(rule_id: impl Into<String>, steps: Vec<Arc<T>>) -> Self {
        Self {
            rule_id: rule_id.into(),
            steps,
        }
    }

    pub fn steps(&self) -> &[Arc<T>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn not_reconfigurable(category: Category) -> PortcullisError {
    PortcullisError::configuration(format!(
        "reconfiguration of a composite {category} not allowed"
    ))
}

/// Outcome of a chain whose steps all failed. Required chains are never
/// empty once built, so `None` only shows up for hand-made composites.
fn exhausted(category: Category, last: Option<PortcullisError>) -> Result<()> {
    match last {
        Some(e) => Err(e),
        None => Err(PortcullisError::internal(format!("empty {category} chain"))),
    }
}

#[async_trait]
impl Authenticator for Composite<dyn Authenticator> {
    fn id(&self) -> &str {
        &self.rule_id
    }

    async fn authenticate(
        &self,
        ctx: &Context,
        ads: &dyn AuthDataSource,
        sc: &mut SubjectContext,
    ) -> Result<()> {
        let mut last = None;
        for step in &self.steps {
            match step.authenticate(ctx, ads, sc).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!(
                        rule = %self.rule_id,
                        authenticator = %step.id(),
                        error = %e,
                        "authenticator failed, trying next"
                    );
                    last = Some(e);
                }
            }
        }
        exhausted(Category::Authenticator, last)
    }

    fn with_config(&self, _config: &MechanismConfig) -> Result<Arc<dyn Authenticator>> {
        Err(not_reconfigurable(Category::Authenticator))
    }
}

#[async_trait]
impl Authorizer for Composite<dyn Authorizer> {
    fn id(&self) -> &str {
        &self.rule_id
    }

    async fn authorize(&self, ctx: &Context, sc: &SubjectContext) -> Result<()> {
        let mut last = None;
        for step in &self.steps {
            match step.authorize(ctx, sc).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!(
                        rule = %self.rule_id,
                        authorizer = %step.id(),
                        error = %e,
                        "authorizer failed, trying next"
                    );
                    last = Some(e);
                }
            }
        }
        exhausted(Category::Authorizer, last)
    }

    fn with_config(&self, _config: &MechanismConfig) -> Result<Arc<dyn Authorizer>> {
        Err(not_reconfigurable(Category::Authorizer))
    }
}

#[async_trait]
impl Hydrator for Composite<dyn Hydrator> {
    fn id(&self) -> &str {
        &self.rule_id
    }

    /// An empty hydrator chain is legal and always succeeds.
    async fn hydrate(&self, ctx: &Context, sc: &mut SubjectContext) -> Result<()> {
        let mut last = None;
        for step in &self.steps {
            match step.hydrate(ctx, sc).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!(
                        rule = %self.rule_id,
                        hydrator = %step.id(),
                        error = %e,
                        "hydrator failed, trying next"
                    );
                    last = Some(e);
                }
            }
        }
        match last {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn with_config(&self, _config: &MechanismConfig) -> Result<Arc<dyn Hydrator>> {
        Err(not_reconfigurable(Category::Hydrator))
    }
}

#[async_trait]
impl Mutator for Composite<dyn Mutator> {
    fn id(&self) -> &str {
        &self.rule_id
    }

    async fn mutate(&self, ctx: &Context, sc: &mut SubjectContext) -> Result<()> {
        let mut last = None;
        for step in &self.steps {
            match step.mutate(ctx, sc).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!(
                        rule = %self.rule_id,
                        mutator = %step.id(),
                        error = %e,
                        "mutator failed, trying next"
                    );
                    last = Some(e);
                }
            }
        }
        exhausted(Category::Mutator, last)
    }

    fn with_config(&self, _config: &MechanismConfig) -> Result<Arc<dyn Mutator>> {
        Err(not_reconfigurable(Category::Mutator))
    }
}

#[async_trait]
impl ErrorHandler for Composite<dyn ErrorHandler> {
    fn id(&self) -> &str {
        &self.rule_id
    }

    async fn handle_error(&self, ctx: &Context, err: &PortcullisError) -> Result<ErrorResponse> {
        let mut last = None;
        for step in &self.steps {
            match step.handle_error(ctx, err).await {
                Ok(resp) => return Ok(resp),
                Err(declined) => {
                    tracing::debug!(
                        rule = %self.rule_id,
                        error_handler = %step.id(),
                        "error handler declined, trying next"
                    );
                    last = Some(declined);
                }
            }
        }
        Err(last.unwrap_or_else(|| err.clone()))
    }

    fn with_config(&self, _config: &MechanismConfig) -> Result<Arc<dyn ErrorHandler>> {
        Err(not_reconfigurable(Category::ErrorHandler))
    }
}
