use portcullis_core::error::Result;
use portcullis_core::{AuthDataSource, Context, SubjectContext};

use super::composite::{
    CompositeAuthenticator, CompositeAuthorizer, CompositeErrorHandler, CompositeHydrator,
    CompositeMutator,
};
use super::matcher::RuleMatcher;
use crate::mechanisms::{
    Authenticator, Authorizer, ErrorHandler, ErrorResponse, Hydrator, Mutator,
};

/// Result of a rule execution that did not end in an unhandled error.
#[derive(Debug)]
pub enum Decision {
    /// Every stage passed.
    Allow(SubjectContext),
    /// The pipeline failed and an error handler answered.
    Respond(ErrorResponse),
}

/// A built rule. Immutable; any number of `execute` calls may run on it
/// concurrently.
pub struct Rule {
    id: String,
    matcher: RuleMatcher,
    authenticator: CompositeAuthenticator,
    authorizer: CompositeAuthorizer,
    hydrator: CompositeHydrator,
    mutator: CompositeMutator,
    error_handler: CompositeErrorHandler,
}

impl Rule {
    pub fn new(
        id: impl Into<String>,
        matcher: RuleMatcher,
        authenticator: CompositeAuthenticator,
        authorizer: CompositeAuthorizer,
        hydrator: CompositeHydrator,
        mutator: CompositeMutator,
        error_handler: CompositeErrorHandler,
    ) -> Self {
        Self {
            id: id.into(),
            matcher,
            authenticator,
            authorizer,
            hydrator,
            mutator,
            error_handler,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.matcher.matches(method, path)
    }

    pub fn authenticators(&self) -> &CompositeAuthenticator {
        &self.authenticator
    }
    pub fn authorizers(&self) -> &CompositeAuthorizer {
        &self.authorizer
    }
    pub fn hydrators(&self) -> &CompositeHydrator {
        &self.hydrator
    }
    pub fn mutators(&self) -> &CompositeMutator {
        &self.mutator
    }
    pub fn error_handlers(&self) -> &CompositeErrorHandler {
        &self.error_handler
    }

    /// Authenticate -> Authorize -> Hydrate -> Mutate on a fresh subject
    /// context. The first failing stage hands its error to the error handler
    /// chain, whose outcome is returned as is.
    pub async fn execute(&self, ctx: &Context, ads: &dyn AuthDataSource) -> Result<Decision> {
        let mut sc = SubjectContext::new();

        match self.run_stages(ctx, ads, &mut sc).await {
            Ok(()) => Ok(Decision::Allow(sc)),
            Err(err) => {
                tracing::debug!(rule = %self.id, error = %err, "pipeline failed, handling error");
                self.error_handler
                    .handle_error(ctx, &err)
                    .await
                    .map(Decision::Respond)
                    .map_err(|unhandled| {
                        tracing::warn!(
                            rule = %self.id,
                            error = %unhandled,
                            "no error handler handled the error"
                        );
                        unhandled
                    })
            }
        }
    }

    async fn run_stages(
        &self,
        ctx: &Context,
        ads: &dyn AuthDataSource,
        sc: &mut SubjectContext,
    ) -> Result<()> {
        self.authenticator.authenticate(ctx, ads, sc).await?;
        self.authorizer.authorize(ctx, sc).await?;
        self.hydrator.hydrate(ctx, sc).await?;
        self.mutator.mutate(ctx, sc).await?;
        Ok(())
    }
}
