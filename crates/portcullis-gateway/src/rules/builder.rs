//! Rule construction: per-rule references override pipeline defaults
//! wholesale, never merged.

use std::sync::Arc;

use portcullis_core::error::{Category, PortcullisError, Result};

use super::composite::Composite;
use super::matcher::RuleMatcher;
use super::rule::Rule;
use crate::config::{MechanismConfig, PipelineRef, PipelineSection, RuleConfig};
use crate::mechanisms::MechanismFactory;

/// Build one rule. The first resolution error aborts the build.
pub fn build_rule(
    factory: &MechanismFactory,
    defaults: &PipelineSection,
    rc: &RuleConfig,
) -> Result<Rule> {
    let authenticators = resolve(
        required(Category::Authenticator, rc, defaults)?,
        |id, conf| factory.create_authenticator(id, conf),
    )?;
    let authorizers = resolve(required(Category::Authorizer, rc, defaults)?, |id, conf| {
        factory.create_authorizer(id, conf)
    })?;
    let hydrators = resolve(select(Category::Hydrator, rc, defaults), |id, conf| {
        factory.create_hydrator(id, conf)
    })?;
    let mutators = resolve(required(Category::Mutator, rc, defaults)?, |id, conf| {
        factory.create_mutator(id, conf)
    })?;
    let error_handlers = resolve(required(Category::ErrorHandler, rc, defaults)?, |id, conf| {
        factory.create_error_handler(id, conf)
    })?;

    Ok(Rule::new(
        rc.id.clone(),
        RuleMatcher::new(&rc.matcher),
        Composite::new(rc.id.clone(), authenticators),
        Composite::new(rc.id.clone(), authorizers),
        Composite::new(rc.id.clone(), hydrators),
        Composite::new(rc.id.clone(), mutators),
        Composite::new(rc.id.clone(), error_handlers),
    ))
}

/// Rule references if there are any, pipeline defaults otherwise.
fn select<'a>(
    category: Category,
    rc: &'a RuleConfig,
    defaults: &'a PipelineSection,
) -> &'a [PipelineRef] {
    let own = rc.refs(category);
    if own.is_empty() {
        defaults.refs(category)
    } else {
        own
    }
}

fn required<'a>(
    category: Category,
    rc: &'a RuleConfig,
    defaults: &'a PipelineSection,
) -> Result<&'a [PipelineRef]> {
    let refs = select(category, rc, defaults);
    if refs.is_empty() {
        return Err(PortcullisError::configuration(format!(
            "rule {}: no {category} configured and no default available",
            rc.id
        )));
    }
    Ok(refs)
}

fn resolve<T: ?Sized>(
    refs: &[PipelineRef],
    create: impl Fn(&str, Option<&MechanismConfig>) -> Result<Arc<T>>,
) -> Result<Vec<Arc<T>>> {
    refs.iter()
        .map(|r| create(&r.id, r.config.as_ref()))
        .collect()
}
