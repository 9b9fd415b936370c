//! Prototype repository: one immutable template per (category, id).

use std::collections::HashMap;
use std::sync::Arc;

use portcullis_core::error::{Category, PortcullisError, Result};

use super::authenticators::new_authenticator;
use super::authorizers::new_authorizer;
use super::error_handlers::new_error_handler;
use super::hydrators::new_hydrator;
use super::mutators::new_mutator;
use super::{Authenticator, Authorizer, ErrorHandler, Hydrator, Mutator};
use crate::config::{MechanismDef, MechanismsSection};

/// Built once at startup (or reload); read-only afterwards.
#[derive(Default)]
pub struct PrototypeRepository {
    authenticators: HashMap<String, Arc<dyn Authenticator>>,
    authorizers: HashMap<String, Arc<dyn Authorizer>>,
    hydrators: HashMap<String, Arc<dyn Hydrator>>,
    mutators: HashMap<String, Arc<dyn Mutator>>,
    error_handlers: HashMap<String, Arc<dyn ErrorHandler>>,
}

impl PrototypeRepository {
    /// Instantiate every configured mechanism. Unknown types, invalid
    /// configs and duplicate ids within a category fail the whole build.
    pub fn new(cfg: &MechanismsSection) -> Result<Self> {
        let mut repo = Self::default();

        for def in &cfg.authenticators {
            let proto = new_authenticator(&def.id, &def.kind, def.config.as_ref())
                .map_err(|e| context(Category::Authenticator, def, e))?;
            repo.add_authenticator(proto)?;
        }
        for def in &cfg.authorizers {
            let proto = new_authorizer(&def.id, &def.kind, def.config.as_ref())
                .map_err(|e| context(Category::Authorizer, def, e))?;
            repo.add_authorizer(proto)?;
        }
        for def in &cfg.hydrators {
            let proto = new_hydrator(&def.id, &def.kind, def.config.as_ref())
                .map_err(|e| context(Category::Hydrator, def, e))?;
            repo.add_hydrator(proto)?;
        }
        for def in &cfg.mutators {
            let proto = new_mutator(&def.id, &def.kind, def.config.as_ref())
                .map_err(|e| context(Category::Mutator, def, e))?;
            repo.add_mutator(proto)?;
        }
        for def in &cfg.error_handlers {
            let proto = new_error_handler(&def.id, &def.kind, def.config.as_ref())
                .map_err(|e| context(Category::ErrorHandler, def, e))?;
            repo.add_error_handler(proto)?;
        }

        tracing::debug!(
            authenticators = repo.authenticators.len(),
            authorizers = repo.authorizers.len(),
            hydrators = repo.hydrators.len(),
            mutators = repo.mutators.len(),
            error_handlers = repo.error_handlers.len(),
            "prototype repository built"
        );
        Ok(repo)
    }

    pub fn add_authenticator(&mut self, proto: Arc<dyn Authenticator>) -> Result<()> {
        let id = proto.id().to_string();
        insert(&mut self.authenticators, Category::Authenticator, id, proto)
    }

    pub fn add_authorizer(&mut self, proto: Arc<dyn Authorizer>) -> Result<()> {
        let id = proto.id().to_string();
        insert(&mut self.authorizers, Category::Authorizer, id, proto)
    }

    pub fn add_hydrator(&mut self, proto: Arc<dyn Hydrator>) -> Result<()> {
        let id = proto.id().to_string();
        insert(&mut self.hydrators, Category::Hydrator, id, proto)
    }

    pub fn add_mutator(&mut self, proto: Arc<dyn Mutator>) -> Result<()> {
        let id = proto.id().to_string();
        insert(&mut self.mutators, Category::Mutator, id, proto)
    }

    pub fn add_error_handler(&mut self, proto: Arc<dyn ErrorHandler>) -> Result<()> {
        let id = proto.id().to_string();
        insert(&mut self.error_handlers, Category::ErrorHandler, id, proto)
    }

    pub fn authenticator(&self, id: &str) -> Result<Arc<dyn Authenticator>> {
        lookup(&self.authenticators, Category::Authenticator, id)
    }

    pub fn authorizer(&self, id: &str) -> Result<Arc<dyn Authorizer>> {
        lookup(&self.authorizers, Category::Authorizer, id)
    }

    pub fn hydrator(&self, id: &str) -> Result<Arc<dyn Hydrator>> {
        lookup(&self.hydrators, Category::Hydrator, id)
    }

    pub fn mutator(&self, id: &str) -> Result<Arc<dyn Mutator>> {
        lookup(&self.mutators, Category::Mutator, id)
    }

    pub fn error_handler(&self, id: &str) -> Result<Arc<dyn ErrorHandler>> {
        lookup(&self.error_handlers, Category::ErrorHandler, id)
    }
}

fn context(category: Category, def: &MechanismDef, e: PortcullisError) -> PortcullisError {
    match e {
        PortcullisError::Configuration(msg) => PortcullisError::Configuration(format!(
            "{category} {} ({}): {msg}",
            def.id, def.kind
        )),
        other => other,
    }
}

fn insert<T: ?Sized>(
    map: &mut HashMap<String, Arc<T>>,
    category: Category,
    id: String,
    proto: Arc<T>,
) -> Result<()> {
    if map.contains_key(&id) {
        return Err(PortcullisError::configuration(format!(
            "duplicate {category} id: {id}"
        )));
    }
    map.insert(id, proto);
    Ok(())
}

fn lookup<T: ?Sized>(
    map: &HashMap<String, Arc<T>>,
    category: Category,
    id: &str,
) -> Result<Arc<T>> {
    map.get(id)
        .cloned()
        .ok_or_else(|| PortcullisError::NotFound(format!("no {category} with id {id}")))
}
