//! Mechanism factory: resolves (category, id, override) to an instance.

use std::sync::Arc;

use portcullis_core::error::{Category, PortcullisError, Result};

use super::{
    is_empty_config, Authenticator, Authorizer, ErrorHandler, Hydrator, MechanismConfig, Mutator,
    PrototypeRepository,
};
use crate::config::MechanismsSection;

/// Hands out the shared prototype when no override is given and a derived,
/// independent instance otherwise. Needs no locking; the repository is never
/// modified after construction.
pub struct MechanismFactory {
    repo: PrototypeRepository,
}

impl MechanismFactory {
    pub fn new(cfg: &MechanismsSection) -> Result<Self> {
        tracing::info!("loading mechanism definitions");

        let repo = PrototypeRepository::new(cfg).map_err(|e| {
            tracing::error!(error = %e, "failed loading mechanism definitions");
            e
        })?;

        Ok(Self { repo })
    }

    pub fn from_repository(repo: PrototypeRepository) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &PrototypeRepository {
        &self.repo
    }

    pub fn create_authenticator(
        &self,
        id: &str,
        conf: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Authenticator>> {
        create(Category::Authenticator, self.repo.authenticator(id), conf, |p, c| p.with_config(c))
    }

    pub fn create_authorizer(
        &self,
        id: &str,
        conf: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Authorizer>> {
        create(Category::Authorizer, self.repo.authorizer(id), conf, |p, c| p.with_config(c))
    }

    pub fn create_hydrator(
        &self,
        id: &str,
        conf: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Hydrator>> {
        create(Category::Hydrator, self.repo.hydrator(id), conf, |p, c| p.with_config(c))
    }

    pub fn create_mutator(
        &self,
        id: &str,
        conf: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn Mutator>> {
        create(Category::Mutator, self.repo.mutator(id), conf, |p, c| p.with_config(c))
    }

    pub fn create_error_handler(
        &self,
        id: &str,
        conf: Option<&MechanismConfig>,
    ) -> Result<Arc<dyn ErrorHandler>> {
        create(Category::ErrorHandler, self.repo.error_handler(id), conf, |p, c| p.with_config(c))
    }
}

fn create<T: ?Sized>(
    category: Category,
    prototype: Result<Arc<T>>,
    conf: Option<&MechanismConfig>,
    derive: impl FnOnce(&T, &MechanismConfig) -> Result<Arc<T>>,
) -> Result<Arc<T>> {
    let prototype = prototype.map_err(|e| PortcullisError::creation(category, e))?;

    match conf {
        Some(conf) if !is_empty_config(conf) => {
            derive(&*prototype, conf).map_err(|e| PortcullisError::creation(category, e))
        }
        _ => Ok(prototype),
    }
}
