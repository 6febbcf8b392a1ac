//! Service registry backed by definitions from configuration.

use async_trait::async_trait;
use parking_lot::RwLock;
use sso_sdk::{RegisteredService, Service, ServiceRegistry, ServiceRegistryError};

use crate::domain::services::{MatchableService, compile_all, find_match};

pub struct StaticServiceRegistry {
    services: RwLock<Vec<MatchableService>>,
}

impl StaticServiceRegistry {
    /// # Errors
    /// [`ServiceRegistryError::InvalidDefinition`] for an invalid matcher.
    pub fn new(definitions: Vec<RegisteredService>) -> Result<Self, ServiceRegistryError> {
        Ok(Self {
            services: RwLock::new(compile_all(definitions)?),
        })
    }

    /// Swap the whole definition set. On error the current set is kept.
    ///
    /// # Errors
    /// [`ServiceRegistryError::InvalidDefinition`] for an invalid matcher.
    pub fn replace(&self, definitions: Vec<RegisteredService>) -> Result<(), ServiceRegistryError> {
        let compiled = compile_all(definitions)?;
        *self.services.write() = compiled;
        Ok(())
    }
}

#[async_trait]
impl ServiceRegistry for StaticServiceRegistry {
    async fn find_service_by(
        &self,
        service: &Service,
    ) -> Result<Option<RegisteredService>, ServiceRegistryError> {
        Ok(find_match(&self.services.read(), service).cloned())
    }

    async fn load(&self) -> Result<Vec<RegisteredService>, ServiceRegistryError> {
        Ok(self
            .services
            .read()
            .iter()
            .map(|s| s.definition().clone())
            .collect())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_and_replace() {
        let registry =
            StaticServiceRegistry::new(vec![RegisteredService::exact(1, "https://a")]).unwrap();
        assert!(
            registry
                .find_service_by(&Service::new("https://a"))
                .await
                .unwrap()
                .is_some()
        );

        registry
            .replace(vec![RegisteredService::exact(2, "https://b")])
            .unwrap();
        assert!(
            registry
                .find_service_by(&Service::new("https://a"))
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(registry.load().await.unwrap().len(), 1);
    }
}
