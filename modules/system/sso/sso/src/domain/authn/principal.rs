//! Principal resolution after a handler succeeded.

use std::sync::Arc;

use async_trait::async_trait;
use sso_sdk::{
    AttributeRepository, AttributeRepositoryError, AttributeValue, Attributes, Credential,
    Principal, PrincipalResolver,
};
use tracing::{debug, warn};

use crate::config::{MergeStrategy, PrincipalResolverConfig};

/// Returns the handler's principal unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoPrincipalResolver;

#[async_trait]
impl PrincipalResolver for EchoPrincipalResolver {
    async fn resolve(
        &self,
        _credential: &Credential,
        handler_principal: Option<&Principal>,
        _handler_name: &str,
    ) -> Result<Option<Principal>, AttributeRepositoryError> {
        Ok(handler_principal.cloned())
    }
}

/// Merges attributes from an [`AttributeRepository`] into the handler's
/// principal and optionally re-keys it by an attribute.
pub struct AttributeMergingPrincipalResolver {
    repository: Arc<dyn AttributeRepository>,
    config: PrincipalResolverConfig,
}

impl AttributeMergingPrincipalResolver {
    #[must_use]
    pub fn new(repository: Arc<dyn AttributeRepository>, config: PrincipalResolverConfig) -> Self {
        Self { repository, config }
    }

    fn principal_id(&self, credential: &Credential, handler_principal: Option<&Principal>) -> String {
        match handler_principal {
            Some(p) if self.config.use_existing_principal_id => p.id().to_owned(),
            _ => credential.id().trim().to_owned(),
        }
    }

    fn rekeyed_id(&self, id: String, attributes: &Attributes) -> String {
        let Some(name) = self.config.principal_attribute.as_deref() else {
            return id;
        };
        match attributes.get(name).and_then(|values| values.first()) {
            Some(AttributeValue::String(s)) if !s.is_empty() => s.clone(),
            Some(other) if !other.is_null() && !other.is_string() => other.to_string(),
            _ => {
                warn!(attribute = name, principal_id = %id, "principal attribute missing; keeping resolved id");
                id
            }
        }
    }
}

#[async_trait]
impl PrincipalResolver for AttributeMergingPrincipalResolver {
    async fn resolve(
        &self,
        credential: &Credential,
        handler_principal: Option<&Principal>,
        handler_name: &str,
    ) -> Result<Option<Principal>, AttributeRepositoryError> {
        let id = self.principal_id(credential, handler_principal);
        if id.is_empty() {
            return Ok(None);
        }
        let fetched = self.repository.attributes_for(&id).await?;
        let current = handler_principal
            .map(|p| p.attributes().clone())
            .unwrap_or_default();
        let merged = merge(current, fetched, self.config.merge_strategy);
        let id = self.rekeyed_id(id, &merged);
        debug!(handler = handler_name, principal_id = %id, attributes = merged.len(), "principal resolved");
        Ok(Some(Principal::new(id, merged)))
    }
}

/// Combine handler attributes with repository attributes.
#[must_use]
pub fn merge(mut current: Attributes, fetched: Attributes, strategy: MergeStrategy) -> Attributes {
    for (name, values) in fetched {
        match strategy {
            MergeStrategy::Replace => {
                current.insert(name, values);
            }
            MergeStrategy::Add => {
                current.entry(name).or_insert(values);
            }
            MergeStrategy::Multivalued => {
                let existing = current.entry(name).or_default();
                for value in values {
                    if !existing.contains(&value) {
                        existing.push(value);
                    }
                }
            }
        }
    }
    current
}
