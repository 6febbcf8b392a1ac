//! Attribute source backed by configuration.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sso_sdk::{AttributeRepository, AttributeRepositoryError, Attributes};

#[derive(Debug, Default, Clone)]
pub struct StaticAttributeRepository {
    attributes: BTreeMap<String, Attributes>,
}

impl StaticAttributeRepository {
    #[must_use]
    pub fn new(attributes: BTreeMap<String, Attributes>) -> Self {
        Self { attributes }
    }
}

#[async_trait]
impl AttributeRepository for StaticAttributeRepository {
    async fn attributes_for(
        &self,
        principal_id: &str,
    ) -> Result<Attributes, AttributeRepositoryError> {
        Ok(self
            .attributes
            .get(principal_id)
            .cloned()
            .unwrap_or_default())
    }
}
