use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single attribute value. Attribute sources produce strings, numbers and
/// booleans; JSON values keep them without a bespoke variant type.
pub type AttributeValue = serde_json::Value;

/// Multi-valued attributes keyed by name, ordered for deterministic output.
pub type Attributes = BTreeMap<String, Vec<AttributeValue>>;

/// The canonical subject of an authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    id: String,
    #[serde(default)]
    attributes: Attributes,
}

impl Principal {
    #[must_use]
    pub fn new(id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    /// Principal with no attributes.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self::new(id, Attributes::new())
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// First value of the named attribute, if any.
    #[must_use]
    pub fn first_attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name).and_then(|values| values.first())
    }

    /// Copy of this principal with a different attribute set.
    #[must_use]
    pub fn with_attributes(&self, attributes: Attributes) -> Self {
        Self::new(self.id.clone(), attributes)
    }
}
