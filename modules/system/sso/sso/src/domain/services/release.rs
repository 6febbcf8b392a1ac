//! Attribute release and username selection for assertions.

use sso_sdk::{AttributeReleasePolicy, Attributes, Principal, RegisteredService};
use tracing::debug;

/// Attributes of `principal` the service is allowed to see.
#[must_use]
pub fn release_attributes(policy: &AttributeReleasePolicy, principal: &Principal) -> Attributes {
    let attributes = principal.attributes();
    match policy {
        AttributeReleasePolicy::ReturnAll => attributes.clone(),
        AttributeReleasePolicy::DenyAll => Attributes::new(),
        AttributeReleasePolicy::ReturnAllowed { allowed } => attributes
            .iter()
            .filter(|(name, _)| allowed.contains(name))
            .map(|(name, values)| (name.clone(), values.clone()))
            .collect(),
        AttributeReleasePolicy::ReturnMapped { mapping } => mapping
            .iter()
            .filter_map(|(source, target)| {
                attributes
                    .get(source)
                    .map(|values| (target.clone(), values.clone()))
            })
            .collect(),
    }
}

/// Username released to the service: the configured attribute's first
/// value, falling back to the principal id.
#[must_use]
pub fn resolve_username(registered: &RegisteredService, principal: &Principal) -> String {
    let Some(attribute) = registered.username_attribute.as_deref() else {
        return principal.id().to_owned();
    };
    match principal.first_attribute(attribute) {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
        Some(other) if !other.is_null() && !other.is_string() => other.to_string(),
        _ => {
            debug!(
                service_id = registered.id,
                attribute, "username attribute missing; releasing principal id"
            );
            principal.id().to_owned()
        }
    }
}

/// Principal as the service sees it.
#[must_use]
pub fn released_principal(registered: &RegisteredService, principal: &Principal) -> Principal {
    Principal::new(
        resolve_username(registered, principal),
        release_attributes(&registered.attribute_release, principal),
    )
}
