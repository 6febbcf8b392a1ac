use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AttributeValue, Attributes, CredentialMetadata, Principal};
use crate::error::UnresolvedPrincipal;

/// Names of the metadata attributes the authentication manager records.
pub mod attribute_names {
    pub const AUTHENTICATION_METHOD: &str = "authenticationMethod";
    pub const SUCCESSFUL_HANDLERS: &str = "successfulAuthenticationHandlers";
    pub const CREDENTIAL_TYPE: &str = "credentialType";
    pub const REMEMBER_ME: &str = "rememberMe";
}

/// Outcome of one handler validating one credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResult {
    pub handler_name: String,
    pub credential: CredentialMetadata,
    /// Principal as seen by the handler, before principal resolution.
    pub principal: Principal,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Why a handler rejected a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    BadCredentials,
    AccountNotFound,
    AccountDisabled,
    AccountLocked,
    CredentialsExpired,
    AccountPasswordMustChange,
    /// Handler did not answer within its deadline or reported itself offline.
    HandlerUnavailable,
    /// No handler accepted the credential type.
    UnsupportedCredential,
    /// Handlers ran but the configured authentication policy rejected the result.
    PolicyNotSatisfied,
    PrincipalResolution,
    /// Unclassified error inside a handler or its backend.
    System,
}

impl FailureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadCredentials => "bad_credentials",
            Self::AccountNotFound => "account_not_found",
            Self::AccountDisabled => "account_disabled",
            Self::AccountLocked => "account_locked",
            Self::CredentialsExpired => "credentials_expired",
            Self::AccountPasswordMustChange => "account_password_must_change",
            Self::HandlerUnavailable => "handler_unavailable",
            Self::UnsupportedCredential => "unsupported_credential",
            Self::PolicyNotSatisfied => "policy_not_satisfied",
            Self::PrincipalResolution => "principal_resolution",
            Self::System => "system",
        }
    }

    /// Whether the failure says nothing about the credential itself.
    #[must_use]
    pub const fn is_system(self) -> bool {
        matches!(self, Self::HandlerUnavailable | Self::System)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful authentication transaction.
///
/// Immutable once built. Superseding an authentication means building a new
/// value from [`Authentication::to_builder`]; holders of the old value keep
/// seeing a consistent snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authentication {
    principal: Principal,
    successes: BTreeMap<String, HandlerResult>,
    #[serde(default)]
    failures: BTreeMap<String, FailureKind>,
    #[serde(default)]
    attributes: Attributes,
    #[serde(default)]
    credentials: Vec<CredentialMetadata>,
    authentication_date: DateTime<Utc>,
}

impl Authentication {
    #[must_use]
    pub fn builder() -> AuthenticationBuilder {
        AuthenticationBuilder::default()
    }

    /// Builder seeded with a copy of this authentication.
    #[must_use]
    pub fn to_builder(&self) -> AuthenticationBuilder {
        AuthenticationBuilder {
            principal: Some(self.principal.clone()),
            successes: self.successes.clone(),
            failures: self.failures.clone(),
            attributes: self.attributes.clone(),
            credentials: self.credentials.clone(),
            authentication_date: Some(self.authentication_date),
        }
    }

    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    #[must_use]
    pub fn successes(&self) -> &BTreeMap<String, HandlerResult> {
        &self.successes
    }

    #[must_use]
    pub fn failures(&self) -> &BTreeMap<String, FailureKind> {
        &self.failures
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub fn credentials(&self) -> &[CredentialMetadata] {
        &self.credentials
    }

    #[must_use]
    pub fn authentication_date(&self) -> DateTime<Utc> {
        self.authentication_date
    }

    /// Copy with the principal replaced, e.g. after attribute release.
    #[must_use]
    pub fn with_principal(&self, principal: Principal) -> Self {
        Self {
            principal,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn is_remember_me(&self) -> bool {
        self.attributes
            .get(attribute_names::REMEMBER_ME)
            .is_some_and(|values| values.iter().any(|v| v.as_bool() == Some(true)))
    }

    #[must_use]
    pub fn has_successful_handler(&self, name: &str) -> bool {
        self.successes.contains_key(name)
    }
}

/// Builder for [`Authentication`].
#[derive(Debug, Clone, Default)]
pub struct AuthenticationBuilder {
    principal: Option<Principal>,
    successes: BTreeMap<String, HandlerResult>,
    failures: BTreeMap<String, FailureKind>,
    attributes: Attributes,
    credentials: Vec<CredentialMetadata>,
    authentication_date: Option<DateTime<Utc>>,
}

impl AuthenticationBuilder {
    #[must_use]
    pub fn principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    #[must_use]
    pub fn add_success(mut self, result: HandlerResult) -> Self {
        self.successes.insert(result.handler_name.clone(), result);
        self
    }

    #[must_use]
    pub fn add_failure(mut self, handler_name: impl Into<String>, kind: FailureKind) -> Self {
        self.failures.insert(handler_name.into(), kind);
        self
    }

    #[must_use]
    pub fn add_credential(mut self, credential: CredentialMetadata) -> Self {
        if !self.credentials.contains(&credential) {
            self.credentials.push(credential);
        }
        self
    }

    /// Append a value to a (possibly new) attribute, skipping duplicates.
    #[must_use]
    pub fn add_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        let values = self.attributes.entry(name.into()).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
        self
    }

    /// Replace an attribute with a single value.
    #[must_use]
    pub fn set_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(name.into(), vec![value]);
        self
    }

    #[must_use]
    pub fn authentication_date(mut self, date: DateTime<Utc>) -> Self {
        self.authentication_date = Some(date);
        self
    }

    #[must_use]
    pub fn successes(&self) -> &BTreeMap<String, HandlerResult> {
        &self.successes
    }

    #[must_use]
    pub fn failures(&self) -> &BTreeMap<String, FailureKind> {
        &self.failures
    }

    #[must_use]
    pub fn credentials(&self) -> &[CredentialMetadata] {
        &self.credentials
    }

    #[must_use]
    pub fn current_principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Finish the authentication.
    ///
    /// # Errors
    /// Returns [`UnresolvedPrincipal`] if no principal was set or its id is empty.
    pub fn build(self) -> Result<Authentication, UnresolvedPrincipal> {
        let principal = self
            .principal
            .filter(|p| !p.id().is_empty())
            .ok_or(UnresolvedPrincipal)?;
        Ok(Authentication {
            principal,
            successes: self.successes,
            failures: self.failures,
            attributes: self.attributes,
            credentials: self.credentials,
            authentication_date: self.authentication_date.unwrap_or_else(Utc::now),
        })
    }
}

/// One entry of an aggregated authentication failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    /// Handler that reported the failure; `None` once redacted.
    pub handler: Option<String>,
    pub kind: FailureKind,
}

/// Every failure observed during one authentication transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthenticationFailure {
    entries: Vec<FailureEntry>,
}

impl AuthenticationFailure {
    #[must_use]
    pub fn new(entries: Vec<FailureEntry>) -> Self {
        Self { entries }
    }

    /// Failure not attributable to a particular handler.
    #[must_use]
    pub fn single(kind: FailureKind) -> Self {
        Self {
            entries: vec![FailureEntry {
                handler: None,
                kind,
            }],
        }
    }

    /// Failures recorded per handler name.
    #[must_use]
    pub fn from_handler_failures(failures: &BTreeMap<String, FailureKind>) -> Self {
        Self {
            entries: failures
                .iter()
                .map(|(name, kind)| FailureEntry {
                    handler: Some(name.clone()),
                    kind: *kind,
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn with(mut self, handler: Option<String>, kind: FailureKind) -> Self {
        self.entries.push(FailureEntry { handler, kind });
        self
    }

    #[must_use]
    pub fn entries(&self) -> &[FailureEntry] {
        &self.entries
    }

    /// Distinct failure kinds, ordered.
    #[must_use]
    pub fn kinds(&self) -> BTreeSet<FailureKind> {
        self.entries.iter().map(|e| e.kind).collect()
    }

    #[must_use]
    pub fn contains(&self, kind: FailureKind) -> bool {
        self.entries.iter().any(|e| e.kind == kind)
    }

    /// True when nothing was learned about the credentials: every entry is
    /// an outage or an unclassified error.
    #[must_use]
    pub fn is_system_failure(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|e| e.kind.is_system())
    }

    /// Copy without handler names.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|e| FailureEntry {
                    handler: None,
                    kind: e.kind,
                })
                .collect(),
        }
    }
}

impl fmt::Display for AuthenticationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for entry in &self.entries {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            match &entry.handler {
                Some(handler) => write!(f, "{handler}: {}", entry.kind)?,
                None => write!(f, "{}", entry.kind)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::CredentialKind;

    fn result(handler: &str, user: &str) -> HandlerResult {
        HandlerResult {
            handler_name: handler.to_owned(),
            credential: CredentialMetadata {
                id: user.to_owned(),
                kind: CredentialKind::UsernamePassword,
            },
            principal: Principal::with_id(user),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn build_requires_principal() {
        assert_eq!(Authentication::builder().build(), Err(UnresolvedPrincipal));
        assert_eq!(
            Authentication::builder()
                .principal(Principal::with_id(""))
                .build(),
            Err(UnresolvedPrincipal)
        );
    }

    #[test]
    fn to_builder_produces_new_value_leaving_original_untouched() {
        let original = Authentication::builder()
            .principal(Principal::with_id("casuser"))
            .add_success(result("pwd", "casuser"))
            .build()
            .unwrap();

        let superseded = original
            .to_builder()
            .set_attribute(attribute_names::REMEMBER_ME, json!(true))
            .build()
            .unwrap();

        assert!(!original.is_remember_me());
        assert!(superseded.is_remember_me());
        assert_eq!(
            original.authentication_date(),
            superseded.authentication_date()
        );
        assert!(superseded.has_successful_handler("pwd"));
    }

    #[test]
    fn add_attribute_skips_duplicates() {
        let auth = Authentication::builder()
            .principal(Principal::with_id("casuser"))
            .add_attribute("m", json!("a"))
            .add_attribute("m", json!("a"))
            .add_attribute("m", json!("b"))
            .build()
            .unwrap();
        assert_eq!(auth.attributes()["m"], vec![json!("a"), json!("b")]);
    }

    #[test]
    fn failure_set_keeps_all_kinds_and_redacts() {
        let failure = AuthenticationFailure::default()
            .with(Some("pwd".to_owned()), FailureKind::BadCredentials)
            .with(Some("ldap".to_owned()), FailureKind::AccountLocked);

        assert_eq!(
            failure.kinds().into_iter().collect::<Vec<_>>(),
            vec![FailureKind::BadCredentials, FailureKind::AccountLocked]
        );
        assert!(!failure.is_system_failure());

        let redacted = failure.redacted();
        assert!(redacted.entries().iter().all(|e| e.handler.is_none()));
        assert_eq!(redacted.to_string(), "bad_credentials, account_locked");
    }

    #[test]
    fn system_failure_requires_only_system_kinds() {
        let outage = AuthenticationFailure::single(FailureKind::HandlerUnavailable)
            .with(None, FailureKind::System);
        assert!(outage.is_system_failure());
        assert!(!AuthenticationFailure::default().is_system_failure());
    }
}
