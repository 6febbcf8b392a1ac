//! Registered-service access strategy enforcement.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use regex::Regex;
use sso_sdk::{
    AttributeValue, Authentication, PolicyDenialReason, ProxyPolicy, RegisteredService, Service,
    UnauthorizedServiceReason,
};
use tracing::warn;

use crate::domain::error::DomainError;

/// Evaluates access strategies. Attribute and callback patterns are compiled
/// on first use and kept for the lifetime of the enforcer.
#[derive(Debug, Default)]
pub struct AccessEnforcer {
    patterns: DashMap<(bool, String), Option<Regex>>,
}

impl AccessEnforcer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whole-value match of `pattern` against `value`. Invalid patterns never match.
    fn is_full_match(&self, pattern: &str, case_insensitive: bool, value: &str) -> bool {
        let key = (case_insensitive, pattern.to_owned());
        let entry = self.patterns.entry(key).or_insert_with(|| {
            let flags = if case_insensitive { "(?i)" } else { "" };
            Regex::new(&format!("{flags}^(?:{pattern})$"))
                .inspect_err(|e| warn!(pattern, error = %e, "invalid access pattern"))
                .ok()
        });
        entry.as_ref().is_some_and(|re| re.is_match(value))
    }

    /// Service must be registered and enabled.
    ///
    /// # Errors
    /// [`DomainError::UnauthorizedService`].
    pub fn ensure_enabled<'a>(
        &self,
        service: &Service,
        registered: Option<&'a RegisteredService>,
    ) -> Result<&'a RegisteredService, DomainError> {
        let registered = registered.ok_or_else(|| {
            DomainError::unauthorized(service, UnauthorizedServiceReason::NotRegistered)
        })?;
        if !registered.access_strategy.enabled {
            return Err(DomainError::unauthorized(
                service,
                UnauthorizedServiceReason::Disabled,
            ));
        }
        Ok(registered)
    }

    /// A service that opted out of SSO only accepts tickets issued right
    /// after credentials were presented.
    ///
    /// # Errors
    /// [`DomainError::UnauthorizedService`] with `SsoNotAllowed`.
    pub fn ensure_sso_allowed(
        &self,
        service: &Service,
        registered: &RegisteredService,
        credentials_provided: bool,
    ) -> Result<(), DomainError> {
        if registered.access_strategy.sso_enabled || credentials_provided {
            Ok(())
        } else {
            Err(DomainError::unauthorized(
                service,
                UnauthorizedServiceReason::SsoNotAllowed,
            ))
        }
    }

    /// Access window, required attributes and required handlers.
    ///
    /// # Errors
    /// [`DomainError::PolicyDenied`].
    pub fn ensure_principal_allowed(
        &self,
        service: &Service,
        registered: &RegisteredService,
        authentication: &Authentication,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let strategy = &registered.access_strategy;
        let before_start = strategy.starting_date_time.is_some_and(|start| now < start);
        let after_end = strategy.ending_date_time.is_some_and(|end| now > end);
        if before_start || after_end {
            return Err(DomainError::policy_denied(
                service,
                PolicyDenialReason::OutsideAccessWindow,
            ));
        }

        if !strategy
            .required_handlers
            .iter()
            .all(|h| authentication.has_successful_handler(h))
        {
            return Err(DomainError::policy_denied(
                service,
                PolicyDenialReason::RequiredHandlerNotSatisfied,
            ));
        }

        if !self.required_attributes_satisfied(registered, authentication) {
            return Err(DomainError::policy_denied(
                service,
                PolicyDenialReason::MissingRequiredAttributes,
            ));
        }
        Ok(())
    }

    fn required_attributes_satisfied(
        &self,
        registered: &RegisteredService,
        authentication: &Authentication,
    ) -> bool {
        let strategy = &registered.access_strategy;
        if strategy.required_attributes.is_empty() {
            return true;
        }
        let attributes = authentication.principal().attributes();
        let mut satisfied = strategy
            .required_attributes
            .iter()
            .map(|(name, patterns)| {
                attributes.get(name).is_some_and(|values| {
                    values.iter().any(|value| {
                        let value = attribute_text(value);
                        patterns
                            .iter()
                            .any(|p| self.is_full_match(p, strategy.case_insensitive, &value))
                    })
                })
            });
        if strategy.require_all_attributes {
            satisfied.all(|ok| ok)
        } else {
            satisfied.any(|ok| ok)
        }
    }

    /// Proxying requires a proxy policy whose callback pattern accepts `callback_url`.
    ///
    /// # Errors
    /// [`DomainError::UnauthorizedService`] with `ProxyNotAllowed`.
    pub fn ensure_proxy_allowed(
        &self,
        service: &Service,
        registered: &RegisteredService,
        callback_url: &str,
    ) -> Result<(), DomainError> {
        let allowed = match &registered.proxy_policy {
            ProxyPolicy::Refuse => false,
            ProxyPolicy::RegexCallback { pattern } => {
                is_secure_url(callback_url) && self.is_full_match(pattern, false, callback_url)
            }
        };
        if allowed {
            Ok(())
        } else {
            Err(DomainError::unauthorized(
                service,
                UnauthorizedServiceReason::ProxyNotAllowed,
            ))
        }
    }
}

/// Proxy callbacks must be absolute https URLs.
fn is_secure_url(callback_url: &str) -> bool {
    url::Url::parse(callback_url).is_ok_and(|u| u.scheme() == "https" && u.host().is_some())
}

fn attribute_text(value: &AttributeValue) -> String {
    match value {
        AttributeValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeDelta;
    use serde_json::json;
    use sso_sdk::{Attributes, CredentialKind, CredentialMetadata, HandlerResult, Principal};

    use super::*;

    fn registered() -> RegisteredService {
        RegisteredService::exact(1, "https://app")
    }

    fn authentication(attrs: &[(&str, &[&str])], handlers: &[&str]) -> Authentication {
        let attributes: Attributes = attrs
            .iter()
            .map(|(k, vs)| ((*k).to_owned(), vs.iter().map(|v| json!(v)).collect()))
            .collect();
        let principal = Principal::new("casuser", attributes);
        let mut builder = Authentication::builder().principal(principal.clone());
        for h in handlers {
            builder = builder.add_success(HandlerResult {
                handler_name: (*h).to_owned(),
                credential: CredentialMetadata {
                    id: "casuser".to_owned(),
                    kind: CredentialKind::UsernamePassword,
                },
                principal: principal.clone(),
                warnings: Vec::new(),
            });
        }
        builder.build().unwrap()
    }

    fn svc() -> Service {
        Service::new("https://app")
    }

    #[test]
    fn unregistered_and_disabled_services_are_unauthorized() {
        let enforcer = AccessEnforcer::new();
        let err = enforcer.ensure_enabled(&svc(), None).unwrap_err();
        assert!(matches!(
            err,
            DomainError::UnauthorizedService {
                reason: UnauthorizedServiceReason::NotRegistered,
                ..
            }
        ));

        let mut disabled = registered();
        disabled.access_strategy.enabled = false;
        let err = enforcer.ensure_enabled(&svc(), Some(&disabled)).unwrap_err();
        assert!(matches!(
            err,
            DomainError::UnauthorizedService {
                reason: UnauthorizedServiceReason::Disabled,
                ..
            }
        ));
    }

    #[test]
    fn sso_disabled_requires_credentials() {
        let enforcer = AccessEnforcer::new();
        let mut reg = registered();
        reg.access_strategy.sso_enabled = false;

        assert!(enforcer.ensure_sso_allowed(&svc(), &reg, false).is_err());
        assert!(enforcer.ensure_sso_allowed(&svc(), &reg, true).is_ok());
    }

    #[test]
    fn access_window_is_enforced() {
        let enforcer = AccessEnforcer::new();
        let now = Utc::now();
        let mut reg = registered();
        reg.access_strategy.starting_date_time = Some(now + TimeDelta::hours(1));
        let auth = authentication(&[], &[]);

        let err = enforcer
            .ensure_principal_allowed(&svc(), &reg, &auth, now)
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::PolicyDenied {
                reason: PolicyDenialReason::OutsideAccessWindow,
                ..
            }
        ));
        assert!(
            enforcer
                .ensure_principal_allowed(&svc(), &reg, &auth, now + TimeDelta::hours(2))
                .is_ok()
        );
    }

    #[test]
    fn required_attributes_all_or_any() {
        let enforcer = AccessEnforcer::new();
        let mut reg = registered();
        reg.access_strategy.required_attributes = BTreeMap::from([
            ("memberOf".to_owned(), vec!["admins|staff".to_owned()]),
            ("cn".to_owned(), vec!["Cas.*".to_owned()]),
        ]);
        let staff_only = authentication(&[("memberOf", &["staff"])], &[]);
        let both = authentication(&[("memberOf", &["staff"]), ("cn", &["CasUser"])], &[]);
        let now = Utc::now();

        assert!(
            enforcer
                .ensure_principal_allowed(&svc(), &reg, &staff_only, now)
                .is_err()
        );
        assert!(enforcer.ensure_principal_allowed(&svc(), &reg, &both, now).is_ok());

        reg.access_strategy.require_all_attributes = false;
        assert!(
            enforcer
                .ensure_principal_allowed(&svc(), &reg, &staff_only, now)
                .is_ok()
        );
    }

    #[test]
    fn attribute_patterns_match_whole_values_and_honour_case() {
        let enforcer = AccessEnforcer::new();
        let mut reg = registered();
        reg.access_strategy.required_attributes =
            BTreeMap::from([("memberOf".to_owned(), vec!["admins".to_owned()])]);
        let now = Utc::now();

        let superset = authentication(&[("memberOf", &["not-admins"])], &[]);
        assert!(
            enforcer
                .ensure_principal_allowed(&svc(), &reg, &superset, now)
                .is_err()
        );

        let upper = authentication(&[("memberOf", &["ADMINS"])], &[]);
        assert!(enforcer.ensure_principal_allowed(&svc(), &reg, &upper, now).is_err());
        reg.access_strategy.case_insensitive = true;
        assert!(enforcer.ensure_principal_allowed(&svc(), &reg, &upper, now).is_ok());
    }

    #[test]
    fn required_handlers_must_have_succeeded() {
        let enforcer = AccessEnforcer::new();
        let mut reg = registered();
        reg.access_strategy.required_handlers = vec!["otp".to_owned()];
        let now = Utc::now();

        let password_only = authentication(&[], &["password"]);
        let err = enforcer
            .ensure_principal_allowed(&svc(), &reg, &password_only, now)
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::PolicyDenied {
                reason: PolicyDenialReason::RequiredHandlerNotSatisfied,
                ..
            }
        ));

        let mfa = authentication(&[], &["password", "otp"]);
        assert!(enforcer.ensure_principal_allowed(&svc(), &reg, &mfa, now).is_ok());
    }

    #[test]
    fn proxy_callback_must_be_https_and_match() {
        let enforcer = AccessEnforcer::new();
        let mut reg = registered();
        assert!(
            enforcer
                .ensure_proxy_allowed(&svc(), &reg, "https://proxy/cb")
                .is_err(),
            "refused by default"
        );

        reg.proxy_policy = ProxyPolicy::RegexCallback {
            pattern: "https://proxy\\.example\\.org/.*".to_owned(),
        };
        assert!(
            enforcer
                .ensure_proxy_allowed(&svc(), &reg, "https://proxy.example.org/cb")
                .is_ok()
        );
        assert!(
            enforcer
                .ensure_proxy_allowed(&svc(), &reg, "http://proxy.example.org/cb")
                .is_err()
        );
        assert!(
            enforcer
                .ensure_proxy_allowed(&svc(), &reg, "https://evil.example.org/cb")
                .is_err()
        );
    }
}
