//! Authentication chain: runs the resolved handlers over every presented
//! credential and aggregates their outcomes into one [`Authentication`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sso_sdk::{
    Authentication, AuthenticationBuilder, AuthenticationFailure, AuthenticationHandler,
    AuthenticationTransaction, Credential, CredentialKind, FailureKind, HandlerResult, Principal,
    PrincipalResolver, RegisteredService, Service, attribute_names,
};
use tracing::{debug, info, warn};

use super::callback::{PROXY_CALLBACK_HANDLER, ProxyCallbackHandler};
use super::policy::{AuthenticationPolicy, Outcomes};
use super::resolver::{HandlerRef, HandlerResolver};
use crate::config::AuthenticationConfig;
use crate::domain::clock::Clock;
use crate::domain::error::DomainError;

pub struct AuthenticationManager {
    handlers: Vec<HandlerRef>,
    resolver: Arc<dyn HandlerResolver>,
    principal_resolver: Arc<dyn PrincipalResolver>,
    policy: AuthenticationPolicy,
    handler_timeout: Duration,
    resolution_failure_fatal: bool,
    clock: Arc<dyn Clock>,
}

impl AuthenticationManager {
    #[must_use]
    pub fn new(
        handlers: Vec<HandlerRef>,
        resolver: Arc<dyn HandlerResolver>,
        principal_resolver: Arc<dyn PrincipalResolver>,
        config: &AuthenticationConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            handlers,
            resolver,
            principal_resolver,
            policy: AuthenticationPolicy::new(config.policy.clone()),
            handler_timeout: config.handler_timeout,
            resolution_failure_fatal: config.principal_resolution_failure_fatal,
            clock,
        }
    }

    #[must_use]
    pub fn handlers(&self) -> &[HandlerRef] {
        &self.handlers
    }

    /// Authenticate every credential of `transaction`.
    ///
    /// `registered` is the service the transaction targets, if any; it lets
    /// the resolver pull in handlers the service requires, and the chain
    /// keeps going until those have run.
    ///
    /// # Errors
    /// [`DomainError::Authentication`] carrying every handler failure, plus
    /// a policy entry when handlers succeeded but the policy is not met.
    #[tracing::instrument(skip_all, fields(credentials = transaction.credentials().len()))]
    pub async fn authenticate(
        &self,
        transaction: &AuthenticationTransaction,
        registered: Option<&RegisteredService>,
    ) -> Result<Authentication, DomainError> {
        let unsupported = || {
            DomainError::Authentication(AuthenticationFailure::single(
                FailureKind::UnsupportedCredential,
            ))
        };
        if transaction.credentials().is_empty() {
            return Err(unsupported());
        }

        let candidates = self.resolver.resolve(&self.handlers, transaction, registered);
        let required = registered.map_or(&[][..], |r| &r.access_strategy.required_handlers[..]);
        debug!(
            handlers = ?candidates.iter().map(|h| h.name()).collect::<Vec<_>>(),
            "resolved authentication handlers"
        );

        let mut builder = transaction
            .credentials()
            .iter()
            .fold(Authentication::builder(), |b, c| b.add_credential(c.metadata()));
        let mut attempted = false;

        'credentials: for credential in transaction.credentials() {
            for handler in candidates.iter().filter(|h| h.supports(credential)) {
                attempted = true;
                match self.attempt(handler, credential, transaction.service()).await {
                    Ok((result, principal)) => {
                        builder = builder.principal(principal).add_success(result);
                        let outcomes = Outcomes {
                            successes: builder.successes(),
                            failures: builder.failures(),
                            candidates: candidates.len(),
                        };
                        let required_pending = required
                            .iter()
                            .any(|name| !outcomes.successes.contains_key(name));
                        if !required_pending && !self.policy.continue_after_success(outcomes) {
                            break;
                        }
                    }
                    Err(kind) => {
                        builder = builder.add_failure(handler.name(), kind);
                        if !self.policy.continue_after_failure(kind) {
                            debug!(handler = handler.name(), %kind, "authentication chain stopped");
                            break 'credentials;
                        }
                    }
                }
            }
        }

        if !attempted {
            info!("no authentication handler supports the presented credentials");
            return Err(unsupported());
        }
        if builder.successes().is_empty() {
            let failure = AuthenticationFailure::from_handler_failures(builder.failures());
            info!(failures = %failure, "authentication failed");
            return Err(DomainError::Authentication(failure));
        }
        let satisfied = self.policy.is_satisfied(Outcomes {
            successes: builder.successes(),
            failures: builder.failures(),
            candidates: candidates.len(),
        });
        if !satisfied {
            let failure = AuthenticationFailure::from_handler_failures(builder.failures())
                .with(None, FailureKind::PolicyNotSatisfied);
            info!(failures = %failure, "authentication policy not satisfied");
            return Err(DomainError::Authentication(failure));
        }

        let authentication = with_metadata(builder, transaction.is_remember_me())
            .authentication_date(self.clock.now())
            .build()
            .map_err(|_| {
                DomainError::Authentication(AuthenticationFailure::single(
                    FailureKind::PrincipalResolution,
                ))
            })?;
        info!(
            principal_id = authentication.principal().id(),
            handlers = authentication.successes().len(),
            "authentication succeeded"
        );
        Ok(authentication)
    }

    /// Authenticate a proxy callback endpoint. Runs outside the configured
    /// chain and policy: the callback is the only credential involved.
    ///
    /// # Errors
    /// [`DomainError::Authentication`] when the callback is rejected.
    pub async fn authenticate_proxy_callback(
        &self,
        callback_url: &str,
        service: &Service,
    ) -> Result<Authentication, DomainError> {
        let credential = Credential::HttpBasedService {
            callback_url: callback_url.to_owned(),
        };
        let result = self
            .invoke(&ProxyCallbackHandler, &credential, Some(service))
            .await
            .map_err(|kind| {
                DomainError::Authentication(
                    AuthenticationFailure::default()
                        .with(Some(PROXY_CALLBACK_HANDLER.to_owned()), kind),
                )
            })?;
        let builder = Authentication::builder()
            .principal(result.principal.clone())
            .add_credential(credential.metadata())
            .add_success(result);
        with_metadata(builder, false)
            .authentication_date(self.clock.now())
            .build()
            .map_err(|_| {
                DomainError::Authentication(AuthenticationFailure::single(
                    FailureKind::PrincipalResolution,
                ))
            })
    }

    async fn attempt(
        &self,
        handler: &HandlerRef,
        credential: &Credential,
        service: Option<&Service>,
    ) -> Result<(HandlerResult, Principal), FailureKind> {
        let result = self.invoke(handler.as_ref(), credential, service).await?;
        let principal = self
            .resolve_principal(handler.name(), credential, &result)
            .await?;
        Ok((result, principal))
    }

    async fn invoke(
        &self,
        handler: &dyn AuthenticationHandler,
        credential: &Credential,
        service: Option<&Service>,
    ) -> Result<HandlerResult, FailureKind> {
        let name = handler.name();
        match tokio::time::timeout(
            self.handler_timeout,
            handler.authenticate(credential, service),
        )
        .await
        {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                if e.kind.is_system() {
                    warn!(handler = name, error = %e, "authentication handler failed");
                } else {
                    debug!(handler = name, error = %e, "credential rejected");
                }
                Err(e.kind)
            }
            Err(_) => {
                warn!(handler = name, timeout = ?self.handler_timeout, "authentication handler timed out");
                Err(FailureKind::HandlerUnavailable)
            }
        }
    }

    async fn resolve_principal(
        &self,
        handler_name: &str,
        credential: &Credential,
        result: &HandlerResult,
    ) -> Result<Principal, FailureKind> {
        if !self.principal_resolver.supports(credential) {
            return Ok(result.principal.clone());
        }
        let resolved = self
            .principal_resolver
            .resolve(credential, Some(&result.principal), handler_name)
            .await;
        match resolved {
            Ok(Some(principal)) => Ok(principal),
            outcome => {
                let reason = match outcome {
                    Err(e) => e.to_string(),
                    Ok(_) => "no principal".to_owned(),
                };
                if self.resolution_failure_fatal {
                    warn!(handler = handler_name, %reason, "principal resolution failed");
                    Err(FailureKind::PrincipalResolution)
                } else {
                    warn!(handler = handler_name, %reason, "principal resolution failed; using handler principal");
                    Ok(result.principal.clone())
                }
            }
        }
    }
}

/// Record which handlers and credential types produced the authentication.
fn with_metadata(builder: AuthenticationBuilder, remember_me: bool) -> AuthenticationBuilder {
    let handlers: Vec<String> = builder.successes().keys().cloned().collect();
    let kinds: Vec<CredentialKind> = builder
        .successes()
        .values()
        .map(|r| r.credential.kind)
        .collect();
    let mut builder = builder;
    for name in handlers {
        builder = builder
            .add_attribute(attribute_names::AUTHENTICATION_METHOD, json!(name))
            .add_attribute(attribute_names::SUCCESSFUL_HANDLERS, json!(name));
    }
    for kind in kinds {
        builder = builder.add_attribute(attribute_names::CREDENTIAL_TYPE, json!(kind.as_str()));
    }
    if remember_me {
        builder = builder.set_attribute(attribute_names::REMEMBER_ME, json!(true));
    }
    builder
}
