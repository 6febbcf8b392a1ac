//! Authentication handlers for the static SSO plugin.
//!
//! Implements `AuthenticationHandler` on top of the account service.

use std::sync::Arc;

use async_trait::async_trait;
use sso_sdk::{
    AuthenticationHandler, Credential, FailureKind, HandlerError, HandlerResult, HandlerState,
    Principal, Service as RelyingParty,
};
use tracing::debug;

use super::service::Service;
use crate::config::{OneTimeCodeHandlerConfig, PasswordHandlerConfig};

/// Validates username/password credentials against the configured accounts.
pub struct PasswordHandler {
    service: Arc<Service>,
    name: String,
    order: i32,
    state: HandlerState,
}

impl PasswordHandler {
    #[must_use]
    pub fn new(service: Arc<Service>, cfg: &PasswordHandlerConfig) -> Self {
        Self {
            service,
            name: cfg.name.clone(),
            order: cfg.order,
            state: cfg.state,
        }
    }
}

#[async_trait]
impl AuthenticationHandler for PasswordHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn state(&self) -> HandlerState {
        self.state
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::UsernamePassword { .. })
    }

    async fn authenticate(
        &self,
        credential: &Credential,
        _service: Option<&RelyingParty>,
    ) -> Result<HandlerResult, HandlerError> {
        let Credential::UsernamePassword { username, password } = credential else {
            return Err(unsupported(credential));
        };
        let principal = self
            .service
            .check_password(username, password)
            .inspect_err(|e| debug!(handler = %self.name, kind = %e.kind, "password rejected"))?;
        Ok(success(&self.name, credential, principal))
    }
}

/// Validates single-use codes, typically as a second factor.
pub struct OneTimeCodeHandler {
    service: Arc<Service>,
    name: String,
    order: i32,
    state: HandlerState,
}

impl OneTimeCodeHandler {
    #[must_use]
    pub fn new(service: Arc<Service>, cfg: &OneTimeCodeHandlerConfig) -> Self {
        Self {
            service,
            name: cfg.name.clone(),
            order: cfg.order,
            state: cfg.state,
        }
    }
}

#[async_trait]
impl AuthenticationHandler for OneTimeCodeHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn state(&self) -> HandlerState {
        self.state
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::OneTimeCode { .. })
    }

    async fn authenticate(
        &self,
        credential: &Credential,
        _service: Option<&RelyingParty>,
    ) -> Result<HandlerResult, HandlerError> {
        let Credential::OneTimeCode { username, code } = credential else {
            return Err(unsupported(credential));
        };
        let principal = self
            .service
            .redeem_code(username, code)
            .inspect_err(|e| debug!(handler = %self.name, kind = %e.kind, "code rejected"))?;
        Ok(success(&self.name, credential, principal))
    }
}

fn success(handler: &str, credential: &Credential, principal: Principal) -> HandlerResult {
    HandlerResult {
        handler_name: handler.to_owned(),
        credential: credential.metadata(),
        principal,
        warnings: Vec::new(),
    }
}

fn unsupported(credential: &Credential) -> HandlerError {
    HandlerError::new(
        FailureKind::UnsupportedCredential,
        format!("{} is not supported", credential.kind().as_str()),
    )
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::config::{AccountStatus, StaticSsoAuthnPluginConfig, UserAccount};

    fn service() -> Arc<Service> {
        let mut cfg = StaticSsoAuthnPluginConfig::default();
        cfg.users.insert(
            "casuser".to_owned(),
            UserAccount {
                password: SecretString::from("Mellon".to_owned()),
                status: AccountStatus::Active,
                attributes: std::collections::BTreeMap::new(),
            },
        );
        let mut otp = OneTimeCodeHandlerConfig::default();
        otp.codes.insert(
            "casuser".to_owned(),
            vec![SecretString::from("314159".to_owned())],
        );
        cfg.one_time_code = Some(otp);
        Arc::new(Service::from_config(&cfg))
    }

    #[tokio::test]
    async fn password_handler_accepts_valid_credentials() {
        let handler = PasswordHandler::new(service(), &PasswordHandlerConfig::default());
        let plugin: &dyn AuthenticationHandler = &handler;
        let credential = Credential::username_password("casuser", "Mellon");

        assert!(plugin.supports(&credential));
        assert!(!plugin.supports(&Credential::one_time_code("casuser", "314159")));

        let result = plugin.authenticate(&credential, None).await.unwrap();
        assert_eq!(result.handler_name, "static");
        assert_eq!(result.principal.id(), "casuser");
        assert_eq!(result.credential, credential.metadata());
    }

    #[tokio::test]
    async fn password_handler_reports_failure_kind() {
        let handler = PasswordHandler::new(service(), &PasswordHandlerConfig::default());
        let plugin: &dyn AuthenticationHandler = &handler;

        let err = plugin
            .authenticate(&Credential::username_password("casuser", "wrong"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::BadCredentials);

        let err = plugin
            .authenticate(&Credential::one_time_code("casuser", "314159"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::UnsupportedCredential);
    }

    #[tokio::test]
    async fn code_handler_redeems_once() {
        let cfg = OneTimeCodeHandlerConfig::default();
        let handler = OneTimeCodeHandler::new(service(), &cfg);
        let plugin: &dyn AuthenticationHandler = &handler;
        let credential = Credential::one_time_code("casuser", "314159");

        assert_eq!(plugin.name(), "otp");
        assert_eq!(plugin.state(), HandlerState::Standby);
        assert_eq!(plugin.order(), 10);

        let result = plugin.authenticate(&credential, None).await.unwrap();
        assert_eq!(result.principal.id(), "casuser");

        let err = plugin.authenticate(&credential, None).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::AccountNotFound);
    }
}
