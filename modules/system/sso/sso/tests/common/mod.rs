//! Shared fixtures for SSO integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::json;
use sso::config::SsoConfig;
use sso::domain::ManualClock;
use sso::domain::tickets::SeededTicketIdGenerator;
use sso::module::SsoModule;
use sso_sdk::{
    AuthenticationHandler, AuthenticationTransaction, Credential, FailureKind, HandlerError,
    HandlerResult, HandlerState, Principal, Service,
};

pub const APP: &str = "https://app.example.org";
pub const MAIL: &str = "https://mail.example.org";
pub const PORTAL: &str = "https://portal.example.org";
pub const MIDDLE: &str = "https://middle.example.org";
pub const BACKEND: &str = "https://backend.example.org";
pub const STRICT: &str = "https://strict.example.org";

/// Username/password handler over a fixed user table.
pub struct PasswordHandler {
    name: &'static str,
    order: i32,
    users: BTreeMap<&'static str, &'static str>,
    failure: FailureKind,
    delay: Option<Duration>,
    state: HandlerState,
}

impl PasswordHandler {
    pub fn new(name: &'static str, users: &[(&'static str, &'static str)]) -> Self {
        Self {
            name,
            order: 0,
            users: users.iter().copied().collect(),
            failure: FailureKind::BadCredentials,
            delay: None,
            state: HandlerState::Active,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Kind reported for rejected credentials.
    pub fn failing_with(mut self, failure: FailureKind) -> Self {
        self.failure = failure;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Only runs for services that require it.
    pub fn standby(mut self) -> Self {
        self.state = HandlerState::Standby;
        self
    }
}

#[async_trait]
impl AuthenticationHandler for PasswordHandler {
    fn name(&self) -> &str {
        self.name
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
        _service: Option<&Service>,
    ) -> Result<HandlerResult, HandlerError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let Credential::UsernamePassword { username, password } = credential else {
            return Err(HandlerError::new(FailureKind::UnsupportedCredential, "type"));
        };
        match self.users.get(username.as_str()) {
            Some(expected) if *expected == password.expose_secret() => Ok(HandlerResult {
                handler_name: self.name.to_owned(),
                credential: credential.metadata(),
                principal: Principal::with_id(username.clone()),
                warnings: Vec::new(),
            }),
            _ => Err(HandlerError::new(self.failure, "rejected")),
        }
    }
}

/// Configuration with a handful of registered services and attributes for `casuser`.
pub fn config() -> SsoConfig {
    serde_json::from_value(json!({
        "registry": {
            "operation_timeout": "1s",
            "cleaner": { "enabled": false }
        },
        "authentication": {
            "handler_timeout": "200ms",
            "attributes": {
                "casuser": {
                    "mail": ["casuser@example.org"],
                    "memberOf": ["staff", "admins"]
                }
            }
        },
        "services": {
            "cache_ttl": null,
            "definitions": [
                {
                    "id": 1, "name": "app",
                    "matcher": { "type": "exact", "url": APP },
                    "attribute_release": { "type": "return_allowed", "allowed": ["mail"] }
                },
                {
                    "id": 2, "name": "mail",
                    "matcher": { "type": "prefix", "prefix": MAIL },
                    "logout_type": "front_channel"
                },
                {
                    "id": 3, "name": "portal",
                    "matcher": { "type": "exact", "url": PORTAL },
                    "proxy_policy": { "type": "regex_callback", "pattern": "https://portal\\.example\\.org/.*" }
                },
                {
                    "id": 4, "name": "middle",
                    "matcher": { "type": "exact", "url": MIDDLE },
                    "proxy_policy": { "type": "regex_callback", "pattern": "https://middle\\.example\\.org/.*" }
                },
                {
                    "id": 5, "name": "backend",
                    "matcher": { "type": "exact", "url": BACKEND },
                    "attribute_release": { "type": "return_all" }
                },
                {
                    "id": 6, "name": "strict",
                    "matcher": { "type": "exact", "url": STRICT },
                    "access_strategy": { "sso_enabled": false }
                }
            ]
        }
    }))
    .unwrap()
}

pub struct Harness {
    pub module: SsoModule,
    pub clock: Arc<ManualClock>,
}

pub fn harness() -> Harness {
    harness_with(
        config(),
        vec![Arc::new(PasswordHandler::new(
            "static",
            &[("casuser", "Mellon"), ("other", "Mellon")],
        ))],
    )
}

pub fn harness_with(config: SsoConfig, handlers: Vec<Arc<dyn AuthenticationHandler>>) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let module = SsoModule::builder(config)
        .handlers(handlers)
        .clock(clock.clone())
        .ticket_ids(Arc::new(SeededTicketIdGenerator::new(42)))
        .build()
        .unwrap();
    Harness { module, clock }
}

pub fn login(username: &str, password: &str) -> AuthenticationTransaction {
    AuthenticationTransaction::new(vec![Credential::username_password(username, password)])
}
