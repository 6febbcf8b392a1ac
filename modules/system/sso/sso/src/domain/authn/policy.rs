//! Authentication policies: when a set of handler outcomes is enough.

use std::collections::BTreeMap;

use sso_sdk::{FailureKind, HandlerResult};

use crate::config::AuthenticationPolicyConfig;

/// Handler outcomes observed so far in a transaction.
#[derive(Debug, Clone, Copy)]
pub struct Outcomes<'a> {
    pub successes: &'a BTreeMap<String, HandlerResult>,
    pub failures: &'a BTreeMap<String, FailureKind>,
    /// Number of handlers resolved for the transaction.
    pub candidates: usize,
}

#[derive(Debug, Clone)]
pub struct AuthenticationPolicy {
    config: AuthenticationPolicyConfig,
}

impl AuthenticationPolicy {
    #[must_use]
    pub fn new(config: AuthenticationPolicyConfig) -> Self {
        Self { config }
    }

    /// Final verdict on the transaction.
    #[must_use]
    pub fn is_satisfied(&self, outcomes: Outcomes<'_>) -> bool {
        let succeeded = !outcomes.successes.is_empty();
        match &self.config {
            AuthenticationPolicyConfig::AtLeastOne => succeeded,
            AuthenticationPolicyConfig::AllHandlers => {
                succeeded && outcomes.failures.is_empty()
                    && outcomes.successes.len() >= outcomes.candidates
            }
            AuthenticationPolicyConfig::RequiredHandler { handler, .. } => {
                outcomes.successes.contains_key(handler)
            }
            AuthenticationPolicyConfig::NotPrevented => {
                succeeded && !outcomes.failures.values().any(|k| k.is_system())
            }
        }
    }

    /// Whether the remaining handlers for the current credential still run
    /// after a handler succeeded.
    #[must_use]
    pub fn continue_after_success(&self, outcomes: Outcomes<'_>) -> bool {
        match &self.config {
            AuthenticationPolicyConfig::RequiredHandler { try_all: true, .. } => true,
            _ => !self.is_satisfied(outcomes),
        }
    }

    /// Whether the chain goes on after a handler failed with `kind`.
    #[must_use]
    pub fn continue_after_failure(&self, kind: FailureKind) -> bool {
        match &self.config {
            AuthenticationPolicyConfig::NotPrevented => !kind.is_system(),
            _ => true,
        }
    }
}
