//! Selection of the handlers that take part in a transaction.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use sso_sdk::{
    AuthenticationHandler, AuthenticationTransaction, CredentialKind, HandlerState,
    RegisteredService,
};

pub type HandlerRef = Arc<dyn AuthenticationHandler>;

/// Picks the ordered subset of `handlers` applicable to `transaction`.
pub trait HandlerResolver: Send + Sync {
    fn resolve(
        &self,
        handlers: &[HandlerRef],
        transaction: &AuthenticationTransaction,
        registered: Option<&RegisteredService>,
    ) -> Vec<HandlerRef>;
}

fn supports_any(handler: &HandlerRef, transaction: &AuthenticationTransaction) -> bool {
    transaction
        .credentials()
        .iter()
        .any(|credential| handler.supports(credential))
}

fn sort_by_order(mut handlers: Vec<HandlerRef>) -> Vec<HandlerRef> {
    handlers.sort_by_key(|h| h.order());
    handlers
}

/// Active handlers supporting at least one presented credential, ascending by order.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHandlerResolver;

impl HandlerResolver for DefaultHandlerResolver {
    fn resolve(
        &self,
        handlers: &[HandlerRef],
        transaction: &AuthenticationTransaction,
        _registered: Option<&RegisteredService>,
    ) -> Vec<HandlerRef> {
        sort_by_order(
            handlers
                .iter()
                .filter(|h| h.state() != HandlerState::Standby && supports_any(h, transaction))
                .cloned()
                .collect(),
        )
    }
}

/// Handlers bound to credential kinds by name. Kinds without a binding
/// fall back to the inner resolver.
pub struct CredentialKindHandlerResolver {
    bindings: BTreeMap<CredentialKind, Vec<String>>,
    fallback: Arc<dyn HandlerResolver>,
}

impl CredentialKindHandlerResolver {
    #[must_use]
    pub fn new(
        bindings: BTreeMap<CredentialKind, Vec<String>>,
        fallback: Arc<dyn HandlerResolver>,
    ) -> Self {
        Self { bindings, fallback }
    }
}

impl HandlerResolver for CredentialKindHandlerResolver {
    fn resolve(
        &self,
        handlers: &[HandlerRef],
        transaction: &AuthenticationTransaction,
        registered: Option<&RegisteredService>,
    ) -> Vec<HandlerRef> {
        let bound: HashSet<&str> = transaction
            .credentials()
            .iter()
            .filter_map(|c| self.bindings.get(&c.kind()))
            .flatten()
            .map(String::as_str)
            .collect();
        if bound.is_empty() {
            return self.fallback.resolve(handlers, transaction, registered);
        }
        sort_by_order(
            handlers
                .iter()
                .filter(|h| bound.contains(h.name()) && supports_any(h, transaction))
                .cloned()
                .collect(),
        )
    }
}

/// Adds the handlers a registered service requires, standby ones included,
/// to whatever the inner resolver selected.
pub struct ServiceAwareHandlerResolver {
    inner: Arc<dyn HandlerResolver>,
}

impl ServiceAwareHandlerResolver {
    #[must_use]
    pub fn new(inner: Arc<dyn HandlerResolver>) -> Self {
        Self { inner }
    }
}

impl HandlerResolver for ServiceAwareHandlerResolver {
    fn resolve(
        &self,
        handlers: &[HandlerRef],
        transaction: &AuthenticationTransaction,
        registered: Option<&RegisteredService>,
    ) -> Vec<HandlerRef> {
        let mut selected = self.inner.resolve(handlers, transaction, registered);
        let Some(required) = registered
            .map(|r| &r.access_strategy.required_handlers)
            .filter(|r| !r.is_empty())
        else {
            return selected;
        };
        let present: HashSet<String> = selected.iter().map(|h| h.name().to_owned()).collect();
        selected.extend(
            handlers
                .iter()
                .filter(|h| {
                    required.iter().any(|name| name == h.name())
                        && !present.contains(h.name())
                        && supports_any(h, transaction)
                })
                .cloned(),
        );
        sort_by_order(selected)
    }
}
