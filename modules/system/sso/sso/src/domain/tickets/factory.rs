//! Builds fully formed tickets: id, metadata and expiration policy.

use std::sync::Arc;

use sso_sdk::{
    Authentication, ExpirationPolicy, GrantingTicketState, Service, ServiceTicketPolicy,
    ServiceTicketState, Ticket, TicketKind, TicketMeta, TicketType,
};

use super::TicketIdGenerator;
use crate::config::{ServiceTicketConfig, TicketsConfig};
use crate::domain::clock::Clock;
use crate::domain::error::DomainError;

pub struct TicketFactory {
    ids: Arc<dyn TicketIdGenerator>,
    clock: Arc<dyn Clock>,
    config: TicketsConfig,
}

impl TicketFactory {
    #[must_use]
    pub fn new(ids: Arc<dyn TicketIdGenerator>, clock: Arc<dyn Clock>, config: TicketsConfig) -> Self {
        Self { ids, clock, config }
    }

    fn meta(&self, ticket_type: TicketType, policy: ExpirationPolicy) -> TicketMeta {
        TicketMeta::new(self.ids.generate(ticket_type), self.clock.now(), policy)
    }

    /// Session root for a fresh login. Remember-me sessions get the long-term policy.
    #[must_use]
    pub fn create_ticket_granting_ticket(&self, authentication: Authentication) -> Ticket {
        let policy = match (&self.config.tgt.remember_me, authentication.is_remember_me()) {
            (Some(long_term), true) => long_term.clone(),
            _ => self.config.tgt.expiration.clone(),
        };
        Ticket::new(
            self.meta(TicketType::TicketGranting, policy),
            TicketKind::TicketGranting(GrantingTicketState::root(authentication)),
        )
    }

    /// Service ticket under a ticket-granting ticket, or proxy ticket under a
    /// proxy-granting ticket.
    ///
    /// # Errors
    /// Returns an internal error if `granting` is not a granting ticket.
    pub fn create_service_ticket(
        &self,
        granting: &Ticket,
        service: &Service,
        from_new_login: bool,
        policy: Option<&ServiceTicketPolicy>,
    ) -> Result<Ticket, DomainError> {
        let (ticket_type, defaults) = match granting.ticket_type() {
            TicketType::TicketGranting => (TicketType::Service, &self.config.st),
            TicketType::ProxyGranting => (TicketType::Proxy, &self.config.pt),
            other => {
                return Err(DomainError::internal(format!(
                    "cannot issue a service ticket from a {other} ticket"
                )));
            }
        };
        let (time_to_live, max_uses) = effective_service_policy(defaults, policy);
        let state = ServiceTicketState {
            granting_ticket_id: granting.id().clone(),
            principal_id: granting.principal_id().to_owned(),
            service: service.clone(),
            consumed: false,
            from_new_login,
            max_uses,
        };
        let kind = match ticket_type {
            TicketType::Proxy => TicketKind::Proxy(state),
            _ => TicketKind::Service(state),
        };
        Ok(Ticket::new(
            self.meta(ticket_type, ExpirationPolicy::TimeToLive { time_to_live }),
            kind,
        ))
    }

    /// Proxy-granting ticket derived from `parent` for the proxying `service`,
    /// authenticated by its callback.
    ///
    /// # Errors
    /// Returns an internal error if `parent` is not a granting ticket.
    pub fn create_proxy_granting_ticket(
        &self,
        parent: &Ticket,
        service: &Service,
        callback_authentication: Authentication,
    ) -> Result<Ticket, DomainError> {
        let parent_state = parent.granting_state().ok_or_else(|| {
            DomainError::internal(format!(
                "cannot derive a proxy-granting ticket from a {} ticket",
                parent.ticket_type()
            ))
        })?;
        let mut proxy_chain = parent_state.proxy_chain.clone();
        proxy_chain.push(service.clone());
        let state = GrantingTicketState {
            authentication: callback_authentication,
            parent: Some(parent.id().clone()),
            services: Vec::new(),
            proxy_granting_tickets: Vec::new(),
            chained_authentications: parent_state.full_chain(),
            proxied_by: Some(service.clone()),
            proxy_chain,
            revoked: false,
        };
        Ok(Ticket::new(
            self.meta(
                TicketType::ProxyGranting,
                self.config.pgt.expiration.clone(),
            ),
            TicketKind::ProxyGranting(state),
        ))
    }
}

fn effective_service_policy(
    defaults: &ServiceTicketConfig,
    policy: Option<&ServiceTicketPolicy>,
) -> (std::time::Duration, u32) {
    let time_to_live = policy
        .and_then(|p| p.time_to_live)
        .unwrap_or(defaults.time_to_live);
    let max_uses = policy
        .and_then(|p| p.number_of_uses)
        .unwrap_or(defaults.number_of_uses)
        .max(1);
    (time_to_live, max_uses)
}
