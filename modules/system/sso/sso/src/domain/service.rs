//! Central authentication service: the ticket state machine driven by
//! protocol adapters.

use std::sync::Arc;

use sso_sdk::{
    Assertion, Authentication, AuthenticationTransaction, GrantingTicketState,
    InvalidTicketReason, LogoutRequest, ProxyGrant, RegisteredService, Service, SessionState,
    Ticket, TicketId, TicketStatistics, TicketType,
};
use tracing::{debug, info, warn};

use super::authn::AuthenticationManager;
use super::error::DomainError;
use super::services::{AccessEnforcer, ServiceCatalog, released_principal};
use super::tickets::{TicketFactory, TicketStore, revoke_tree};

const GRANTING: [TicketType; 2] = [TicketType::TicketGranting, TicketType::ProxyGranting];

/// SSO facade service.
pub struct CentralAuthenticationService {
    authentication: Arc<AuthenticationManager>,
    factory: TicketFactory,
    store: Arc<TicketStore>,
    catalog: Arc<ServiceCatalog>,
    enforcer: AccessEnforcer,
}

impl CentralAuthenticationService {
    #[must_use]
    pub fn new(
        authentication: Arc<AuthenticationManager>,
        factory: TicketFactory,
        store: Arc<TicketStore>,
        catalog: Arc<ServiceCatalog>,
    ) -> Self {
        Self {
            authentication,
            factory,
            store,
            catalog,
            enforcer: AccessEnforcer::new(),
        }
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Authenticate and open a login session.
    ///
    /// # Errors
    /// [`DomainError::Authentication`] with the aggregated failures, or a
    /// storage error.
    #[tracing::instrument(skip_all)]
    pub async fn create_ticket_granting_ticket(
        &self,
        transaction: AuthenticationTransaction,
    ) -> Result<Ticket, DomainError> {
        let registered = match transaction.service() {
            Some(service) => self.catalog.find(service).await?,
            None => None,
        };
        let authentication = self
            .authentication
            .authenticate(&transaction, registered.as_ref())
            .await?;
        let tgt = self.factory.create_ticket_granting_ticket(authentication);
        self.store.add(tgt.clone()).await?;
        info!(
            ticket_id = %tgt.id().abbreviated(),
            principal_id = tgt.principal_id(),
            "ticket-granting ticket created"
        );
        Ok(tgt)
    }

    /// Destroy a session and everything issued from it.
    ///
    /// # Errors
    /// [`DomainError::InvalidTicket`] for an id that is not a ticket-granting
    /// ticket id, or a storage error. An absent session yields no requests.
    #[tracing::instrument(skip_all, fields(ticket_id = %tgt_id.abbreviated()))]
    pub async fn destroy_ticket_granting_ticket(
        &self,
        tgt_id: &TicketId,
    ) -> Result<Vec<LogoutRequest>, DomainError> {
        if tgt_id.ticket_type() != Some(TicketType::TicketGranting) {
            return Err(DomainError::invalid_ticket(tgt_id, InvalidTicketReason::WrongType));
        }
        let revocation = revoke_tree(&self.store, tgt_id).await?;
        let requests = self.catalog.logout_requests(&revocation.granted).await;
        info!(
            deleted = revocation.deleted,
            services = requests.len(),
            "ticket-granting ticket destroyed"
        );
        Ok(requests)
    }

    /// # Errors
    /// [`DomainError::InvalidTicket`] for an id of another type, or a storage error.
    pub async fn session_state(&self, tgt_id: &TicketId) -> Result<SessionState, DomainError> {
        match self.store.get(tgt_id, TicketType::TicketGranting).await {
            Ok(tgt) => Ok(granting_state(&tgt)?.session_state()),
            Err(DomainError::InvalidTicket {
                reason: InvalidTicketReason::Absent,
                ..
            }) => Ok(SessionState::NoSession),
            Err(DomainError::InvalidTicket {
                reason: InvalidTicketReason::Expired | InvalidTicketReason::Revoked,
                ..
            }) => Ok(SessionState::Terminated),
            Err(e) => Err(e),
        }
    }

    /// Live tickets of a principal.
    ///
    /// # Errors
    /// Storage errors.
    pub async fn tickets_for_principal(&self, principal_id: &str) -> Result<Vec<Ticket>, DomainError> {
        let now = self.store.now();
        Ok(self
            .store
            .tickets_for_principal(principal_id)
            .await?
            .into_iter()
            .filter(|t| !t.is_expired(now))
            .collect())
    }

    /// Live service and proxy tickets issued for `service`.
    ///
    /// # Errors
    /// Storage errors.
    pub async fn tickets_for_service(&self, service: &Service) -> Result<Vec<Ticket>, DomainError> {
        let now = self.store.now();
        Ok(self
            .store
            .tickets_for_service(service)
            .await?
            .into_iter()
            .filter(|t| !t.is_expired(now))
            .collect())
    }

    /// Destroy every session of a principal.
    ///
    /// # Errors
    /// Storage errors. Sessions revoked before the failure stay revoked.
    #[tracing::instrument(skip_all, fields(principal_id = %principal_id))]
    pub async fn revoke_principal_sessions(
        &self,
        principal_id: &str,
    ) -> Result<Vec<LogoutRequest>, DomainError> {
        let sessions: Vec<TicketId> = self
            .store
            .tickets_for_principal(principal_id)
            .await?
            .into_iter()
            .filter(|t| t.ticket_type() == TicketType::TicketGranting)
            .map(|t| t.id().clone())
            .collect();
        let mut requests = Vec::new();
        for id in &sessions {
            requests.extend(self.destroy_ticket_granting_ticket(id).await?);
        }
        info!(sessions = sessions.len(), "principal sessions revoked");
        Ok(requests)
    }

    /// # Errors
    /// Storage errors.
    pub async fn statistics(&self) -> Result<TicketStatistics, DomainError> {
        Ok(TicketStatistics {
            sessions: self.store.session_count().await?,
            service_tickets: self.store.service_ticket_count().await?,
        })
    }

    // ========================================================================
    // Service tickets
    // ========================================================================

    /// Issue a service ticket from a session. With a transaction the
    /// credentials are re-authenticated first and the session's
    /// authentication is superseded by the fresh one.
    ///
    /// # Errors
    /// [`DomainError::InvalidTicket`], [`DomainError::UnauthorizedService`],
    /// [`DomainError::PolicyDenied`], [`DomainError::MixedPrincipal`] or
    /// authentication and storage errors.
    #[tracing::instrument(skip_all, fields(ticket_id = %tgt_id.abbreviated(), service = %service))]
    pub async fn grant_service_ticket(
        &self,
        tgt_id: &TicketId,
        service: &Service,
        transaction: Option<AuthenticationTransaction>,
    ) -> Result<Ticket, DomainError> {
        let tgt = self.store.get(tgt_id, TicketType::TicketGranting).await?;
        let found = self.catalog.find(service).await?;
        let registered = self.enforcer.ensure_enabled(service, found.as_ref())?;
        self.enforcer
            .ensure_sso_allowed(service, registered, transaction.is_some())?;

        let renewed = match &transaction {
            Some(tx) => Some(self.reauthenticate(&tgt, tx, registered).await?),
            None => None,
        };
        let authentication = match &renewed {
            Some(fresh) => fresh,
            None => &granting_state(&tgt)?.authentication,
        };
        self.enforcer
            .ensure_principal_allowed(service, registered, authentication, self.store.now())?;

        let st = self.factory.create_service_ticket(
            &tgt,
            service,
            renewed.is_some(),
            registered.ticket_policy.as_ref(),
        )?;
        self.issue(tgt_id, &[TicketType::TicketGranting], st, renewed.as_ref())
            .await
    }

    /// Validate and consume a service ticket.
    ///
    /// # Errors
    /// [`DomainError::TicketAlreadyConsumed`], [`DomainError::InvalidTicket`],
    /// [`DomainError::ServiceMismatch`] or a service policy error.
    #[tracing::instrument(skip_all, fields(ticket_id = %ticket_id.abbreviated(), service = %service))]
    pub async fn validate_service_ticket(
        &self,
        ticket_id: &TicketId,
        service: &Service,
    ) -> Result<Assertion, DomainError> {
        let (_, assertion) = self
            .validate(ticket_id, service, &[TicketType::Service])
            .await?;
        Ok(assertion)
    }

    /// Validate and consume a service or proxy ticket.
    ///
    /// # Errors
    /// Same as [`Self::validate_service_ticket`].
    #[tracing::instrument(skip_all, fields(ticket_id = %ticket_id.abbreviated(), service = %service))]
    pub async fn validate_proxy_ticket(
        &self,
        ticket_id: &TicketId,
        service: &Service,
    ) -> Result<Assertion, DomainError> {
        let (_, assertion) = self
            .validate(ticket_id, service, &[TicketType::Service, TicketType::Proxy])
            .await?;
        Ok(assertion)
    }

    // ========================================================================
    // Proxying
    // ========================================================================

    /// Validate a ticket on behalf of a proxying service and mint a
    /// proxy-granting ticket bound to its callback.
    ///
    /// # Errors
    /// [`DomainError::UnauthorizedService`] when proxying is not allowed,
    /// plus the validation errors.
    #[tracing::instrument(skip_all, fields(ticket_id = %ticket_id.abbreviated(), service = %service))]
    pub async fn create_proxy_granting_ticket(
        &self,
        ticket_id: &TicketId,
        service: &Service,
        callback_url: &str,
    ) -> Result<ProxyGrant, DomainError> {
        let found = self.catalog.find(service).await?;
        let registered = self.enforcer.ensure_enabled(service, found.as_ref())?;
        self.enforcer
            .ensure_proxy_allowed(service, registered, callback_url)?;

        let (ticket, assertion) = self
            .validate(ticket_id, service, &[TicketType::Service, TicketType::Proxy])
            .await?;
        let callback = self
            .authentication
            .authenticate_proxy_callback(callback_url, service)
            .await?;

        let parent_id = ticket
            .parent_id()
            .ok_or_else(|| DomainError::internal("service ticket without granting ticket"))?
            .clone();
        let parent = self.store.get_any(&parent_id, &GRANTING).await?;
        let pgt = self
            .factory
            .create_proxy_granting_ticket(&parent, service, callback)?;
        self.store.add(pgt.clone()).await?;

        let pgt_id = pgt.id().clone();
        let recorded = self
            .store
            .update_with(&parent_id, &GRANTING, |parent, now| {
                ensure_open(&parent_id, parent, now)?;
                granting_state_mut(parent)?.record_proxy_granting_ticket(pgt_id.clone());
                Ok(())
            })
            .await;
        if let Err(e) = recorded {
            self.discard(&pgt_id).await;
            return Err(e);
        }

        info!(
            pgt_id = %pgt_id.abbreviated(),
            hops = assertion.proxy_chain.len() + 1,
            "proxy-granting ticket created"
        );
        Ok(ProxyGrant {
            assertion,
            proxy_granting_ticket: pgt,
        })
    }

    /// Issue a proxy ticket for `target` from a proxy-granting ticket.
    ///
    /// # Errors
    /// [`DomainError::InvalidTicket`], [`DomainError::UnauthorizedService`],
    /// [`DomainError::PolicyDenied`] or a storage error.
    #[tracing::instrument(skip_all, fields(ticket_id = %pgt_id.abbreviated(), service = %target))]
    pub async fn grant_proxy_ticket(
        &self,
        pgt_id: &TicketId,
        target: &Service,
    ) -> Result<Ticket, DomainError> {
        let pgt = self.store.get(pgt_id, TicketType::ProxyGranting).await?;
        let found = self.catalog.find(target).await?;
        let registered = self.enforcer.ensure_enabled(target, found.as_ref())?;
        self.enforcer.ensure_sso_allowed(target, registered, false)?;
        let state = granting_state(&pgt)?;
        self.enforcer.ensure_principal_allowed(
            target,
            registered,
            primary_authentication(state),
            self.store.now(),
        )?;

        let pt = self.factory.create_service_ticket(
            &pgt,
            target,
            false,
            registered.ticket_policy.as_ref(),
        )?;
        self.issue(pgt_id, &[TicketType::ProxyGranting], pt, None)
            .await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn reauthenticate(
        &self,
        tgt: &Ticket,
        transaction: &AuthenticationTransaction,
        registered: &RegisteredService,
    ) -> Result<Authentication, DomainError> {
        let fresh = self
            .authentication
            .authenticate(transaction, Some(registered))
            .await?;
        let session = tgt.principal_id();
        if fresh.principal().id() != session {
            warn!(
                session_principal = session,
                presented_principal = fresh.principal().id(),
                "renew presented credentials of another principal"
            );
            return Err(DomainError::MixedPrincipal {
                session: session.to_owned(),
                presented: fresh.principal().id().to_owned(),
            });
        }
        Ok(fresh)
    }

    /// Store `ticket` and record it on its granting ticket. A cascade marks
    /// the granting ticket revoked before reading its children, so the
    /// record step either lands before the mark and the cascade deletes the
    /// ticket, or it fails and the ticket is discarded here.
    async fn issue(
        &self,
        granting_id: &TicketId,
        accepted: &[TicketType],
        ticket: Ticket,
        renewed: Option<&Authentication>,
    ) -> Result<Ticket, DomainError> {
        let service = ticket
            .service()
            .cloned()
            .ok_or_else(|| DomainError::internal("issued ticket without service"))?;
        let ticket_id = ticket.id().clone();
        self.store.add(ticket.clone()).await?;

        let recorded = self
            .store
            .update_with(granting_id, accepted, |granting, now| {
                ensure_open(granting_id, granting, now)?;
                granting.meta.record_use(now);
                let state = granting_state_mut(granting)?;
                if let Some(fresh) = renewed {
                    state.authentication = fresh.clone();
                }
                state.record_service(ticket_id.clone(), service.clone());
                Ok(())
            })
            .await;
        if let Err(e) = recorded {
            self.discard(&ticket_id).await;
            return Err(e);
        }

        info!(
            issued = %ticket_id.abbreviated(),
            ticket_type = %ticket.ticket_type(),
            from_new_login = renewed.is_some(),
            "ticket granted"
        );
        Ok(ticket)
    }

    /// Remove a ticket that could not be attached to its session.
    async fn discard(&self, id: &TicketId) {
        if let Err(e) = self.store.delete(id).await {
            warn!(ticket_id = %id.abbreviated(), error = %e, "failed to discard orphaned ticket");
        }
    }

    /// Consume a service or proxy ticket and build the assertion.
    async fn validate(
        &self,
        ticket_id: &TicketId,
        service: &Service,
        accepted: &[TicketType],
    ) -> Result<(Ticket, Assertion), DomainError> {
        let (ticket, issued_for) = self
            .store
            .update_with(ticket_id, accepted, |ticket, now| {
                consume(ticket_id, ticket, service, now)
            })
            .await?;
        if &issued_for != service {
            warn!(expected = %issued_for, "ticket presented by another service; ticket burned");
            return Err(DomainError::ServiceMismatch {
                id: ticket_id.clone(),
                expected: issued_for,
                presented: service.clone(),
            });
        }
        let state = ticket
            .service_state()
            .ok_or_else(|| DomainError::internal("validated ticket without service state"))?;

        let granting = self
            .store
            .get_any(&state.granting_ticket_id, &GRANTING)
            .await
            .map_err(|e| match e {
                DomainError::InvalidTicket { reason, .. } => {
                    debug!(%reason, "granting ticket no longer valid");
                    DomainError::invalid_ticket(ticket_id, reason)
                }
                other => other,
            })?;
        let granting = granting_state(&granting)?;

        let found = self.catalog.find(service).await?;
        let registered = self.enforcer.ensure_enabled(service, found.as_ref())?;
        let primary = primary_authentication(granting);
        self.enforcer
            .ensure_principal_allowed(service, registered, primary, self.store.now())?;

        let assertion = Assertion {
            principal: released_principal(registered, primary.principal()),
            service: service.clone(),
            chained_authentications: granting.full_chain(),
            proxy_chain: granting.proxy_chain.clone(),
            from_new_login: state.from_new_login,
        };
        info!(
            principal_id = assertion.principal.id(),
            proxied = assertion.is_proxied(),
            "ticket validated"
        );
        Ok((ticket, assertion))
    }
}

/// Check-and-consume step of a validation, run inside the conditional
/// update. Returns the service the ticket was issued for. A mismatching
/// service still consumes the ticket.
fn consume(
    id: &TicketId,
    ticket: &mut Ticket,
    presented: &Service,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Service, DomainError> {
    let expired = ticket.is_expired(now);
    let throttled = ticket
        .meta
        .expiration_policy
        .is_throttled(&ticket.meta, now);
    let state = ticket
        .service_state()
        .ok_or_else(|| DomainError::invalid_ticket(id, InvalidTicketReason::WrongType))?;
    if state.consumed {
        return Err(DomainError::TicketAlreadyConsumed(id.clone()));
    }
    if expired {
        return Err(DomainError::invalid_ticket(id, InvalidTicketReason::Expired));
    }
    if throttled {
        return Err(DomainError::invalid_ticket(id, InvalidTicketReason::Throttled));
    }
    let issued_for = state.service.clone();
    let max_uses = state.max_uses;

    ticket.meta.record_use(now);
    let exhausted = ticket.meta.count_of_uses >= max_uses;
    if let Some(state) = ticket.service_state_mut() {
        state.consumed = exhausted || &issued_for != presented;
    }
    Ok(issued_for)
}

/// A granting ticket may take new children only while unexpired and not
/// being revoked.
fn ensure_open(
    id: &TicketId,
    granting: &Ticket,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<(), DomainError> {
    if granting.is_expired(now) {
        return Err(DomainError::invalid_ticket(id, InvalidTicketReason::Expired));
    }
    if granting_state(granting)?.revoked {
        return Err(DomainError::invalid_ticket(id, InvalidTicketReason::Revoked));
    }
    Ok(())
}

fn granting_state(ticket: &Ticket) -> Result<&GrantingTicketState, DomainError> {
    ticket.granting_state().ok_or_else(|| {
        DomainError::internal(format!("{} ticket has no session state", ticket.ticket_type()))
    })
}

fn granting_state_mut(ticket: &mut Ticket) -> Result<&mut GrantingTicketState, DomainError> {
    let ticket_type = ticket.ticket_type();
    ticket
        .granting_state_mut()
        .ok_or_else(|| DomainError::internal(format!("{ticket_type} ticket has no session state")))
}

/// The original login of a (possibly proxied) session.
fn primary_authentication(state: &GrantingTicketState) -> &Authentication {
    state
        .chained_authentications
        .first()
        .unwrap_or(&state.authentication)
}
