//! Public API trait for the SSO facade.

use async_trait::async_trait;

use crate::error::SsoError;
use crate::models::{
    Assertion, AuthenticationTransaction, LogoutRequest, ProxyGrant, Service, SessionState,
    Ticket, TicketId, TicketStatistics,
};

/// Facade consumed by protocol adapters (CAS, SAML, OIDC endpoints).
#[async_trait]
pub trait CentralAuthenticationServiceClient: Send + Sync {
    /// Authenticate the transaction and open a login session.
    ///
    /// # Errors
    /// [`SsoError::Authentication`] with every handler failure.
    async fn create_ticket_granting_ticket(
        &self,
        transaction: AuthenticationTransaction,
    ) -> Result<Ticket, SsoError>;

    /// Issue a service ticket from a session. Passing a transaction forces
    /// re-authentication (renew).
    ///
    /// # Errors
    /// [`SsoError::InvalidTicket`] for a missing or expired session,
    /// [`SsoError::UnauthorizedService`] / [`SsoError::PolicyDenied`] when the
    /// service rejects it, [`SsoError::MixedPrincipal`] on a renew for another user.
    async fn grant_service_ticket(
        &self,
        ticket_granting_ticket_id: &TicketId,
        service: &Service,
        transaction: Option<AuthenticationTransaction>,
    ) -> Result<Ticket, SsoError>;

    /// Validate and consume a service ticket.
    ///
    /// # Errors
    /// [`SsoError::TicketAlreadyConsumed`], [`SsoError::InvalidTicket`],
    /// [`SsoError::ServiceMismatch`] or a policy error.
    async fn validate_service_ticket(
        &self,
        service_ticket_id: &TicketId,
        service: &Service,
    ) -> Result<Assertion, SsoError>;

    /// Validate and consume a service or proxy ticket; the assertion reports
    /// the proxy chain.
    ///
    /// # Errors
    /// Same as [`Self::validate_service_ticket`].
    async fn validate_proxy_ticket(
        &self,
        ticket_id: &TicketId,
        service: &Service,
    ) -> Result<Assertion, SsoError>;

    /// Validate a service or proxy ticket on behalf of a proxying service and
    /// mint a proxy-granting ticket bound to `callback_url`.
    ///
    /// # Errors
    /// [`SsoError::UnauthorizedService`] when the service may not proxy, plus
    /// the validation errors.
    async fn create_proxy_granting_ticket(
        &self,
        ticket_id: &TicketId,
        service: &Service,
        callback_url: &str,
    ) -> Result<ProxyGrant, SsoError>;

    /// Issue a proxy ticket for `target_service`.
    ///
    /// # Errors
    /// [`SsoError::InvalidTicket`] for a missing or expired proxy-granting
    /// ticket, plus the service access errors.
    async fn grant_proxy_ticket(
        &self,
        proxy_granting_ticket_id: &TicketId,
        target_service: &Service,
    ) -> Result<Ticket, SsoError>;

    /// Destroy a session and everything issued from it. Idempotent.
    /// Returns one logout request per distinct service, in issuance order.
    ///
    /// # Errors
    /// [`SsoError::System`] when storage fails mid-cascade; retrying is safe.
    async fn destroy_ticket_granting_ticket(
        &self,
        ticket_granting_ticket_id: &TicketId,
    ) -> Result<Vec<LogoutRequest>, SsoError>;

    /// Current state of a login session.
    ///
    /// # Errors
    /// [`SsoError::System`] when storage fails.
    async fn session_state(&self, ticket_granting_ticket_id: &TicketId)
    -> Result<SessionState, SsoError>;

    /// Administrative query: live tickets of a principal.
    ///
    /// # Errors
    /// [`SsoError::System`] when storage fails.
    async fn tickets_for_principal(&self, principal_id: &str) -> Result<Vec<Ticket>, SsoError>;

    /// Administrative query: live service and proxy tickets issued for `service`.
    ///
    /// # Errors
    /// [`SsoError::System`] when storage fails.
    async fn tickets_for_service(&self, service: &Service) -> Result<Vec<Ticket>, SsoError>;

    /// Administrative revocation of every session of a principal.
    ///
    /// # Errors
    /// [`SsoError::System`] when storage fails.
    async fn revoke_principal_sessions(
        &self,
        principal_id: &str,
    ) -> Result<Vec<LogoutRequest>, SsoError>;

    /// Number of live sessions and outstanding service tickets.
    ///
    /// # Errors
    /// [`SsoError::System`] when storage fails.
    async fn statistics(&self) -> Result<TicketStatistics, SsoError>;
}
