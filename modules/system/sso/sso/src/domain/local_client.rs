//! Local (in-process) client for the SSO facade.

use std::sync::Arc;

use async_trait::async_trait;
use sso_sdk::{
    Assertion, AuthenticationTransaction, CentralAuthenticationServiceClient, LogoutRequest,
    ProxyGrant, Service, SessionState, SsoError, Ticket, TicketId, TicketStatistics,
};

use super::{CentralAuthenticationService, DomainError};

/// Local client wrapping the facade service.
///
/// Handed to protocol adapters by [`crate::module::SsoModule::client`].
pub struct SsoLocalClient {
    svc: Arc<CentralAuthenticationService>,
    expose_handler_names: bool,
}

impl SsoLocalClient {
    #[must_use]
    pub fn new(svc: Arc<CentralAuthenticationService>, expose_handler_names: bool) -> Self {
        Self {
            svc,
            expose_handler_names,
        }
    }

    fn log_and_convert(&self, op: &str, e: DomainError) -> SsoError {
        match &e {
            DomainError::Authentication(failure) if failure.is_system_failure() => {
                tracing::error!(operation = op, error = %e, "sso call failed");
            }
            DomainError::Authentication(_)
            | DomainError::InvalidTicket { .. }
            | DomainError::TicketAlreadyConsumed(_) => {
                tracing::debug!(operation = op, error = %e, "sso call rejected");
            }
            DomainError::UnauthorizedService { .. }
            | DomainError::ServiceMismatch { .. }
            | DomainError::PolicyDenied { .. }
            | DomainError::MixedPrincipal { .. } => {
                tracing::warn!(operation = op, error = %e, "sso call rejected");
            }
            DomainError::DuplicateTicket(_)
            | DomainError::RegistryUnavailable(_)
            | DomainError::RegistryTimeout(_)
            | DomainError::Contention(_)
            | DomainError::ServiceRegistryUnavailable(_)
            | DomainError::Internal(_) => {
                tracing::error!(operation = op, error = ?e, "sso call failed");
            }
        }
        match e {
            DomainError::Authentication(failure) if !self.expose_handler_names => {
                SsoError::Authentication(failure.redacted())
            }
            other => other.into(),
        }
    }
}

#[async_trait]
impl CentralAuthenticationServiceClient for SsoLocalClient {
    async fn create_ticket_granting_ticket(
        &self,
        transaction: AuthenticationTransaction,
    ) -> Result<Ticket, SsoError> {
        self.svc
            .create_ticket_granting_ticket(transaction)
            .await
            .map_err(|e| self.log_and_convert("create_ticket_granting_ticket", e))
    }

    async fn grant_service_ticket(
        &self,
        ticket_granting_ticket_id: &TicketId,
        service: &Service,
        transaction: Option<AuthenticationTransaction>,
    ) -> Result<Ticket, SsoError> {
        self.svc
            .grant_service_ticket(ticket_granting_ticket_id, service, transaction)
            .await
            .map_err(|e| self.log_and_convert("grant_service_ticket", e))
    }

    async fn validate_service_ticket(
        &self,
        service_ticket_id: &TicketId,
        service: &Service,
    ) -> Result<Assertion, SsoError> {
        self.svc
            .validate_service_ticket(service_ticket_id, service)
            .await
            .map_err(|e| self.log_and_convert("validate_service_ticket", e))
    }

    async fn validate_proxy_ticket(
        &self,
        ticket_id: &TicketId,
        service: &Service,
    ) -> Result<Assertion, SsoError> {
        self.svc
            .validate_proxy_ticket(ticket_id, service)
            .await
            .map_err(|e| self.log_and_convert("validate_proxy_ticket", e))
    }

    async fn create_proxy_granting_ticket(
        &self,
        ticket_id: &TicketId,
        service: &Service,
        callback_url: &str,
    ) -> Result<ProxyGrant, SsoError> {
        self.svc
            .create_proxy_granting_ticket(ticket_id, service, callback_url)
            .await
            .map_err(|e| self.log_and_convert("create_proxy_granting_ticket", e))
    }

    async fn grant_proxy_ticket(
        &self,
        proxy_granting_ticket_id: &TicketId,
        target_service: &Service,
    ) -> Result<Ticket, SsoError> {
        self.svc
            .grant_proxy_ticket(proxy_granting_ticket_id, target_service)
            .await
            .map_err(|e| self.log_and_convert("grant_proxy_ticket", e))
    }

    async fn destroy_ticket_granting_ticket(
        &self,
        ticket_granting_ticket_id: &TicketId,
    ) -> Result<Vec<LogoutRequest>, SsoError> {
        self.svc
            .destroy_ticket_granting_ticket(ticket_granting_ticket_id)
            .await
            .map_err(|e| self.log_and_convert("destroy_ticket_granting_ticket", e))
    }

    async fn session_state(
        &self,
        ticket_granting_ticket_id: &TicketId,
    ) -> Result<SessionState, SsoError> {
        self.svc
            .session_state(ticket_granting_ticket_id)
            .await
            .map_err(|e| self.log_and_convert("session_state", e))
    }

    async fn tickets_for_principal(&self, principal_id: &str) -> Result<Vec<Ticket>, SsoError> {
        self.svc
            .tickets_for_principal(principal_id)
            .await
            .map_err(|e| self.log_and_convert("tickets_for_principal", e))
    }

    async fn tickets_for_service(&self, service: &Service) -> Result<Vec<Ticket>, SsoError> {
        self.svc
            .tickets_for_service(service)
            .await
            .map_err(|e| self.log_and_convert("tickets_for_service", e))
    }

    async fn revoke_principal_sessions(
        &self,
        principal_id: &str,
    ) -> Result<Vec<LogoutRequest>, SsoError> {
        self.svc
            .revoke_principal_sessions(principal_id)
            .await
            .map_err(|e| self.log_and_convert("revoke_principal_sessions", e))
    }

    async fn statistics(&self) -> Result<TicketStatistics, SsoError> {
        self.svc
            .statistics()
            .await
            .map_err(|e| self.log_and_convert("statistics", e))
    }
}
