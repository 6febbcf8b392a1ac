//! Traits implemented by authentication plugins and storage backends.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{
    AttributeRepositoryError, HandlerError, ServiceRegistryError, TicketRegistryError,
};
use crate::models::{
    Attributes, Credential, HandlerResult, Principal, RegisteredService, Service, Ticket, TicketId,
    TicketType,
};

/// Whether a handler takes part in default resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerState {
    #[default]
    Active,
    /// Only used when a service explicitly requires it.
    Standby,
}

/// A pluggable credential validator.
#[async_trait]
pub trait AuthenticationHandler: Send + Sync {
    /// Unique name, used in authentication metadata and service policies.
    fn name(&self) -> &str;

    /// Position in the chain; lower runs first.
    fn order(&self) -> i32 {
        0
    }

    fn state(&self) -> HandlerState {
        HandlerState::Active
    }

    fn supports(&self, credential: &Credential) -> bool;

    /// Validate one credential.
    ///
    /// # Errors
    /// Returns a [`HandlerError`] whose kind explains the rejection.
    async fn authenticate(
        &self,
        credential: &Credential,
        service: Option<&Service>,
    ) -> Result<HandlerResult, HandlerError>;
}

/// Turns a handler's principal into the canonical principal.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    fn supports(&self, _credential: &Credential) -> bool {
        true
    }

    /// Resolve the principal for a credential validated by `handler_name`.
    /// `Ok(None)` means the resolver could not produce a principal.
    ///
    /// # Errors
    /// Returns an error when the attribute source fails.
    async fn resolve(
        &self,
        credential: &Credential,
        handler_principal: Option<&Principal>,
        handler_name: &str,
    ) -> Result<Option<Principal>, AttributeRepositoryError>;
}

/// External source of principal attributes.
#[async_trait]
pub trait AttributeRepository: Send + Sync {
    /// # Errors
    /// Returns an error when the source is unreachable.
    async fn attributes_for(&self, principal_id: &str)
    -> Result<Attributes, AttributeRepositoryError>;
}

/// Authoritative ticket storage.
///
/// Implementations must be safe for concurrent use and must make
/// [`TicketRegistry::update_ticket`] a single atomic compare-and-swap on
/// `meta.version`; the at-most-once consumption of service tickets depends on it.
#[async_trait]
pub trait TicketRegistry: Send + Sync {
    /// # Errors
    /// [`TicketRegistryError::Duplicate`] if the id is already stored.
    async fn add_ticket(&self, ticket: Ticket) -> Result<(), TicketRegistryError>;

    /// Raw lookup, without type or expiry checks.
    ///
    /// # Errors
    /// Returns an error only when the backend fails; absence is `Ok(None)`.
    async fn get_ticket(&self, id: &TicketId) -> Result<Option<Ticket>, TicketRegistryError>;

    /// Replace the stored ticket if its version still equals `ticket.meta.version`.
    /// Returns the stored ticket with the incremented version.
    ///
    /// # Errors
    /// [`TicketRegistryError::NotFound`] when the ticket is gone,
    /// [`TicketRegistryError::Conflict`] when another writer got there first.
    async fn update_ticket(&self, ticket: Ticket) -> Result<Ticket, TicketRegistryError>;

    /// Idempotent delete. Returns whether a ticket was removed.
    ///
    /// # Errors
    /// Returns an error only when the backend fails.
    async fn delete_ticket(&self, id: &TicketId) -> Result<bool, TicketRegistryError>;

    /// # Errors
    /// Returns an error when the backend fails.
    async fn get_tickets(&self) -> Result<Vec<Ticket>, TicketRegistryError>;

    /// # Errors
    /// Returns an error when the backend fails.
    async fn get_tickets_for_principal(
        &self,
        principal_id: &str,
    ) -> Result<Vec<Ticket>, TicketRegistryError> {
        Ok(self
            .get_tickets()
            .await?
            .into_iter()
            .filter(|t| t.principal_id() == principal_id)
            .collect())
    }

    /// # Errors
    /// Returns an error when the backend fails.
    async fn get_tickets_for_service(
        &self,
        service: &Service,
    ) -> Result<Vec<Ticket>, TicketRegistryError> {
        Ok(self
            .get_tickets()
            .await?
            .into_iter()
            .filter(|t| t.service() == Some(service))
            .collect())
    }

    /// Number of stored ticket-granting tickets.
    ///
    /// # Errors
    /// Returns an error when the backend fails.
    async fn session_count(&self) -> Result<usize, TicketRegistryError> {
        Ok(self
            .get_tickets()
            .await?
            .iter()
            .filter(|t| t.ticket_type() == TicketType::TicketGranting)
            .count())
    }

    /// Number of stored service and proxy tickets.
    ///
    /// # Errors
    /// Returns an error when the backend fails.
    async fn service_ticket_count(&self) -> Result<usize, TicketRegistryError> {
        Ok(self
            .get_tickets()
            .await?
            .iter()
            .filter(|t| matches!(t.ticket_type(), TicketType::Service | TicketType::Proxy))
            .count())
    }
}

/// Read-only source of relying-party definitions.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// First registered service (by evaluation order) matching `service`.
    ///
    /// # Errors
    /// Returns an error when the backend fails.
    async fn find_service_by(
        &self,
        service: &Service,
    ) -> Result<Option<RegisteredService>, ServiceRegistryError>;

    /// Every definition, ordered by evaluation order.
    ///
    /// # Errors
    /// Returns an error when the backend fails.
    async fn load(&self) -> Result<Vec<RegisteredService>, ServiceRegistryError>;
}
