//! Typed, deadline-bounded access to the ticket registry.
//!
//! Every read goes to the registry; nothing is cached here. Mutations are
//! read-modify-write cycles closed by the registry's conditional update and
//! retried when a concurrent writer wins.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use sso_sdk::{
    InvalidTicketReason, Service, Ticket, TicketId, TicketRegistry, TicketRegistryError,
    TicketType,
};
use tracing::{debug, error};

use crate::domain::clock::Clock;
use crate::domain::error::DomainError;

/// First pause between conditional update attempts; doubles per attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(5);
const RETRY_MAX_DELAY: Duration = Duration::from_millis(100);

pub struct TicketStore {
    registry: Arc<dyn TicketRegistry>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    update_retries: u32,
}

impl TicketStore {
    #[must_use]
    pub fn new(
        registry: Arc<dyn TicketRegistry>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
        update_retries: u32,
    ) -> Self {
        Self {
            registry,
            clock,
            timeout,
            update_retries: update_retries.max(1),
        }
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn call<T, F>(&self, fut: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, TicketRegistryError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(DomainError::from),
            Err(_) => Err(DomainError::RegistryTimeout(self.timeout)),
        }
    }

    /// # Errors
    /// [`DomainError::DuplicateTicket`] on id collision, or a registry failure.
    pub async fn add(&self, ticket: Ticket) -> Result<(), DomainError> {
        if !ticket.is_well_formed() {
            return Err(DomainError::internal(format!(
                "ticket id '{}' does not match its type {}",
                ticket.id().abbreviated(),
                ticket.ticket_type()
            )));
        }
        let id = ticket.id().clone();
        match self.call(self.registry.add_ticket(ticket)).await {
            Err(DomainError::DuplicateTicket(id)) => {
                error!(ticket_id = %id.abbreviated(), "ticket id collision; the id generator is broken");
                Err(DomainError::DuplicateTicket(id))
            }
            other => {
                debug!(ticket_id = %id.abbreviated(), "ticket stored");
                other
            }
        }
    }

    /// Raw lookup.
    ///
    /// # Errors
    /// Registry failures only.
    pub async fn find(&self, id: &TicketId) -> Result<Option<Ticket>, DomainError> {
        self.call(self.registry.get_ticket(id)).await
    }

    /// Present ticket of one of the `accepted` types, regardless of expiry.
    async fn load(&self, id: &TicketId, accepted: &[TicketType]) -> Result<Ticket, DomainError> {
        if !id.ticket_type().is_some_and(|t| accepted.contains(&t)) {
            return Err(DomainError::invalid_ticket(id, InvalidTicketReason::WrongType));
        }
        let ticket = self
            .find(id)
            .await?
            .ok_or_else(|| DomainError::invalid_ticket(id, InvalidTicketReason::Absent))?;
        if !accepted.contains(&ticket.ticket_type()) {
            return Err(DomainError::invalid_ticket(id, InvalidTicketReason::WrongType));
        }
        Ok(ticket)
    }

    /// Ticket of the expected type that is present and unexpired.
    ///
    /// # Errors
    /// [`DomainError::InvalidTicket`] when absent, of the wrong type, expired
    /// or revoked.
    pub async fn get(&self, id: &TicketId, expected: TicketType) -> Result<Ticket, DomainError> {
        self.get_any(id, &[expected]).await
    }

    /// Like [`Self::get`] but accepting several types. A granting ticket
    /// whose cascade has started counts as revoked.
    ///
    /// # Errors
    /// [`DomainError::InvalidTicket`] when absent, of the wrong type, expired
    /// or revoked.
    pub async fn get_any(
        &self,
        id: &TicketId,
        accepted: &[TicketType],
    ) -> Result<Ticket, DomainError> {
        let ticket = self.load(id, accepted).await?;
        if ticket.is_expired(self.now()) {
            return Err(DomainError::invalid_ticket(id, InvalidTicketReason::Expired));
        }
        if ticket.granting_state().is_some_and(|s| s.revoked) {
            return Err(DomainError::invalid_ticket(id, InvalidTicketReason::Revoked));
        }
        Ok(ticket)
    }

    /// Read-modify-write cycle with conditional update.
    ///
    /// A lost update is retried after a short randomized pause.
    /// `mutate` sees a fresh copy of the stored ticket on every attempt and
    /// is responsible for any expiry or state checks; returning an error
    /// aborts without writing. Returns the stored ticket and the closure's
    /// output from the winning attempt.
    ///
    /// # Errors
    /// Errors from `mutate`, [`DomainError::InvalidTicket`] when the ticket
    /// is gone, [`DomainError::Contention`] when retries are exhausted.
    pub async fn update_with<T, F>(
        &self,
        id: &TicketId,
        accepted: &[TicketType],
        mut mutate: F,
    ) -> Result<(Ticket, T), DomainError>
    where
        F: FnMut(&mut Ticket, DateTime<Utc>) -> Result<T, DomainError> + Send,
        T: Send,
    {
        for attempt in 1..=self.update_retries {
            let mut draft = self.load(id, accepted).await?;
            let out = mutate(&mut draft, self.now())?;
            match self.call(self.registry.update_ticket(draft)).await {
                Ok(stored) => return Ok((stored, out)),
                Err(DomainError::Contention(_)) if attempt < self.update_retries => {
                    let delay = retry_delay(attempt);
                    debug!(
                        ticket_id = %id.abbreviated(),
                        attempt,
                        delay = %humantime::format_duration(delay),
                        "conditional update lost, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(DomainError::Contention(_)) => break,
                Err(e) => return Err(e),
            }
        }
        Err(DomainError::Contention(id.clone()))
    }

    /// Idempotent delete.
    ///
    /// # Errors
    /// Registry failures only.
    pub async fn delete(&self, id: &TicketId) -> Result<bool, DomainError> {
        self.call(self.registry.delete_ticket(id)).await
    }

    /// # Errors
    /// Registry failures only.
    pub async fn tickets(&self) -> Result<Vec<Ticket>, DomainError> {
        self.call(self.registry.get_tickets()).await
    }

    /// # Errors
    /// Registry failures only.
    pub async fn tickets_for_principal(&self, principal_id: &str) -> Result<Vec<Ticket>, DomainError> {
        self.call(self.registry.get_tickets_for_principal(principal_id))
            .await
    }

    /// # Errors
    /// Registry failures only.
    pub async fn tickets_for_service(&self, service: &Service) -> Result<Vec<Ticket>, DomainError> {
        self.call(self.registry.get_tickets_for_service(service)).await
    }

    /// # Errors
    /// Registry failures only.
    pub async fn session_count(&self) -> Result<usize, DomainError> {
        self.call(self.registry.session_count()).await
    }

    /// # Errors
    /// Registry failures only.
    pub async fn service_ticket_count(&self) -> Result<usize, DomainError> {
        self.call(self.registry.service_ticket_count()).await
    }
}

/// Exponential backoff with equal jitter: half of the ceiling is fixed, the
/// other half random.
fn retry_delay(attempt: u32) -> Duration {
    let doublings = attempt.saturating_sub(1).min(8);
    let ceiling = RETRY_BASE_DELAY
        .saturating_mul(1 << doublings)
        .min(RETRY_MAX_DELAY);
    let half = ceiling / 2;
    half + rand::rng().random_range(Duration::ZERO..=half)
}
