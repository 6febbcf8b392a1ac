//! Single-node ticket registry on a sharded concurrent map.
//!
//! Conditional updates hold the shard write lock of the entry for the whole
//! version check and replacement, which is the atomic check-and-set the
//! at-most-once consumption relies on.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sso_sdk::{Service, Ticket, TicketId, TicketRegistry, TicketRegistryError, TicketType};

#[derive(Debug, Default)]
pub struct InMemoryTicketRegistry {
    tickets: DashMap<TicketId, Ticket>,
}

impl InMemoryTicketRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    fn collect<F>(&self, filter: F) -> Vec<Ticket>
    where
        F: Fn(&Ticket) -> bool,
    {
        self.tickets
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[async_trait]
impl TicketRegistry for InMemoryTicketRegistry {
    async fn add_ticket(&self, ticket: Ticket) -> Result<(), TicketRegistryError> {
        match self.tickets.entry(ticket.id().clone()) {
            Entry::Occupied(occupied) => Err(TicketRegistryError::Duplicate(occupied.key().clone())),
            Entry::Vacant(vacant) => {
                vacant.insert(ticket);
                Ok(())
            }
        }
    }

    async fn get_ticket(&self, id: &TicketId) -> Result<Option<Ticket>, TicketRegistryError> {
        Ok(self.tickets.get(id).map(|entry| entry.value().clone()))
    }

    async fn update_ticket(&self, mut ticket: Ticket) -> Result<Ticket, TicketRegistryError> {
        let Some(mut stored) = self.tickets.get_mut(ticket.id()) else {
            return Err(TicketRegistryError::NotFound(ticket.id().clone()));
        };
        let found = stored.meta.version;
        if found != ticket.meta.version {
            return Err(TicketRegistryError::Conflict {
                id: ticket.id().clone(),
                expected: ticket.meta.version,
                found,
            });
        }
        ticket.meta.version = found.wrapping_add(1);
        *stored = ticket.clone();
        Ok(ticket)
    }

    async fn delete_ticket(&self, id: &TicketId) -> Result<bool, TicketRegistryError> {
        Ok(self.tickets.remove(id).is_some())
    }

    async fn get_tickets(&self) -> Result<Vec<Ticket>, TicketRegistryError> {
        Ok(self.collect(|_| true))
    }

    async fn get_tickets_for_principal(
        &self,
        principal_id: &str,
    ) -> Result<Vec<Ticket>, TicketRegistryError> {
        Ok(self.collect(|t| t.principal_id() == principal_id))
    }

    async fn get_tickets_for_service(
        &self,
        service: &Service,
    ) -> Result<Vec<Ticket>, TicketRegistryError> {
        Ok(self.collect(|t| t.service() == Some(service)))
    }

    async fn session_count(&self) -> Result<usize, TicketRegistryError> {
        Ok(self
            .tickets
            .iter()
            .filter(|e| e.value().ticket_type() == TicketType::TicketGranting)
            .count())
    }

    async fn service_ticket_count(&self) -> Result<usize, TicketRegistryError> {
        Ok(self
            .tickets
            .iter()
            .filter(|e| matches!(e.value().ticket_type(), TicketType::Service | TicketType::Proxy))
            .count())
    }
}
