//! Cascading revocation of a session tree.
//!
//! Each granting ticket owns the ids of its service, proxy and
//! proxy-granting tickets, so the walk only follows explicit child lists.
//! Every granting ticket is first marked revoked through a conditional
//! update, which closes it to new children; the child list read back from
//! that update is therefore final. Deletion then runs in reverse pre-order:
//! a granting ticket is removed only after every ticket below it, so no
//! live ticket ever points at a deleted parent. A cascade interrupted
//! half-way can simply be run again.

use std::collections::HashSet;

use sso_sdk::{GrantedService, GrantingTicketState, InvalidTicketReason, TicketId, TicketType};
use tracing::{debug, warn};

use super::TicketStore;
use crate::domain::error::DomainError;

/// Hard bound on the number of granting tickets visited in one cascade.
const MAX_GRANTING_TICKETS: usize = 10_000;

const GRANTING: [TicketType; 2] = [TicketType::TicketGranting, TicketType::ProxyGranting];

/// What a cascade removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Revocation {
    /// Every issued service or proxy ticket, in issuance order (depth first).
    pub granted: Vec<GrantedService>,
    /// Number of registry entries actually deleted.
    pub deleted: usize,
}

struct GrantingNode {
    id: TicketId,
    issued: Vec<GrantedService>,
}

/// Delete `root` and everything issued from it. An absent root yields an
/// empty revocation.
///
/// # Errors
/// Registry failures, or [`DomainError::Internal`] when the tree holds more
/// granting tickets than one cascade may visit; nothing is deleted then.
/// Tickets deleted before a registry failure stay deleted.
pub async fn revoke_tree(store: &TicketStore, root: &TicketId) -> Result<Revocation, DomainError> {
    revoke_bounded(store, root, MAX_GRANTING_TICKETS).await
}

async fn revoke_bounded(
    store: &TicketStore,
    root: &TicketId,
    max_granting_tickets: usize,
) -> Result<Revocation, DomainError> {
    let nodes = close_tree(store, root, max_granting_tickets).await?;

    let mut revocation = Revocation::default();
    for node in &nodes {
        revocation.granted.extend(node.issued.iter().cloned());
    }
    for node in nodes.iter().rev() {
        for child in &node.issued {
            if store.delete(&child.ticket_id).await? {
                revocation.deleted += 1;
            }
        }
        if store.delete(&node.id).await? {
            revocation.deleted += 1;
        }
        debug!(ticket_id = %node.id.abbreviated(), children = node.issued.len(), "ticket revoked");
    }

    Ok(revocation)
}

/// Mark every granting ticket of the tree revoked, in pre-order, and
/// collect the final child lists.
async fn close_tree(
    store: &TicketStore,
    root: &TicketId,
    max_granting_tickets: usize,
) -> Result<Vec<GrantingNode>, DomainError> {
    let mut nodes: Vec<GrantingNode> = Vec::new();
    let mut visited: HashSet<TicketId> = HashSet::new();
    let mut stack = vec![root.clone()];

    while let Some(id) = stack.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        if !id.ticket_type().is_some_and(|t| GRANTING.contains(&t)) {
            // `root` is a service or proxy ticket.
            nodes.push(GrantingNode {
                id,
                issued: Vec::new(),
            });
            continue;
        }
        if nodes.len() >= max_granting_tickets {
            warn!(
                root = %root.abbreviated(),
                bound = max_granting_tickets,
                "session tree exceeds cascade bound; nothing deleted"
            );
            return Err(DomainError::internal(format!(
                "session tree of '{}' holds more than {max_granting_tickets} granting tickets",
                root.abbreviated()
            )));
        }
        let Some(state) = mark_revoked(store, &id).await? else {
            continue;
        };
        // Reverse push keeps proxy-granting tickets in issuance order.
        stack.extend(state.proxy_granting_tickets.iter().rev().cloned());
        nodes.push(GrantingNode {
            id,
            issued: state.services,
        });
    }

    Ok(nodes)
}

/// Close a granting ticket to new children and return its state as
/// stored by the closing update. `None` when the ticket is already gone.
async fn mark_revoked(
    store: &TicketStore,
    id: &TicketId,
) -> Result<Option<GrantingTicketState>, DomainError> {
    let marked = store
        .update_with(id, &GRANTING, |ticket, _| {
            let state = ticket.granting_state_mut().ok_or_else(|| {
                DomainError::internal("granting ticket without session state")
            })?;
            state.revoked = true;
            Ok(())
        })
        .await;
    match marked {
        Ok((ticket, ())) => Ok(ticket.granting_state().cloned()),
        Err(DomainError::InvalidTicket {
            reason: InvalidTicketReason::Absent,
            ..
        }) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use sso_sdk::{
        Authentication, Principal, Service, Ticket, TicketRegistry, TicketType,
    };

    use super::*;
    use crate::config::TicketsConfig;
    use crate::domain::clock::SystemClock;
    use crate::domain::tickets::{SeededTicketIdGenerator, TicketFactory};
    use crate::infra::storage::InMemoryTicketRegistry;

    struct Fixture {
        registry: Arc<InMemoryTicketRegistry>,
        store: TicketStore,
        factory: TicketFactory,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(InMemoryTicketRegistry::new());
        let clock = Arc::new(SystemClock);
        Fixture {
            store: TicketStore::new(registry.clone(), clock.clone(), Duration::from_secs(1), 4),
            factory: TicketFactory::new(
                Arc::new(SeededTicketIdGenerator::new(3)),
                clock,
                TicketsConfig::default(),
            ),
            registry,
        }
    }

    fn auth(id: &str) -> Authentication {
        Authentication::builder()
            .principal(Principal::with_id(id))
            .build()
            .unwrap()
    }

    impl Fixture {
        /// Issue a service ticket under `parent`, recording it on the parent.
        async fn issue(&self, parent: &mut Ticket, service: &str) -> Ticket {
            let svc = Service::new(service);
            let st = self
                .factory
                .create_service_ticket(parent, &svc, false, None)
                .unwrap();
            parent
                .granting_state_mut()
                .unwrap()
                .record_service(st.id().clone(), svc);
            self.store.add(st.clone()).await.unwrap();
            st
        }

        async fn save(&self, ticket: &mut Ticket) {
            *ticket = self.registry.update_ticket(ticket.clone()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn cascade_removes_whole_tree_in_issuance_order() {
        let f = fixture();
        let mut tgt = f.factory.create_ticket_granting_ticket(auth("casuser"));
        f.store.add(tgt.clone()).await.unwrap();

        let st_a = f.issue(&mut tgt, "https://a").await;
        let proxy = Service::new("https://proxy");
        let mut pgt = f
            .factory
            .create_proxy_granting_ticket(&tgt, &proxy, auth("https://proxy/cb"))
            .unwrap();
        tgt.granting_state_mut()
            .unwrap()
            .record_proxy_granting_ticket(pgt.id().clone());
        f.store.add(pgt.clone()).await.unwrap();
        let pt = f.issue(&mut pgt, "https://backend").await;
        f.save(&mut pgt).await;
        let st_b = f.issue(&mut tgt, "https://b").await;
        f.save(&mut tgt).await;

        let revocation = revoke_tree(&f.store, tgt.id()).await.unwrap();

        let services: Vec<_> = revocation
            .granted
            .iter()
            .map(|g| g.service.id().to_owned())
            .collect();
        assert_eq!(services, vec!["https://a", "https://b", "https://backend"]);
        assert_eq!(revocation.deleted, 5);
        for id in [tgt.id(), st_a.id(), st_b.id(), pgt.id(), pt.id()] {
            assert!(f.store.find(id).await.unwrap().is_none());
        }
        assert!(f.registry.is_empty());
    }

    #[tokio::test]
    async fn cascade_is_idempotent() {
        let f = fixture();
        let mut tgt = f.factory.create_ticket_granting_ticket(auth("casuser"));
        f.store.add(tgt.clone()).await.unwrap();
        f.issue(&mut tgt, "https://a").await;
        f.save(&mut tgt).await;

        assert_eq!(revoke_tree(&f.store, tgt.id()).await.unwrap().deleted, 2);
        let again = revoke_tree(&f.store, tgt.id()).await.unwrap();
        assert_eq!(again, Revocation::default());
    }

    #[tokio::test]
    async fn partially_deleted_tree_is_finished_on_retry() {
        let f = fixture();
        let mut tgt = f.factory.create_ticket_granting_ticket(auth("casuser"));
        f.store.add(tgt.clone()).await.unwrap();
        let st = f.issue(&mut tgt, "https://a").await;
        let st2 = f.issue(&mut tgt, "https://b").await;
        f.save(&mut tgt).await;

        // Simulate a crash after the first child was removed.
        f.store.delete(st.id()).await.unwrap();

        let revocation = revoke_tree(&f.store, tgt.id()).await.unwrap();
        assert_eq!(revocation.deleted, 2);
        assert!(f.store.find(st2.id()).await.unwrap().is_none());
        assert_eq!(tgt.ticket_type(), TicketType::TicketGranting);
    }

    #[tokio::test]
    async fn oversized_tree_is_left_untouched() {
        let f = fixture();
        let mut tgt = f.factory.create_ticket_granting_ticket(auth("casuser"));
        f.store.add(tgt.clone()).await.unwrap();
        let st = f.issue(&mut tgt, "https://a").await;
        let mut pgts = Vec::new();
        for proxy in ["https://p1", "https://p2"] {
            let pgt = f
                .factory
                .create_proxy_granting_ticket(&tgt, &Service::new(proxy), auth(proxy))
                .unwrap();
            tgt.granting_state_mut()
                .unwrap()
                .record_proxy_granting_ticket(pgt.id().clone());
            f.store.add(pgt.clone()).await.unwrap();
            pgts.push(pgt);
        }
        f.save(&mut tgt).await;

        let err = revoke_bounded(&f.store, tgt.id(), 2).await.unwrap_err();
        assert!(matches!(err, DomainError::Internal(_)), "got {err}");
        assert_eq!(f.registry.len(), 4);
        for id in [tgt.id(), st.id(), pgts[0].id(), pgts[1].id()] {
            assert!(f.store.find(id).await.unwrap().is_some());
        }

        let revocation = revoke_bounded(&f.store, tgt.id(), 3).await.unwrap();
        assert_eq!(revocation.deleted, 4);
        assert!(f.registry.is_empty());
    }

    #[tokio::test]
    async fn visited_granting_tickets_refuse_new_children() {
        let f = fixture();
        let mut tgt = f.factory.create_ticket_granting_ticket(auth("casuser"));
        f.store.add(tgt.clone()).await.unwrap();
        let pgt = f
            .factory
            .create_proxy_granting_ticket(&tgt, &Service::new("https://p1"), auth("https://p1"))
            .unwrap();
        tgt.granting_state_mut()
            .unwrap()
            .record_proxy_granting_ticket(pgt.id().clone());
        f.store.add(pgt.clone()).await.unwrap();
        f.save(&mut tgt).await;

        // A bound of one closes the root, then stops at the proxy-granting ticket.
        revoke_bounded(&f.store, tgt.id(), 1).await.unwrap_err();

        let err = f.store.get(tgt.id(), TicketType::TicketGranting).await.unwrap_err();
        assert_eq!(
            err,
            DomainError::invalid_ticket(tgt.id(), InvalidTicketReason::Revoked)
        );
        assert!(f.store.get(pgt.id(), TicketType::ProxyGranting).await.is_ok());
    }
}
