//! Background removal of expired tickets.
//!
//! Expired ticket-granting and proxy-granting tickets go through the same
//! cascade as an explicit logout, so their relying parties are reported.
//! Expiry is always re-checked on read, so a late sweep never makes an
//! expired ticket usable.

use std::sync::Arc;

use sso_sdk::{LogoutRequest, TicketType};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{TicketStore, revoke_tree};
use crate::config::CleanerConfig;
use crate::domain::error::DomainError;
use crate::domain::services::ServiceCatalog;

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CleanupReport {
    /// Expired granting tickets whose trees were revoked.
    pub sessions_expired: usize,
    /// Registry entries removed, cascades included.
    pub tickets_deleted: usize,
    pub logout_requests: Vec<LogoutRequest>,
}

pub struct RegistryCleaner {
    store: Arc<TicketStore>,
    catalog: Arc<ServiceCatalog>,
    config: CleanerConfig,
    running: Mutex<()>,
}

impl RegistryCleaner {
    #[must_use]
    pub fn new(store: Arc<TicketStore>, catalog: Arc<ServiceCatalog>, config: CleanerConfig) -> Self {
        Self {
            store,
            catalog,
            config,
            running: Mutex::new(()),
        }
    }

    /// Sweep the registry once. Returns `None` when another sweep is still running.
    ///
    /// # Errors
    /// Registry failures while listing tickets. Failures on single tickets
    /// are logged and skipped.
    pub async fn run_once(&self) -> Result<Option<CleanupReport>, DomainError> {
        let Ok(_guard) = self.running.try_lock() else {
            debug!("previous registry sweep still running; skipping");
            return Ok(None);
        };

        let now = self.store.now();
        let mut report = CleanupReport::default();
        for ticket in self.store.tickets().await? {
            if !ticket.is_expired(now) {
                continue;
            }
            let id = ticket.id();
            if ticket.ticket_type().is_granting() {
                match revoke_tree(&self.store, id).await {
                    Ok(revocation) => {
                        if ticket.ticket_type() == TicketType::TicketGranting {
                            report.sessions_expired += 1;
                        }
                        report.tickets_deleted += revocation.deleted;
                        report
                            .logout_requests
                            .extend(self.catalog.logout_requests(&revocation.granted).await);
                    }
                    Err(e) => {
                        warn!(ticket_id = %id.abbreviated(), error = %e, "failed to revoke expired session");
                    }
                }
            } else {
                match self.store.delete(id).await {
                    Ok(true) => report.tickets_deleted += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(ticket_id = %id.abbreviated(), error = %e, "failed to delete expired ticket");
                    }
                }
            }
        }

        if report.tickets_deleted > 0 {
            info!(
                sessions = report.sessions_expired,
                deleted = report.tickets_deleted,
                logout_requests = report.logout_requests.len(),
                "expired tickets removed"
            );
        }
        Ok(Some(report))
    }

    /// Run sweeps on the configured schedule until `cancel` fires.
    #[must_use]
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(self.config.start_delay) => {}
            }
            let mut ticks = tokio::time::interval(self.config.interval);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("registry cleaner stopped");
                        return;
                    }
                    _ = ticks.tick() => {
                        if let Err(e) = self.run_once().await {
                            warn!(error = %e, "registry sweep failed");
                        }
                    }
                }
            }
        })
    }
}
