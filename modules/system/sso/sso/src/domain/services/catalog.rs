//! Read-only access to registered services, bounded by a deadline.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use sso_sdk::{GrantedService, LogoutRequest, LogoutType, RegisteredService, Service, ServiceRegistry};
use tracing::warn;

use crate::domain::error::DomainError;

pub struct ServiceCatalog {
    registry: Arc<dyn ServiceRegistry>,
    timeout: Duration,
}

impl ServiceCatalog {
    #[must_use]
    pub fn new(registry: Arc<dyn ServiceRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// # Errors
    /// [`DomainError::ServiceRegistryUnavailable`] on outage or deadline.
    pub async fn find(&self, service: &Service) -> Result<Option<RegisteredService>, DomainError> {
        match tokio::time::timeout(self.timeout, self.registry.find_service_by(service)).await {
            Ok(result) => result.map_err(DomainError::from),
            Err(_) => Err(DomainError::ServiceRegistryUnavailable(format!(
                "lookup exceeded {}",
                humantime::format_duration(self.timeout)
            ))),
        }
    }

    /// One logout request per distinct service, in the order given.
    ///
    /// Services that no longer resolve are still reported with the default
    /// back-channel type: the relying party did receive a ticket. Services
    /// opted out of single logout are listed with [`LogoutType::None`].
    pub async fn logout_requests(&self, granted: &[GrantedService]) -> Vec<LogoutRequest> {
        let mut seen: HashSet<&Service> = HashSet::new();
        let mut requests = Vec::new();
        for entry in granted {
            if !seen.insert(&entry.service) {
                continue;
            }
            let registered = match self.find(&entry.service).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(service = %entry.service, error = %e, "service lookup failed during logout");
                    None
                }
            };
            let (logout_type, logout_url) = registered.map_or((LogoutType::BackChannel, None), |r| {
                (r.logout_type, r.logout_url)
            });
            requests.push(LogoutRequest {
                ticket_id: entry.ticket_id.clone(),
                service: entry.service.clone(),
                logout_type,
                logout_url,
            });
        }
        requests
    }
}
