//! Domain errors for the SSO module.

use std::time::Duration;

use sso_sdk::{
    AuthenticationFailure, InvalidTicketReason, PolicyDenialReason, Service, ServiceRegistryError,
    SsoError, TicketId, TicketRegistryError, UnauthorizedServiceReason,
};

/// Internal domain errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("authentication failed: {0}")]
    Authentication(AuthenticationFailure),

    #[error("invalid ticket '{}': {reason}", .id.abbreviated())]
    InvalidTicket {
        id: TicketId,
        reason: InvalidTicketReason,
    },

    #[error("ticket '{}' already consumed", .0.abbreviated())]
    TicketAlreadyConsumed(TicketId),

    #[error("duplicate ticket id '{}'", .0.abbreviated())]
    DuplicateTicket(TicketId),

    #[error("service '{service}' not authorized: {reason}")]
    UnauthorizedService {
        service: Service,
        reason: UnauthorizedServiceReason,
    },

    #[error("ticket '{}' issued for '{expected}', presented by '{presented}'", .id.abbreviated())]
    ServiceMismatch {
        id: TicketId,
        expected: Service,
        presented: Service,
    },

    #[error("access to '{service}' denied: {reason}")]
    PolicyDenied {
        service: Service,
        reason: PolicyDenialReason,
    },

    #[error("principal '{presented}' does not match session principal '{session}'")]
    MixedPrincipal { session: String, presented: String },

    #[error("ticket registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("ticket registry call exceeded {}", humantime::format_duration(*.0))]
    RegistryTimeout(Duration),

    #[error("ticket '{}' kept changing concurrently", .0.abbreviated())]
    Contention(TicketId),

    #[error("service registry unavailable: {0}")]
    ServiceRegistryUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    #[must_use]
    pub fn invalid_ticket(id: &TicketId, reason: InvalidTicketReason) -> Self {
        Self::InvalidTicket {
            id: id.clone(),
            reason,
        }
    }

    #[must_use]
    pub fn unauthorized(service: &Service, reason: UnauthorizedServiceReason) -> Self {
        Self::UnauthorizedService {
            service: service.clone(),
            reason,
        }
    }

    #[must_use]
    pub fn policy_denied(service: &Service, reason: PolicyDenialReason) -> Self {
        Self::PolicyDenied {
            service: service.clone(),
            reason,
        }
    }

    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<TicketRegistryError> for DomainError {
    fn from(e: TicketRegistryError) -> Self {
        match e {
            TicketRegistryError::Duplicate(id) => Self::DuplicateTicket(id),
            TicketRegistryError::NotFound(id) => Self::InvalidTicket {
                id,
                reason: InvalidTicketReason::Absent,
            },
            TicketRegistryError::Conflict { id, .. } => Self::Contention(id),
            TicketRegistryError::Unavailable(msg) => Self::RegistryUnavailable(msg),
            TicketRegistryError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<ServiceRegistryError> for DomainError {
    fn from(e: ServiceRegistryError) -> Self {
        match e {
            ServiceRegistryError::Unavailable(msg) => Self::ServiceRegistryUnavailable(msg),
            ServiceRegistryError::InvalidDefinition { id, reason } => {
                Self::Internal(format!("invalid registered service {id}: {reason}"))
            }
            ServiceRegistryError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<DomainError> for SsoError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Authentication(failure) => Self::Authentication(failure),
            DomainError::InvalidTicket { id, reason } => Self::InvalidTicket {
                ticket_id: id.abbreviated(),
                reason,
            },
            DomainError::TicketAlreadyConsumed(id) => Self::TicketAlreadyConsumed {
                ticket_id: id.abbreviated(),
            },
            DomainError::DuplicateTicket(id) => Self::DuplicateTicket {
                ticket_id: id.abbreviated(),
            },
            DomainError::UnauthorizedService { service, reason } => Self::UnauthorizedService {
                service: service.id().to_owned(),
                reason,
            },
            DomainError::ServiceMismatch { presented, .. } => Self::ServiceMismatch {
                service: presented.id().to_owned(),
            },
            DomainError::PolicyDenied { service, reason } => Self::PolicyDenied {
                service: service.id().to_owned(),
                reason,
            },
            DomainError::MixedPrincipal { .. } => Self::MixedPrincipal,
            e @ (DomainError::RegistryUnavailable(_)
            | DomainError::RegistryTimeout(_)
            | DomainError::Contention(_)
            | DomainError::ServiceRegistryUnavailable(_)
            | DomainError::Internal(_)) => Self::System(e.to_string()),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn registry_outage_is_not_reported_as_invalid_ticket() {
        let err: DomainError = TicketRegistryError::Unavailable("connection refused".to_owned()).into();
        let sso: SsoError = err.into();
        assert!(matches!(sso, SsoError::System(_)));
        assert!(sso.is_retryable());
    }

    #[test]
    fn not_found_maps_to_absent() {
        let id = TicketId::from_raw("ST-1-abc");
        let err: DomainError = TicketRegistryError::NotFound(id.clone()).into();
        assert_eq!(err, DomainError::invalid_ticket(&id, InvalidTicketReason::Absent));
    }

    #[test]
    fn ticket_ids_are_abbreviated_at_the_boundary() {
        let id = TicketId::from_raw("ST-1-abcdefghijklmnopqrstuvwxyz");
        let sso: SsoError = DomainError::TicketAlreadyConsumed(id).into();
        assert_eq!(
            sso,
            SsoError::TicketAlreadyConsumed {
                ticket_id: "ST-1-abcdefg...".to_owned()
            }
        );
    }

    #[test]
    fn mismatch_reports_only_presented_service() {
        let sso: SsoError = DomainError::ServiceMismatch {
            id: TicketId::from_raw("ST-1"),
            expected: Service::new("https://b"),
            presented: Service::new("https://a"),
        }
        .into();
        assert_eq!(
            sso,
            SsoError::ServiceMismatch {
                service: "https://a".to_owned()
            }
        );
    }
}
