//! Error types for the SSO module.

use std::fmt;

use thiserror::Error;

use crate::models::{AuthenticationFailure, FailureKind, TicketId};

/// Errors returned by [`crate::CentralAuthenticationServiceClient`].
///
/// Each variant maps to a distinct protocol-level response; adapters must not
/// collapse them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SsoError {
    /// Every failure observed by the authentication chain.
    #[error("authentication failed: {0}")]
    Authentication(AuthenticationFailure),

    /// Ticket absent, of the wrong type, expired or throttled.
    #[error("invalid ticket '{ticket_id}': {reason}")]
    InvalidTicket {
        ticket_id: String,
        reason: InvalidTicketReason,
    },

    #[error("ticket '{ticket_id}' has already been consumed")]
    TicketAlreadyConsumed { ticket_id: String },

    /// Ticket id collision. Indicates a broken id generator.
    #[error("duplicate ticket id '{ticket_id}'")]
    DuplicateTicket { ticket_id: String },

    #[error("service '{service}' is not authorized: {reason}")]
    UnauthorizedService {
        service: String,
        reason: UnauthorizedServiceReason,
    },

    /// The presented service differs from the one the ticket was issued for.
    #[error("ticket was not issued for service '{service}'")]
    ServiceMismatch { service: String },

    /// The service is known but its access strategy rejected the principal.
    #[error("access to '{service}' denied by policy: {reason}")]
    PolicyDenied {
        service: String,
        reason: PolicyDenialReason,
    },

    /// Fresh credentials resolved to a principal other than the session's.
    #[error("credentials belong to a different principal than the current session")]
    MixedPrincipal,

    /// Backend outage, deadline exceeded or unclassified error. Retryable.
    #[error("system failure: {0}")]
    System(String),
}

impl SsoError {
    /// Whether the caller should retry rather than treat the outcome as final.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::System(_) => true,
            Self::Authentication(failure) => failure.is_system_failure(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTicketReason {
    Absent,
    WrongType,
    Expired,
    /// Used again before the policy's minimum spacing elapsed.
    Throttled,
    /// Its session is being logged out.
    Revoked,
}

impl fmt::Display for InvalidTicketReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Absent => "not found",
            Self::WrongType => "wrong ticket type",
            Self::Expired => "expired",
            Self::Throttled => "used too frequently",
            Self::Revoked => "revoked",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedServiceReason {
    NotRegistered,
    Disabled,
    /// Service requires credentials on every request.
    SsoNotAllowed,
    ProxyNotAllowed,
}

impl fmt::Display for UnauthorizedServiceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotRegistered => "not registered",
            Self::Disabled => "disabled",
            Self::SsoNotAllowed => "single sign-on not allowed",
            Self::ProxyNotAllowed => "proxying not allowed",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDenialReason {
    OutsideAccessWindow,
    MissingRequiredAttributes,
    RequiredHandlerNotSatisfied,
}

impl fmt::Display for PolicyDenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OutsideAccessWindow => "outside of the access window",
            Self::MissingRequiredAttributes => "required attributes not satisfied",
            Self::RequiredHandlerNotSatisfied => "required authentication handler not satisfied",
        })
    }
}

/// Builder or resolver produced an authentication without a principal id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("authentication has no resolved principal")]
pub struct UnresolvedPrincipal;

/// Failure reported by an [`crate::AuthenticationHandler`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct HandlerError {
    pub kind: FailureKind,
    pub message: String,
}

impl HandlerError {
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_credentials(message: impl Into<String>) -> Self {
        Self::new(FailureKind::BadCredentials, message)
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::HandlerUnavailable, message)
    }
}

/// Errors returned by [`crate::TicketRegistry`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketRegistryError {
    #[error("ticket '{0}' already exists")]
    Duplicate(TicketId),

    #[error("ticket '{0}' not found")]
    NotFound(TicketId),

    /// Conditional update lost against a concurrent writer.
    #[error("ticket '{id}' was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        id: TicketId,
        expected: u64,
        found: u64,
    },

    #[error("ticket storage unavailable: {0}")]
    Unavailable(String),

    #[error("ticket storage error: {0}")]
    Internal(String),
}

/// Errors returned by [`crate::ServiceRegistry`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceRegistryError {
    #[error("invalid registered service {id}: {reason}")]
    InvalidDefinition { id: u64, reason: String },

    #[error("service registry unavailable: {0}")]
    Unavailable(String),

    #[error("service registry error: {0}")]
    Internal(String),
}

/// Errors returned by [`crate::AttributeRepository`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeRepositoryError {
    #[error("attribute repository unavailable: {0}")]
    Unavailable(String),

    #[error("attribute repository error: {0}")]
    Internal(String),
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(SsoError::System("timeout".to_owned()).is_retryable());
        assert!(
            SsoError::Authentication(AuthenticationFailure::single(
                FailureKind::HandlerUnavailable
            ))
            .is_retryable()
        );
        assert!(
            !SsoError::Authentication(AuthenticationFailure::single(FailureKind::BadCredentials))
                .is_retryable()
        );
        assert!(
            !SsoError::InvalidTicket {
                ticket_id: "ST-1".to_owned(),
                reason: InvalidTicketReason::Absent,
            }
            .is_retryable()
        );
    }

    #[test]
    fn messages_are_stable() {
        let err = SsoError::UnauthorizedService {
            service: "https://app".to_owned(),
            reason: UnauthorizedServiceReason::SsoNotAllowed,
        };
        assert_eq!(
            err.to_string(),
            "service 'https://app' is not authorized: single sign-on not allowed"
        );
    }
}
