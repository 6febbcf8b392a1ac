//! Domain models shared by the facade, plugins and storage backends.

mod assertion;
mod authentication;
mod credential;
mod expiration;
mod logout;
mod principal;
mod service;
mod ticket;

pub use assertion::{Assertion, ProxyGrant};
pub use authentication::{
    Authentication, AuthenticationBuilder, AuthenticationFailure, FailureEntry, FailureKind,
    HandlerResult, attribute_names,
};
pub use credential::{AuthenticationTransaction, Credential, CredentialKind, CredentialMetadata};
pub use expiration::{ExpirationPolicy, elapsed_since};
pub use logout::{LogoutRequest, LogoutType};
pub use principal::{AttributeValue, Attributes, Principal};
pub use service::{
    AccessStrategy, AttributeReleasePolicy, ProxyPolicy, RegisteredService, Service,
    ServiceMatcher, ServiceTicketPolicy,
};
pub use ticket::{
    GrantedService, GrantingTicketState, ServiceTicketState, SessionState, Ticket, TicketId,
    TicketKind, TicketMeta, TicketStatistics, TicketType,
};
