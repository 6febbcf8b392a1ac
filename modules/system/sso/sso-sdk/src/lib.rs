//! SSO SDK
//!
//! This crate provides the public API for the `sso` module:
//!
//! - [`CentralAuthenticationServiceClient`] - Facade trait used by protocol adapters
//! - [`AuthenticationHandler`], [`PrincipalResolver`], [`AttributeRepository`] -
//!   authentication plugin traits
//! - [`TicketRegistry`], [`ServiceRegistry`] - storage SPI traits
//! - [`Ticket`], [`Authentication`], [`RegisteredService`], [`Assertion`] - models
//! - [`SsoError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use sso_sdk::{AuthenticationTransaction, CentralAuthenticationServiceClient, Credential, Service};
//!
//! let tgt = cas
//!     .create_ticket_granting_ticket(AuthenticationTransaction::new(vec![
//!         Credential::username_password("casuser", "Mellon"),
//!     ]))
//!     .await?;
//!
//! let service = Service::new("https://app.example.org");
//! let st = cas.grant_service_ticket(tgt.id(), &service, None).await?;
//! let assertion = cas.validate_service_ticket(st.id(), &service).await?;
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod error;
pub mod humantime_serde;
pub mod models;
pub mod plugin_api;

// Re-export main types at crate root
pub use api::CentralAuthenticationServiceClient;
pub use error::{
    AttributeRepositoryError, HandlerError, InvalidTicketReason, PolicyDenialReason,
    ServiceRegistryError, SsoError, TicketRegistryError, UnauthorizedServiceReason,
    UnresolvedPrincipal,
};
pub use models::{
    AccessStrategy, Assertion, AttributeReleasePolicy, AttributeValue, Attributes,
    Authentication, AuthenticationBuilder, AuthenticationFailure, AuthenticationTransaction,
    Credential, CredentialKind, CredentialMetadata, ExpirationPolicy, FailureEntry, FailureKind,
    GrantedService, GrantingTicketState, HandlerResult, LogoutRequest, LogoutType, Principal,
    ProxyGrant, ProxyPolicy, RegisteredService, Service, ServiceMatcher, ServiceTicketPolicy,
    ServiceTicketState, SessionState, Ticket, TicketId, TicketKind, TicketMeta, TicketStatistics,
    TicketType, attribute_names, elapsed_since,
};
pub use plugin_api::{
    AttributeRepository, AuthenticationHandler, HandlerState, PrincipalResolver, ServiceRegistry,
    TicketRegistry,
};
