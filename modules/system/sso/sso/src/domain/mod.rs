//! Domain layer for the SSO module.

pub mod authn;
pub mod clock;
pub mod error;
pub mod local_client;
pub mod service;
pub mod services;
pub mod tickets;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::DomainError;
pub use local_client::SsoLocalClient;
pub use service::CentralAuthenticationService;
