//! Registered-service policies: matching, access, attribute release, logout.

mod access;
mod catalog;
mod matcher;
mod release;

pub use access::AccessEnforcer;
pub use catalog::ServiceCatalog;
pub use matcher::{MatchableService, compile_all, find_match};
pub use release::{release_attributes, released_principal, resolve_username};
