//! Ticket lifecycle: id generation, construction, storage access, cascading
//! revocation and background cleanup.

mod cleaner;
mod factory;
mod id_generator;
mod revocation;
mod store;

pub use cleaner::{CleanupReport, RegistryCleaner};
pub use factory::TicketFactory;
pub use id_generator::{RandomTicketIdGenerator, SeededTicketIdGenerator, TicketIdGenerator};
pub use revocation::{Revocation, revoke_tree};
pub use store::TicketStore;
