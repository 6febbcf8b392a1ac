mod caching_service_registry;
mod memory_ticket_registry;
mod static_attribute_repository;
mod static_service_registry;

pub use caching_service_registry::CachingServiceRegistry;
pub use memory_ticket_registry::InMemoryTicketRegistry;
pub use static_attribute_repository::StaticAttributeRepository;
pub use static_service_registry::StaticServiceRegistry;
