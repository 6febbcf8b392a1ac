pub mod client;
pub mod service;

pub use client::{OneTimeCodeHandler, PasswordHandler};
pub use service::Service;
