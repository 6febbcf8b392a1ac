//! Authentication chain: handler resolution, policies and principal resolution.

mod callback;
mod manager;
mod policy;
mod principal;
mod resolver;

pub use callback::{PROXY_CALLBACK_HANDLER, ProxyCallbackHandler};
pub use manager::AuthenticationManager;
pub use policy::{AuthenticationPolicy, Outcomes};
pub use principal::{AttributeMergingPrincipalResolver, EchoPrincipalResolver, merge};
pub use resolver::{
    CredentialKindHandlerResolver, DefaultHandlerResolver, HandlerRef, HandlerResolver,
    ServiceAwareHandlerResolver,
};
