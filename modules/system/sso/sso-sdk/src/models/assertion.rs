use serde::{Deserialize, Serialize};

use super::{Authentication, Principal, Service, Ticket};

/// What a relying party learns from a successful ticket validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    /// Principal as released to this service: the id is the configured
    /// username and the attributes are filtered by the release policy.
    pub principal: Principal,
    pub service: Service,
    /// Authentications of every hop, root first. The first entry is the
    /// original login; later entries are the proxy callbacks.
    pub chained_authentications: Vec<Authentication>,
    /// Services that proxied on the user's behalf, in issuance order.
    /// Empty for plain service tickets.
    pub proxy_chain: Vec<Service>,
    pub from_new_login: bool,
}

impl Assertion {
    /// The original login.
    #[must_use]
    pub fn primary_authentication(&self) -> Option<&Authentication> {
        self.chained_authentications.first()
    }

    #[must_use]
    pub fn is_proxied(&self) -> bool {
        !self.proxy_chain.is_empty()
    }
}

/// Result of a proxy-granting ticket request: the validation outcome of the
/// presented ticket plus the newly minted proxy-granting ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyGrant {
    pub assertion: Assertion,
    pub proxy_granting_ticket: Ticket,
}
