use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Authentication, ExpirationPolicy, Service};

/// Concrete ticket type, encoded as the id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketType {
    TicketGranting,
    Service,
    ProxyGranting,
    Proxy,
}

impl TicketType {
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::TicketGranting => "TGT",
            Self::Service => "ST",
            Self::ProxyGranting => "PGT",
            Self::Proxy => "PT",
        }
    }

    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "TGT" => Some(Self::TicketGranting),
            "ST" => Some(Self::Service),
            "PGT" => Some(Self::ProxyGranting),
            "PT" => Some(Self::Proxy),
            _ => None,
        }
    }

    /// Types that root a (possibly proxied) session.
    #[must_use]
    pub const fn is_granting(self) -> bool {
        matches!(self, Self::TicketGranting | Self::ProxyGranting)
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Ticket identifier: `<PREFIX>-<random>[-<node>]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Compose an id from its type and the random body.
    #[must_use]
    pub fn new(ticket_type: TicketType, body: &str) -> Self {
        Self(format!("{}-{body}", ticket_type.prefix()))
    }

    /// Wrap an id received from outside (request parameter, storage row).
    /// The prefix is checked when the ticket is looked up, not here.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Type encoded in the prefix, `None` for malformed ids.
    #[must_use]
    pub fn ticket_type(&self) -> Option<TicketType> {
        self.0
            .split_once('-')
            .and_then(|(prefix, body)| (!body.is_empty()).then_some(prefix))
            .and_then(TicketType::from_prefix)
    }

    /// Short form for logs; the full id is a bearer secret.
    #[must_use]
    pub fn abbreviated(&self) -> String {
        const SHOWN: usize = 12;
        match self.0.char_indices().nth(SHOWN) {
            Some((cut, _)) => format!("{}...", &self.0[..cut]),
            None => self.0.clone(),
        }
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata shared by every ticket type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketMeta {
    pub id: TicketId,
    pub creation_time: DateTime<Utc>,
    pub last_used_time: DateTime<Utc>,
    pub previous_last_used_time: Option<DateTime<Utc>>,
    pub count_of_uses: u32,
    pub expiration_policy: ExpirationPolicy,
    /// Incremented by the registry on every successful update; the basis of
    /// compare-and-swap.
    pub version: u64,
}

impl TicketMeta {
    #[must_use]
    pub fn new(id: TicketId, now: DateTime<Utc>, expiration_policy: ExpirationPolicy) -> Self {
        Self {
            id,
            creation_time: now,
            last_used_time: now,
            previous_last_used_time: None,
            count_of_uses: 0,
            expiration_policy,
            version: 0,
        }
    }

    pub fn record_use(&mut self, now: DateTime<Utc>) {
        self.previous_last_used_time = Some(self.last_used_time);
        self.last_used_time = now;
        self.count_of_uses = self.count_of_uses.saturating_add(1);
    }
}

/// A service ticket recorded on its granting ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantedService {
    pub ticket_id: TicketId,
    pub service: Service,
}

/// Payload of ticket-granting and proxy-granting tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantingTicketState {
    pub authentication: Authentication,
    /// Granting ticket this one was derived from (proxy-granting tickets only).
    pub parent: Option<TicketId>,
    /// Service and proxy tickets issued under this session, in issuance order.
    pub services: Vec<GrantedService>,
    /// Proxy-granting tickets minted from this session, in issuance order.
    pub proxy_granting_tickets: Vec<TicketId>,
    /// Authentications of every earlier hop, root first.
    pub chained_authentications: Vec<Authentication>,
    /// Service acting as proxy (proxy-granting tickets only).
    pub proxied_by: Option<Service>,
    /// Proxying services of every hop, in issuance order.
    pub proxy_chain: Vec<Service>,
    /// Set once a cascade starts; no further children may be recorded.
    #[serde(default)]
    pub revoked: bool,
}

impl GrantingTicketState {
    /// State of a fresh login session.
    #[must_use]
    pub fn root(authentication: Authentication) -> Self {
        Self {
            authentication,
            parent: None,
            services: Vec::new(),
            proxy_granting_tickets: Vec::new(),
            chained_authentications: Vec::new(),
            proxied_by: None,
            proxy_chain: Vec::new(),
            revoked: false,
        }
    }

    pub fn record_service(&mut self, ticket_id: TicketId, service: Service) {
        self.services.push(GrantedService { ticket_id, service });
    }

    pub fn record_proxy_granting_ticket(&mut self, ticket_id: TicketId) {
        self.proxy_granting_tickets.push(ticket_id);
    }

    /// Every directly owned child id: issued tickets first, then proxy-granting tickets.
    pub fn children(&self) -> impl Iterator<Item = &TicketId> {
        self.services
            .iter()
            .map(|s| &s.ticket_id)
            .chain(self.proxy_granting_tickets.iter())
    }

    /// All authentications of the chain, root first, ending with this hop.
    #[must_use]
    pub fn full_chain(&self) -> Vec<Authentication> {
        let mut chain = self.chained_authentications.clone();
        chain.push(self.authentication.clone());
        chain
    }

    #[must_use]
    pub fn session_state(&self) -> SessionState {
        if !self.proxy_granting_tickets.is_empty() {
            SessionState::ProxyGranted
        } else if !self.services.is_empty() {
            SessionState::ServiceGranted
        } else {
            SessionState::Authenticated
        }
    }
}

/// Payload of service and proxy tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTicketState {
    pub granting_ticket_id: TicketId,
    pub principal_id: String,
    pub service: Service,
    pub consumed: bool,
    /// Issued right after credentials were presented (not through SSO).
    pub from_new_login: bool,
    /// Number of successful validations before the ticket is consumed.
    pub max_uses: u32,
}

/// Type-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TicketKind {
    TicketGranting(GrantingTicketState),
    ProxyGranting(GrantingTicketState),
    Service(ServiceTicketState),
    Proxy(ServiceTicketState),
}

/// Lifecycle state of a login session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NoSession,
    Authenticated,
    ServiceGranted,
    ProxyGranted,
    Terminated,
}

/// Registry counters for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TicketStatistics {
    /// Stored ticket-granting tickets.
    pub sessions: usize,
    /// Stored service and proxy tickets.
    pub service_tickets: usize,
}

/// A ticket: shared metadata plus a type-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub meta: TicketMeta,
    pub kind: TicketKind,
}

impl Ticket {
    #[must_use]
    pub fn new(meta: TicketMeta, kind: TicketKind) -> Self {
        Self { meta, kind }
    }

    #[must_use]
    pub fn id(&self) -> &TicketId {
        &self.meta.id
    }

    #[must_use]
    pub fn ticket_type(&self) -> TicketType {
        match &self.kind {
            TicketKind::TicketGranting(_) => TicketType::TicketGranting,
            TicketKind::ProxyGranting(_) => TicketType::ProxyGranting,
            TicketKind::Service(_) => TicketType::Service,
            TicketKind::Proxy(_) => TicketType::Proxy,
        }
    }

    /// Whether the id prefix agrees with the payload.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.meta.id.ticket_type() == Some(self.ticket_type())
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.meta.expiration_policy.is_expired(&self.meta, now)
    }

    #[must_use]
    pub fn granting_state(&self) -> Option<&GrantingTicketState> {
        match &self.kind {
            TicketKind::TicketGranting(s) | TicketKind::ProxyGranting(s) => Some(s),
            TicketKind::Service(_) | TicketKind::Proxy(_) => None,
        }
    }

    pub fn granting_state_mut(&mut self) -> Option<&mut GrantingTicketState> {
        match &mut self.kind {
            TicketKind::TicketGranting(s) | TicketKind::ProxyGranting(s) => Some(s),
            TicketKind::Service(_) | TicketKind::Proxy(_) => None,
        }
    }

    #[must_use]
    pub fn service_state(&self) -> Option<&ServiceTicketState> {
        match &self.kind {
            TicketKind::Service(s) | TicketKind::Proxy(s) => Some(s),
            TicketKind::TicketGranting(_) | TicketKind::ProxyGranting(_) => None,
        }
    }

    pub fn service_state_mut(&mut self) -> Option<&mut ServiceTicketState> {
        match &mut self.kind {
            TicketKind::Service(s) | TicketKind::Proxy(s) => Some(s),
            TicketKind::TicketGranting(_) | TicketKind::ProxyGranting(_) => None,
        }
    }

    /// Principal the ticket was issued for.
    #[must_use]
    pub fn principal_id(&self) -> &str {
        match &self.kind {
            TicketKind::TicketGranting(s) | TicketKind::ProxyGranting(s) => {
                s.chained_authentications
                    .first()
                    .unwrap_or(&s.authentication)
                    .principal()
                    .id()
            }
            TicketKind::Service(s) | TicketKind::Proxy(s) => &s.principal_id,
        }
    }

    /// Service a ticket was issued to; for proxy-granting tickets the proxying service.
    #[must_use]
    pub fn service(&self) -> Option<&Service> {
        match &self.kind {
            TicketKind::Service(s) | TicketKind::Proxy(s) => Some(&s.service),
            TicketKind::ProxyGranting(s) => s.proxied_by.as_ref(),
            TicketKind::TicketGranting(_) => None,
        }
    }

    /// Ticket this one hangs off in the session tree.
    #[must_use]
    pub fn parent_id(&self) -> Option<&TicketId> {
        match &self.kind {
            TicketKind::Service(s) | TicketKind::Proxy(s) => Some(&s.granting_ticket_id),
            TicketKind::TicketGranting(s) | TicketKind::ProxyGranting(s) => s.parent.as_ref(),
        }
    }
}
