use serde::{Deserialize, Serialize};

use super::{Service, TicketId};

/// How a relying party is told that its session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutType {
    /// Server-to-server callback.
    #[default]
    BackChannel,
    /// Browser redirect or iframe issued by the protocol adapter.
    FrontChannel,
    /// Service does not take part in single logout.
    None,
}

/// One relying party to notify after a session was destroyed.
///
/// Delivery is the protocol adapter's job; the core only produces the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutRequest {
    /// The service or proxy ticket that was issued to the relying party.
    pub ticket_id: TicketId,
    pub service: Service,
    pub logout_type: LogoutType,
    pub logout_url: Option<String>,
}
