use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LogoutType;

/// A relying party as presented in a request (usually its URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Service {
    id: String,
}

impl Service {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// How a registered service recognises request service ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ServiceMatcher {
    Exact { url: String },
    Regex { pattern: String },
    Prefix { prefix: String },
}

/// Policy object describing one relying party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisteredService {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub matcher: ServiceMatcher,
    /// Lower values are evaluated first.
    #[serde(default)]
    pub evaluation_order: i32,
    #[serde(default)]
    pub access_strategy: AccessStrategy,
    #[serde(default)]
    pub attribute_release: AttributeReleasePolicy,
    #[serde(default)]
    pub proxy_policy: ProxyPolicy,
    /// Principal attribute released as the username instead of the principal id.
    #[serde(default)]
    pub username_attribute: Option<String>,
    #[serde(default)]
    pub logout_type: LogoutType,
    /// Endpoint notified on logout; the service id is used when absent.
    #[serde(default)]
    pub logout_url: Option<String>,
    #[serde(default)]
    pub ticket_policy: Option<ServiceTicketPolicy>,
}

impl RegisteredService {
    /// Minimal exact-match definition with default policies.
    #[must_use]
    pub fn exact(id: u64, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id,
            name: url.clone(),
            description: None,
            matcher: ServiceMatcher::Exact { url },
            evaluation_order: 0,
            access_strategy: AccessStrategy::default(),
            attribute_release: AttributeReleasePolicy::default(),
            proxy_policy: ProxyPolicy::default(),
            username_attribute: None,
            logout_type: LogoutType::default(),
            logout_url: None,
            ticket_policy: None,
        }
    }

    #[must_use]
    pub fn is_proxy_allowed(&self) -> bool {
        !matches!(self.proxy_policy, ProxyPolicy::Refuse)
    }
}

/// Access rules evaluated before any ticket is issued or validated for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[allow(clippy::struct_excessive_bools)]
pub struct AccessStrategy {
    pub enabled: bool,
    /// When false the service never accepts an existing SSO session and the
    /// user must present credentials again.
    pub sso_enabled: bool,
    pub starting_date_time: Option<DateTime<Utc>>,
    pub ending_date_time: Option<DateTime<Utc>>,
    /// Attribute name to list of regex patterns, at least one of which must
    /// match one of the principal's values.
    pub required_attributes: BTreeMap<String, Vec<String>>,
    pub require_all_attributes: bool,
    pub case_insensitive: bool,
    /// Handlers that must have succeeded for the authentication to be accepted.
    pub required_handlers: Vec<String>,
}

impl Default for AccessStrategy {
    fn default() -> Self {
        Self {
            enabled: true,
            sso_enabled: true,
            starting_date_time: None,
            ending_date_time: None,
            required_attributes: BTreeMap::new(),
            require_all_attributes: true,
            case_insensitive: false,
            required_handlers: Vec::new(),
        }
    }
}

/// Which principal attributes a service receives in its assertion.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum AttributeReleasePolicy {
    ReturnAll,
    #[default]
    DenyAll,
    ReturnAllowed {
        allowed: Vec<String>,
    },
    /// Release the keys of `mapping` under their mapped names.
    ReturnMapped {
        mapping: BTreeMap<String, String>,
    },
}

/// Whether a service may obtain proxy-granting tickets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ProxyPolicy {
    #[default]
    Refuse,
    /// Proxying allowed when the callback URL matches `pattern`.
    RegexCallback { pattern: String },
}

/// Per-service override of service ticket lifetime and usage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceTicketPolicy {
    #[serde(with = "crate::humantime_serde::option")]
    pub time_to_live: Option<Duration>,
    pub number_of_uses: Option<u32>,
}
