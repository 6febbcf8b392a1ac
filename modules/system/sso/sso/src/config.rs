//! Configuration for the SSO module.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use sso_sdk::{Attributes, CredentialKind, ExpirationPolicy, RegisteredService};

/// Module configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SsoConfig {
    pub tickets: TicketsConfig,
    pub registry: RegistryConfig,
    pub authentication: AuthenticationConfig,
    pub services: ServicesConfig,
}

// ============================================================================
// Tickets
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TicketsConfig {
    pub tgt: TicketGrantingTicketConfig,
    pub st: ServiceTicketConfig,
    pub pgt: ProxyGrantingTicketConfig,
    pub pt: ServiceTicketConfig,
    pub id: TicketIdConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TicketGrantingTicketConfig {
    pub expiration: ExpirationPolicy,
    /// Policy for sessions opened with remember-me; `None` disables long-term sessions.
    pub remember_me: Option<ExpirationPolicy>,
}

impl Default for TicketGrantingTicketConfig {
    fn default() -> Self {
        Self {
            expiration: ExpirationPolicy::Sliding {
                idle_timeout: Duration::from_secs(2 * 60 * 60),
                max_time_to_live: Duration::from_secs(8 * 60 * 60),
            },
            remember_me: Some(ExpirationPolicy::TimeToLive {
                time_to_live: Duration::from_secs(14 * 24 * 60 * 60),
            }),
        }
    }
}

/// Service and proxy ticket defaults; registered services may override them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceTicketConfig {
    #[serde(with = "sso_sdk::humantime_serde")]
    pub time_to_live: Duration,
    pub number_of_uses: u32,
}

impl Default for ServiceTicketConfig {
    fn default() -> Self {
        Self {
            time_to_live: Duration::from_secs(10),
            number_of_uses: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyGrantingTicketConfig {
    pub expiration: ExpirationPolicy,
}

impl Default for ProxyGrantingTicketConfig {
    fn default() -> Self {
        Self {
            expiration: ExpirationPolicy::TimeToLive {
                time_to_live: Duration::from_secs(2 * 60 * 60),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TicketIdConfig {
    /// Length of the random part, in alphanumeric characters.
    pub random_length: usize,
    /// Appended to every id so backends can partition by node.
    pub node_suffix: Option<String>,
}

impl Default for TicketIdConfig {
    fn default() -> Self {
        Self {
            random_length: 32,
            node_suffix: None,
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Deadline for a single ticket registry call.
    #[serde(with = "sso_sdk::humantime_serde")]
    pub operation_timeout: Duration,
    /// Attempts of a read-modify-write cycle before giving up on contention.
    pub update_retries: u32,
    pub cleaner: CleanerConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(5),
            update_retries: 8,
            cleaner: CleanerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanerConfig {
    pub enabled: bool,
    #[serde(with = "sso_sdk::humantime_serde")]
    pub start_delay: Duration,
    #[serde(with = "sso_sdk::humantime_serde")]
    pub interval: Duration,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_delay: Duration::from_secs(20),
            interval: Duration::from_secs(120),
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthenticationConfig {
    pub policy: AuthenticationPolicyConfig,
    /// Deadline for a single handler invocation.
    #[serde(with = "sso_sdk::humantime_serde")]
    pub handler_timeout: Duration,
    /// Fail the transaction when principal resolution fails after a handler succeeded.
    pub principal_resolution_failure_fatal: bool,
    /// Include handler names in authentication failures returned to adapters.
    pub expose_handler_names: bool,
    pub principal_resolver: PrincipalResolverConfig,
    /// Handlers bound to credential kinds by name; unbound kinds use every
    /// active handler that supports them.
    pub credential_handlers: BTreeMap<CredentialKind, Vec<String>>,
    /// Static attribute source keyed by principal id.
    pub attributes: BTreeMap<String, Attributes>,
}

impl Default for AuthenticationConfig {
    fn default() -> Self {
        Self {
            policy: AuthenticationPolicyConfig::default(),
            handler_timeout: Duration::from_secs(10),
            principal_resolution_failure_fatal: false,
            expose_handler_names: false,
            principal_resolver: PrincipalResolverConfig::default(),
            credential_handlers: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }
}

/// When does a set of handler outcomes count as authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum AuthenticationPolicyConfig {
    /// At least one handler succeeded.
    #[default]
    AtLeastOne,
    /// Every handler that was attempted succeeded.
    AllHandlers,
    /// The named handler succeeded. With `try_all` the remaining handlers
    /// still run after it so their outcome is recorded.
    RequiredHandler {
        handler: String,
        #[serde(default)]
        try_all: bool,
    },
    /// At least one success and no handler prevented from deciding by an
    /// outage or system error; such a failure also stops the chain.
    NotPrevented,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrincipalResolverConfig {
    /// Keep the id produced by the handler.
    pub use_existing_principal_id: bool,
    /// Re-key the principal to the first value of this attribute.
    pub principal_attribute: Option<String>,
    pub merge_strategy: MergeStrategy,
}

impl Default for PrincipalResolverConfig {
    fn default() -> Self {
        Self {
            use_existing_principal_id: true,
            principal_attribute: None,
            merge_strategy: MergeStrategy::Add,
        }
    }
}

/// How attributes from the repository combine with handler attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Repository values overwrite handler values.
    Replace,
    /// Repository values are only added for names the handler did not set.
    #[default]
    Add,
    /// Values of both sources are combined.
    Multivalued,
}

// ============================================================================
// Services
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServicesConfig {
    /// How long a node may serve a cached service registry snapshot.
    /// `None` disables caching.
    #[serde(with = "sso_sdk::humantime_serde::option")]
    pub cache_ttl: Option<Duration>,
    pub definitions: Vec<RegisteredService>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Some(Duration::from_secs(30)),
            definitions: Vec::new(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SsoConfig::default();

        assert_eq!(cfg.tickets.st.time_to_live, Duration::from_secs(10));
        assert_eq!(cfg.tickets.st.number_of_uses, 1);
        assert!(cfg.registry.cleaner.enabled);
        assert_eq!(cfg.registry.cleaner.start_delay, Duration::from_secs(20));
        assert_eq!(cfg.registry.cleaner.interval, Duration::from_secs(120));
        assert_eq!(
            cfg.authentication.policy,
            AuthenticationPolicyConfig::AtLeastOne
        );
        assert!(!cfg.authentication.expose_handler_names);
        assert_eq!(cfg.services.cache_ttl, Some(Duration::from_secs(30)));
    }

    #[test]
    fn yaml_overrides_nested_sections() {
        let yaml = r"
tickets:
  tgt:
    expiration:
      type: time_to_live
      time_to_live: 1h
    remember_me: ~
  st:
    time_to_live: 30s
  id:
    node_suffix: node-a
registry:
  cleaner:
    enabled: false
authentication:
  policy:
    type: required_handler
    handler: otp
  handler_timeout: 250ms
  credential_handlers:
    one_time_code: [otp]
services:
  cache_ttl: ~
";
        let cfg: SsoConfig = serde_saphyr::from_str(yaml).unwrap();

        assert_eq!(
            cfg.tickets.tgt.expiration,
            ExpirationPolicy::TimeToLive {
                time_to_live: Duration::from_secs(3600)
            }
        );
        assert!(cfg.tickets.tgt.remember_me.is_none());
        assert_eq!(cfg.tickets.st.time_to_live, Duration::from_secs(30));
        assert_eq!(cfg.tickets.st.number_of_uses, 1, "unset field keeps default");
        assert_eq!(cfg.tickets.id.node_suffix.as_deref(), Some("node-a"));
        assert!(!cfg.registry.cleaner.enabled);
        assert_eq!(
            cfg.authentication.policy,
            AuthenticationPolicyConfig::RequiredHandler {
                handler: "otp".to_owned(),
                try_all: false
            }
        );
        assert_eq!(
            cfg.authentication.handler_timeout,
            Duration::from_millis(250)
        );
        assert_eq!(
            cfg.authentication.credential_handlers[&CredentialKind::OneTimeCode],
            vec!["otp".to_owned()]
        );
        assert!(cfg.services.cache_ttl.is_none());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_saphyr::from_str::<SsoConfig>("registry:\n  bogus: 1\n").is_err());
    }
}
