//! Configuration for the static SSO authentication plugin.

use std::collections::BTreeMap;

use secrecy::SecretString;
use serde::Deserialize;
use sso_sdk::{Attributes, HandlerState};

/// Plugin configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticSsoAuthnPluginConfig {
    /// Username/password handler settings.
    pub password: PasswordHandlerConfig,

    /// Accounts accepted by the password handler, keyed by username.
    pub users: BTreeMap<String, UserAccount>,

    /// One-time-code handler; not registered when absent.
    pub one_time_code: Option<OneTimeCodeHandlerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordHandlerConfig {
    /// Handler name recorded in authentication metadata.
    pub name: String,

    /// Position in the authentication chain (lower runs first).
    pub order: i32,

    pub state: HandlerState,

    /// How `users.*.password` is stored.
    pub encoding: PasswordEncoding,
}

impl Default for PasswordHandlerConfig {
    fn default() -> Self {
        Self {
            name: "static".to_owned(),
            order: 0,
            state: HandlerState::Active,
            encoding: PasswordEncoding::Plain,
        }
    }
}

/// Storage format of configured passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PasswordEncoding {
    #[default]
    Plain,
    /// Hex-encoded SHA-256 digest of the UTF-8 password.
    Sha256,
}

/// A configured account.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserAccount {
    pub password: SecretString,

    #[serde(default)]
    pub status: AccountStatus,

    /// Attributes attached to the principal the handler returns.
    #[serde(default)]
    pub attributes: Attributes,
}

/// Account state checked after the password matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Disabled,
    Locked,
    /// Password has expired.
    Expired,
    MustChangePassword,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OneTimeCodeHandlerConfig {
    pub name: String,

    pub order: i32,

    /// `standby` keeps the handler out of plain logins; services opt in
    /// through `required_handlers`.
    pub state: HandlerState,

    /// Single-use codes per username.
    pub codes: BTreeMap<String, Vec<SecretString>>,
}

impl Default for OneTimeCodeHandlerConfig {
    fn default() -> Self {
        Self {
            name: "otp".to_owned(),
            order: 10,
            state: HandlerState::Standby,
            codes: BTreeMap::new(),
        }
    }
}
