//! Server configuration: YAML file merged with `SSO__` environment overrides.

use std::path::Path;

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;
use sso::config::SsoConfig;

/// Prefix of environment overrides; `__` separates nested keys.
pub const ENV_PREFIX: &str = "SSO__";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub logging: LoggingConfig,
    pub sso: SsoConfig,
    pub plugins: PluginsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is not set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginsConfig {
    /// Static accounts plugin; no handler is registered when absent.
    #[cfg(feature = "static-authn")]
    pub static_sso_authn: Option<static_sso_authn_plugin::config::StaticSsoAuthnPluginConfig>,
}

impl ServerConfig {
    /// Load defaults, then the YAML file (if any), then environment overrides.
    ///
    /// # Errors
    /// Fails when the file is missing or any source does not fit the schema.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::figment(path)?
            .extract()
            .context("failed to load configuration")
    }

    fn figment(path: Option<&Path>) -> anyhow::Result<Figment> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            anyhow::ensure!(
                path.is_file(),
                "configuration file {} not found",
                path.display()
            );
            figment = figment.merge(Yaml::file(path));
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }
}
