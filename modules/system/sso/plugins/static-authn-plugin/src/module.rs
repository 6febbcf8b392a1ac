//! Static SSO authentication plugin module.

use std::sync::{Arc, OnceLock};

use sso_sdk::AuthenticationHandler;
use tracing::{info, warn};

use crate::config::{PasswordEncoding, StaticSsoAuthnPluginConfig};
use crate::domain::service::is_sha256_digest;
use crate::domain::{OneTimeCodeHandler, PasswordHandler, Service};

/// Static SSO authentication plugin module.
///
/// Builds the account service from configuration and hands its handlers to
/// the sso module builder.
#[derive(Default)]
pub struct StaticSsoAuthnPlugin {
    service: OnceLock<Arc<Service>>,
}

impl StaticSsoAuthnPlugin {
    /// Initialize the plugin and return the handlers it contributes.
    ///
    /// # Errors
    /// Fails on a second call, when both handlers share a name, or when a
    /// SHA-256 password is not a hex digest.
    pub fn init(
        &self,
        cfg: &StaticSsoAuthnPluginConfig,
    ) -> anyhow::Result<Vec<Arc<dyn AuthenticationHandler>>> {
        info!("Initializing static_sso_authn_plugin");

        match cfg.password.encoding {
            PasswordEncoding::Plain if !cfg.users.is_empty() => warn!(
                "Static SSO authentication plugin stores passwords in plain text. \
                 Do NOT use this configuration in production."
            ),
            PasswordEncoding::Sha256 => {
                if let Some((name, _)) = cfg
                    .users
                    .iter()
                    .find(|(_, account)| !is_sha256_digest(&account.password))
                {
                    anyhow::bail!("password of user '{name}' is not a SHA-256 hex digest");
                }
            }
            PasswordEncoding::Plain => {}
        }
        if let Some(otp) = &cfg.one_time_code {
            anyhow::ensure!(
                otp.name != cfg.password.name,
                "handler name '{}' is used twice",
                otp.name
            );
        }

        info!(
            handler = %cfg.password.name,
            encoding = ?cfg.password.encoding,
            user_count = cfg.users.len(),
            one_time_codes = cfg.one_time_code.is_some(),
            "Loaded plugin configuration"
        );

        let service = Arc::new(Service::from_config(cfg));
        self.service
            .set(service.clone())
            .map_err(|_| anyhow::anyhow!("Service already initialized"))?;

        let mut handlers: Vec<Arc<dyn AuthenticationHandler>> = vec![Arc::new(
            PasswordHandler::new(service.clone(), &cfg.password),
        )];
        if let Some(otp) = &cfg.one_time_code {
            handlers.push(Arc::new(OneTimeCodeHandler::new(service, otp)));
        }

        info!(handlers = handlers.len(), "Static sso authn plugin initialized");
        Ok(handlers)
    }

    /// The account service, once initialized.
    #[must_use]
    pub fn service(&self) -> Option<Arc<Service>> {
        self.service.get().cloned()
    }
}
