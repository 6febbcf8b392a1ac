//! Authentication plugins compiled into the server.

use std::sync::Arc;

use sso_sdk::AuthenticationHandler;

use crate::config::PluginsConfig;

/// Initialize every enabled plugin and collect its handlers.
#[cfg_attr(not(feature = "static-authn"), allow(clippy::unnecessary_wraps))]
pub fn authentication_handlers(
    config: &PluginsConfig,
) -> anyhow::Result<Vec<Arc<dyn AuthenticationHandler>>> {
    let mut handlers = Vec::new();

    #[cfg(feature = "static-authn")]
    if let Some(cfg) = &config.static_sso_authn {
        let plugin = static_sso_authn_plugin::StaticSsoAuthnPlugin::default();
        handlers.extend(plugin.init(cfg)?);
    }

    #[cfg(not(feature = "static-authn"))]
    let _ = config;

    if handlers.is_empty() {
        tracing::warn!("no authentication handlers configured; every login will fail");
    }
    Ok(handlers)
}
