//! SSO module wiring.

use std::collections::HashSet;
use std::sync::Arc;

use sso_sdk::{
    AttributeRepository, CentralAuthenticationServiceClient, RegisteredService, ServiceRegistry,
    TicketRegistry,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{AuthenticationPolicyConfig, SsoConfig};
use crate::domain::authn::{
    AttributeMergingPrincipalResolver, AuthenticationManager, CredentialKindHandlerResolver,
    DefaultHandlerResolver, HandlerRef, HandlerResolver, PROXY_CALLBACK_HANDLER,
    ServiceAwareHandlerResolver,
};
use crate::domain::services::ServiceCatalog;
use crate::domain::tickets::{
    RandomTicketIdGenerator, RegistryCleaner, TicketFactory, TicketIdGenerator, TicketStore,
};
use crate::domain::{CentralAuthenticationService, Clock, SsoLocalClient, SystemClock};
use crate::infra::storage::{
    CachingServiceRegistry, InMemoryTicketRegistry, StaticAttributeRepository,
    StaticServiceRegistry,
};

/// Assembled SSO module: the facade, its local client and the registry cleaner.
///
/// This module:
/// 1. Builds the authentication chain from the configured policy and the
///    handlers supplied by plugins
/// 2. Wires the ticket registry (in-memory unless one is supplied)
/// 3. Loads registered services from configuration, cached per node when
///    `services.cache_ttl` is set
pub struct SsoModule {
    service: Arc<CentralAuthenticationService>,
    client: Arc<dyn CentralAuthenticationServiceClient>,
    cleaner: Arc<RegistryCleaner>,
    cleaner_enabled: bool,
    definitions: Option<Arc<StaticServiceRegistry>>,
    cache: Option<Arc<CachingServiceRegistry>>,
}

impl SsoModule {
    #[must_use]
    pub fn builder(config: SsoConfig) -> SsoModuleBuilder {
        SsoModuleBuilder {
            config,
            handlers: Vec::new(),
            ticket_registry: None,
            service_registry: None,
            attribute_repository: None,
            clock: None,
            ids: None,
        }
    }

    #[must_use]
    pub fn service(&self) -> Arc<CentralAuthenticationService> {
        self.service.clone()
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn CentralAuthenticationServiceClient> {
        self.client.clone()
    }

    #[must_use]
    pub fn cleaner(&self) -> Arc<RegistryCleaner> {
        self.cleaner.clone()
    }

    /// Start the background cleaner unless it is disabled in configuration.
    #[must_use]
    pub fn spawn_cleaner(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        if !self.cleaner_enabled {
            info!("registry cleaner disabled");
            return None;
        }
        Some(self.cleaner.clone().spawn(cancel))
    }

    /// Replace the registered services loaded from configuration.
    ///
    /// # Errors
    /// Fails when the module was built with an external service registry or
    /// a definition is invalid; the previous definitions stay active.
    pub fn reload_services(&self, definitions: Vec<RegisteredService>) -> anyhow::Result<()> {
        let registry = self
            .definitions
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("service registry is not configuration-backed"))?;
        let count = definitions.len();
        registry.replace(definitions)?;
        if let Some(cache) = &self.cache {
            cache.invalidate();
        }
        info!(services = count, "registered services reloaded");
        Ok(())
    }
}

pub struct SsoModuleBuilder {
    config: SsoConfig,
    handlers: Vec<HandlerRef>,
    ticket_registry: Option<Arc<dyn TicketRegistry>>,
    service_registry: Option<Arc<dyn ServiceRegistry>>,
    attribute_repository: Option<Arc<dyn AttributeRepository>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn TicketIdGenerator>>,
}

impl SsoModuleBuilder {
    #[must_use]
    pub fn handler(mut self, handler: HandlerRef) -> Self {
        self.handlers.push(handler);
        self
    }

    #[must_use]
    pub fn handlers(mut self, handlers: impl IntoIterator<Item = HandlerRef>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    #[must_use]
    pub fn ticket_registry(mut self, registry: Arc<dyn TicketRegistry>) -> Self {
        self.ticket_registry = Some(registry);
        self
    }

    /// Use an external service registry instead of `services.definitions`.
    #[must_use]
    pub fn service_registry(mut self, registry: Arc<dyn ServiceRegistry>) -> Self {
        self.service_registry = Some(registry);
        self
    }

    /// Use an external attribute source instead of `authentication.attributes`.
    #[must_use]
    pub fn attribute_repository(mut self, repository: Arc<dyn AttributeRepository>) -> Self {
        self.attribute_repository = Some(repository);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn ticket_ids(mut self, ids: Arc<dyn TicketIdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// # Errors
    /// Duplicate or reserved handler names, a policy naming an unknown
    /// handler, or an invalid service definition.
    pub fn build(self) -> anyhow::Result<SsoModule> {
        let Self {
            config,
            handlers,
            ticket_registry,
            service_registry,
            attribute_repository,
            clock,
            ids,
        } = self;
        info!(handlers = handlers.len(), "Initializing sso module");

        let names = check_handler_names(&handlers)?;
        if let AuthenticationPolicyConfig::RequiredHandler { handler, .. } =
            &config.authentication.policy
        {
            anyhow::ensure!(
                names.contains(handler.as_str()),
                "authentication policy requires unknown handler '{handler}'"
            );
        }
        for (kind, bound) in &config.authentication.credential_handlers {
            for name in bound.iter().filter(|n| !names.contains(n.as_str())) {
                warn!(credential = kind.as_str(), handler = %name, "credential bound to unknown handler");
            }
        }

        let clock = clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = ids.unwrap_or_else(|| Arc::new(RandomTicketIdGenerator::new(&config.tickets.id)));

        // Authentication chain
        let mut resolver: Arc<dyn HandlerResolver> = Arc::new(DefaultHandlerResolver);
        if !config.authentication.credential_handlers.is_empty() {
            resolver = Arc::new(CredentialKindHandlerResolver::new(
                config.authentication.credential_handlers.clone(),
                resolver,
            ));
        }
        let resolver = Arc::new(ServiceAwareHandlerResolver::new(resolver));
        let attributes = attribute_repository.unwrap_or_else(|| {
            Arc::new(StaticAttributeRepository::new(
                config.authentication.attributes.clone(),
            ))
        });
        let principal_resolver = Arc::new(AttributeMergingPrincipalResolver::new(
            attributes,
            config.authentication.principal_resolver.clone(),
        ));
        let authentication = Arc::new(AuthenticationManager::new(
            handlers,
            resolver,
            principal_resolver,
            &config.authentication,
            clock.clone(),
        ));

        let RegisteredServices {
            catalog,
            definitions,
            cache,
        } = registered_services(&config, service_registry)?;

        // Tickets
        let registry =
            ticket_registry.unwrap_or_else(|| Arc::new(InMemoryTicketRegistry::new()));
        let store = Arc::new(TicketStore::new(
            registry,
            clock.clone(),
            config.registry.operation_timeout,
            config.registry.update_retries,
        ));
        let factory = TicketFactory::new(ids, clock, config.tickets.clone());
        let cleaner = Arc::new(RegistryCleaner::new(
            store.clone(),
            catalog.clone(),
            config.registry.cleaner.clone(),
        ));

        let service = Arc::new(CentralAuthenticationService::new(
            authentication,
            factory,
            store,
            catalog,
        ));
        let client: Arc<dyn CentralAuthenticationServiceClient> = Arc::new(SsoLocalClient::new(
            service.clone(),
            config.authentication.expose_handler_names,
        ));

        Ok(SsoModule {
            service,
            client,
            cleaner,
            cleaner_enabled: config.registry.cleaner.enabled,
            definitions,
            cache,
        })
    }
}

struct RegisteredServices {
    catalog: Arc<ServiceCatalog>,
    definitions: Option<Arc<StaticServiceRegistry>>,
    cache: Option<Arc<CachingServiceRegistry>>,
}

/// Configuration-backed registry unless an external one is supplied, behind
/// the per-node cache when `services.cache_ttl` is set.
fn registered_services(
    config: &SsoConfig,
    external: Option<Arc<dyn ServiceRegistry>>,
) -> anyhow::Result<RegisteredServices> {
    let (services, definitions) = match external {
        Some(external) => (external, None),
        None => {
            let static_registry = Arc::new(StaticServiceRegistry::new(
                config.services.definitions.clone(),
            )?);
            info!(
                services = config.services.definitions.len(),
                "registered services loaded from configuration"
            );
            let shared: Arc<dyn ServiceRegistry> = static_registry.clone();
            (shared, Some(static_registry))
        }
    };
    let (services, cache) = match config.services.cache_ttl {
        Some(ttl) => {
            let cache = Arc::new(CachingServiceRegistry::new(services, ttl));
            let shared: Arc<dyn ServiceRegistry> = cache.clone();
            (shared, Some(cache))
        }
        None => (services, None),
    };
    Ok(RegisteredServices {
        catalog: Arc::new(ServiceCatalog::new(
            services,
            config.registry.operation_timeout,
        )),
        definitions,
        cache,
    })
}

fn check_handler_names(handlers: &[HandlerRef]) -> anyhow::Result<HashSet<&str>> {
    let mut names = HashSet::new();
    for handler in handlers {
        let name = handler.name();
        if name == PROXY_CALLBACK_HANDLER {
            anyhow::bail!("handler name '{name}' is reserved");
        }
        if !names.insert(name) {
            anyhow::bail!("duplicate authentication handler '{name}'");
        }
    }
    Ok(names)
}
