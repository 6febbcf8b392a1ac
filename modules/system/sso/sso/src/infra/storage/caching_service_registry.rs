//! Node-local cache over a remote service registry.
//!
//! Readers see an immutable snapshot through `ArcSwap`. A snapshot older
//! than the configured staleness bound is reloaded by a single caller while
//! the others wait on the refresh lock; if the reload fails the stale
//! snapshot keeps serving.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use sso_sdk::{RegisteredService, Service, ServiceRegistry, ServiceRegistryError};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::services::{MatchableService, compile_all, find_match};

struct Snapshot {
    services: Vec<MatchableService>,
    loaded_at: Option<Instant>,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            services: Vec::new(),
            loaded_at: None,
        }
    }

    fn is_fresh(&self, max_age: Duration) -> bool {
        self.loaded_at.is_some_and(|t| t.elapsed() <= max_age)
    }
}

pub struct CachingServiceRegistry {
    inner: Arc<dyn ServiceRegistry>,
    max_age: Duration,
    snapshot: ArcSwap<Snapshot>,
    refresh_lock: Mutex<()>,
}

impl CachingServiceRegistry {
    #[must_use]
    pub fn new(inner: Arc<dyn ServiceRegistry>, max_age: Duration) -> Self {
        Self {
            inner,
            max_age,
            snapshot: ArcSwap::from_pointee(Snapshot::empty()),
            refresh_lock: Mutex::new(()),
        }
    }

    async fn current(&self) -> Result<Arc<Snapshot>, ServiceRegistryError> {
        let snapshot = self.snapshot.load_full();
        if snapshot.is_fresh(self.max_age) {
            return Ok(snapshot);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        let snapshot = self.snapshot.load_full();
        if snapshot.is_fresh(self.max_age) {
            return Ok(snapshot);
        }

        match self.inner.load().await.and_then(compile_all) {
            Ok(services) => {
                debug!(count = services.len(), "service registry snapshot refreshed");
                let fresh = Arc::new(Snapshot {
                    services,
                    loaded_at: Some(Instant::now()),
                });
                self.snapshot.store(Arc::clone(&fresh));
                Ok(fresh)
            }
            Err(e) if snapshot.loaded_at.is_some() => {
                warn!(error = %e, "service registry refresh failed; serving stale snapshot");
                Ok(snapshot)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop the snapshot so the next lookup reloads.
    pub fn invalidate(&self) {
        self.snapshot.store(Arc::new(Snapshot::empty()));
    }
}

#[async_trait]
impl ServiceRegistry for CachingServiceRegistry {
    async fn find_service_by(
        &self,
        service: &Service,
    ) -> Result<Option<RegisteredService>, ServiceRegistryError> {
        let snapshot = self.current().await?;
        Ok(find_match(&snapshot.services, service).cloned())
    }

    async fn load(&self) -> Result<Vec<RegisteredService>, ServiceRegistryError> {
        let snapshot = self.current().await?;
        Ok(snapshot
            .services
            .iter()
            .map(|s| s.definition().clone())
            .collect())
    }
}
