use crate::{CacheMaintenanceJob, ListRefreshJob};
use conduit_dns_application::ports::{CacheMaintenancePort, RefreshPort};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Spawns all background jobs of an assembled graph and hands out one
/// cancellation token for a coordinated shutdown.
pub struct JobRunner {
    refresh_ports: Vec<Arc<dyn RefreshPort>>,
    cache_ports: Vec<Arc<dyn CacheMaintenancePort>>,
    shutdown: CancellationToken,
}

impl JobRunner {
    pub fn new(
        refresh_ports: Vec<Arc<dyn RefreshPort>>,
        cache_ports: Vec<Arc<dyn CacheMaintenancePort>>,
    ) -> Self {
        Self {
            refresh_ports,
            cache_ports,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn start(&self) {
        let mut spawned = 0;

        for port in &self.refresh_ports {
            if let Some(job) = ListRefreshJob::new(port.clone()) {
                let job = Arc::new(job.with_cancellation(self.shutdown.clone()));
                tokio::spawn(job.start());
                spawned += 1;
            }
        }

        for cache in &self.cache_ports {
            let job =
                Arc::new(CacheMaintenanceJob::new(cache.clone()).with_cancellation(self.shutdown.clone()));
            tokio::spawn(job.start());
            spawned += 1;
        }

        info!(jobs = spawned, "Background jobs started");
    }
}
