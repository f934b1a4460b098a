use conduit_dns_application::ports::CacheMaintenancePort;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Background job sweeping expired entries out of one cache on its
/// configured GC period.
pub struct CacheMaintenanceJob {
    cache: Arc<dyn CacheMaintenancePort>,
    shutdown: CancellationToken,
}

impl CacheMaintenanceJob {
    pub fn new(cache: Arc<dyn CacheMaintenancePort>) -> Self {
        Self {
            cache,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub async fn start(self: Arc<Self>) {
        let period = self.cache.gc_period();
        info!(
            cache = %self.cache.name(),
            period_secs = period.as_secs(),
            "Starting cache maintenance job"
        );

        let mut interval = tokio::time::interval(period);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!(cache = %self.cache.name(), "CacheMaintenanceJob: shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let outcome = self.cache.sweep_expired();
                    if outcome.removed > 0 {
                        debug!(
                            cache = %self.cache.name(),
                            scanned = outcome.scanned,
                            removed = outcome.removed,
                            remaining = outcome.remaining,
                            "Expired cache entries swept"
                        );
                    }
                }
            }
        }
    }
}
