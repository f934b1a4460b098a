use conduit_dns_application::ports::RefreshPort;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Background job that periodically rebuilds one refreshable list
/// snapshot (blocklist or allowlist).
///
/// - `Arc<Self>` spawn so the job owns its state across ticks
/// - First tick consumed immediately: the snapshot was already built
///   during graph assembly, so the first reload happens one full
///   interval after startup
/// - A failed reload is logged and the previous snapshot stays in force
pub struct ListRefreshJob {
    port: Arc<dyn RefreshPort>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ListRefreshJob {
    /// `None` when the port asks for no periodic refresh.
    pub fn new(port: Arc<dyn RefreshPort>) -> Option<Self> {
        let interval = port.refresh_interval()?;
        Some(Self {
            port,
            interval,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub async fn start(self: Arc<Self>) {
        info!(
            list = %self.port.name(),
            interval_secs = self.interval.as_secs(),
            "Starting list refresh job"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!(list = %self.port.name(), "ListRefreshJob: shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match self.port.refresh().await {
                        Ok(()) => info!(list = %self.port.name(), "ListRefreshJob: reload completed"),
                        Err(e) => error!(list = %self.port.name(), error = %e, "ListRefreshJob: reload failed, keeping old snapshot"),
                    }
                }
            }
        }
    }
}
