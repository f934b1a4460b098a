use conduit_dns_infrastructure::dns::DnsListener;
use std::time::Duration;
use tracing::{error, info};

const RESTART_BACKOFF: Duration = Duration::from_secs(1);

/// Spawn one supervisor task per listener. A crashed listener is
/// restarted after a short backoff; one listener failing never takes its
/// peers down.
pub fn run_listeners(listeners: Vec<DnsListener>) {
    for listener in listeners {
        tokio::spawn(async move {
            loop {
                info!(listener = %listener.id(), address = %listener.address(), "Starting listener");
                if let Err(e) = listener.run().await {
                    error!(listener = %listener.id(), error = %e, "Listener failed");
                }
                tokio::time::sleep(RESTART_BACKOFF).await;
            }
        });
    }
}
