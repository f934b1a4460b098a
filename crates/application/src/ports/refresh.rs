use async_trait::async_trait;
use conduit_dns_domain::ResolveError;
use std::time::Duration;

/// A component with a periodically rebuilt snapshot (blocklist and
/// allowlist databases). The jobs crate drives `refresh` on the interval
/// the component asks for.
#[async_trait]
pub trait RefreshPort: Send + Sync {
    /// Identifies the component in logs.
    fn name(&self) -> &str;

    /// How often to refresh. `None` disables periodic refresh.
    fn refresh_interval(&self) -> Option<Duration>;

    async fn refresh(&self) -> Result<(), ResolveError>;
}
