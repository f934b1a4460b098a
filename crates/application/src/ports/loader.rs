use async_trait::async_trait;
use conduit_dns_domain::ResolveError;

/// Produces raw rule lines for a blocklist database, on demand.
///
/// Loaders fetch; databases parse. Comment and blank lines are passed
/// through unfiltered.
#[async_trait]
pub trait RuleLoader: Send + Sync {
    /// Human-readable source description for logs.
    fn source(&self) -> &str;

    async fn load(&self) -> Result<Vec<String>, ResolveError>;
}
