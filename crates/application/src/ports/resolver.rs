use async_trait::async_trait;
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::Message;

/// The single contract every pipeline node implements: leaves, modifiers,
/// caches, blocklists, groups and routers. Composition is structural: a
/// stage wraps children that are themselves `DnsResolver`s.
///
/// Implementations must be reentrant: `resolve` runs concurrently on the
/// same instance from many tasks. The query is borrowed and must not be
/// retained or mutated; a stage that rewrites the query clones it and
/// hands the derived message to its child.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Unique node id, used for logging and graph assembly.
    fn id(&self) -> &str;

    /// Answer `query` for `client`. A returned message always carries the
    /// query's id and question. `Err` means no response could be produced
    /// at all; callers check [`ResolveError::is_transient`] before
    /// retrying elsewhere.
    async fn resolve(&self, query: &Message, client: &ClientInfo)
        -> Result<Message, ResolveError>;
}
