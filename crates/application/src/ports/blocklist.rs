use async_trait::async_trait;
use conduit_dns_domain::ResolveError;
use std::net::IpAddr;
use std::sync::Arc;

/// Result of matching a query name against a name blocklist.
#[derive(Debug, Clone, Default)]
pub struct NameRuleMatch {
    /// The rule text that matched, for logging.
    pub rule: String,
    /// Replacement addresses carried by hosts-format rules; empty for
    /// domain and regexp rules.
    pub answers: Vec<IpAddr>,
}

/// Immutable snapshot of a compiled name blocklist.
///
/// `reload` builds a brand-new snapshot from the backing loader; the
/// holding stage swaps it in atomically. Readers of the old snapshot are
/// never blocked, and a failed reload leaves the old snapshot in force.
#[async_trait]
pub trait BlocklistDb: Send + Sync {
    /// Match a lowercased query name without its trailing dot.
    fn matches(&self, qname: &str) -> Option<NameRuleMatch>;

    async fn reload(&self) -> Result<Arc<dyn BlocklistDb>, ResolveError>;

    fn rule_count(&self) -> usize;
}

/// Result of matching an address against an IP blocklist.
#[derive(Debug, Clone, Default)]
pub struct IpRuleMatch {
    pub rule: String,
}

/// Immutable snapshot of a compiled IP blocklist. Same snapshot-swap
/// lifecycle as [`BlocklistDb`].
#[async_trait]
pub trait IpBlocklistDb: Send + Sync {
    fn matches(&self, ip: IpAddr) -> Option<IpRuleMatch>;

    async fn reload(&self) -> Result<Arc<dyn IpBlocklistDb>, ResolveError>;

    fn rule_count(&self) -> usize;
}
