//! Group resolver distributing queries over its children in rotation.

use async_trait::async_trait;
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::Message;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

pub struct RoundRobin {
    id: Arc<str>,
    children: Vec<Arc<dyn DnsResolver>>,
    next: AtomicUsize,
}

impl RoundRobin {
    pub fn new(id: impl Into<Arc<str>>, children: Vec<Arc<dyn DnsResolver>>) -> Self {
        Self {
            id: id.into(),
            children,
            next: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DnsResolver for RoundRobin {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.children.len();
        let child = &self.children[index];
        debug!(resolver = %self.id, child = %child.id(), "Dispatching round-robin");
        child.resolve(query, client).await
    }
}
