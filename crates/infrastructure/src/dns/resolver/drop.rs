//! Leaf resolver that discards the query. The listener sees
//! [`ResolveError::Dropped`] and sends nothing back, which makes the
//! client time out instead of learning anything.

use async_trait::async_trait;
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::Message;
use std::sync::Arc;

pub struct DropResolver {
    id: Arc<str>,
}

impl DropResolver {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl DnsResolver for DropResolver {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(
        &self,
        _query: &Message,
        _client: &ClientInfo,
    ) -> Result<Message, ResolveError> {
        Err(ResolveError::Dropped)
    }
}
