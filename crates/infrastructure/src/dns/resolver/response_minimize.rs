//! Strips the authority and additional sections from responses, leaving
//! only the answers the client asked for. The EDNS0 OPT pseudo-record is
//! kept.

use async_trait::async_trait;
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::Message;
use std::sync::Arc;

pub struct ResponseMinimize {
    id: Arc<str>,
    inner: Arc<dyn DnsResolver>,
}

impl ResponseMinimize {
    pub fn new(id: impl Into<Arc<str>>, inner: Arc<dyn DnsResolver>) -> Self {
        Self {
            id: id.into(),
            inner,
        }
    }
}

#[async_trait]
impl DnsResolver for ResponseMinimize {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        let mut response = self.inner.resolve(query, client).await?;
        response.take_name_servers();
        response.take_additionals();
        Ok(response)
    }
}
