//! Matches the client source address against an IP blocklist before the
//! query reaches the wrapped child. Matched clients are refused, or
//! handed to the sinkhole when one is configured.

use super::super::blocklist::SwappableIpDb;
use super::super::message;
use async_trait::async_trait;
use conduit_dns_application::ports::{DnsResolver, RefreshPort};
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::{Message, ResponseCode};
use std::sync::Arc;
use tracing::debug;

pub struct ClientBlocklist {
    id: Arc<str>,
    inner: Arc<dyn DnsResolver>,
    blocklist: Arc<SwappableIpDb>,
    block_resolver: Option<Arc<dyn DnsResolver>>,
}

impl ClientBlocklist {
    pub fn new(
        id: impl Into<Arc<str>>,
        inner: Arc<dyn DnsResolver>,
        blocklist: Arc<SwappableIpDb>,
        block_resolver: Option<Arc<dyn DnsResolver>>,
    ) -> Self {
        Self {
            id: id.into(),
            inner,
            blocklist,
            block_resolver,
        }
    }

    pub fn refresh_ports(&self) -> Vec<Arc<dyn RefreshPort>> {
        vec![self.blocklist.clone()]
    }
}

#[async_trait]
impl DnsResolver for ClientBlocklist {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        let source_ip = client.source_ip();
        if let Some(rule) = self.blocklist.current().matches(source_ip) {
            debug!(resolver = %self.id, client = %source_ip, rule = %rule.rule, "Client blocked");
            return match &self.block_resolver {
                Some(sinkhole) => sinkhole.resolve(query, client).await,
                None => Ok(message::reply_with_rcode(query, ResponseCode::Refused)),
            };
        }
        self.inner.resolve(query, client).await
    }
}
