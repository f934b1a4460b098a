//! Clamps RR TTLs on responses from the wrapped child to a configured
//! [min, max] range. A bound of 0 means "no bound".

use super::super::message;
use async_trait::async_trait;
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::Message;
use std::sync::Arc;

pub struct TtlModifier {
    id: Arc<str>,
    inner: Arc<dyn DnsResolver>,
    min_ttl: u32,
    max_ttl: u32,
}

impl TtlModifier {
    pub fn new(
        id: impl Into<Arc<str>>,
        inner: Arc<dyn DnsResolver>,
        min_ttl: u32,
        max_ttl: u32,
    ) -> Self {
        Self {
            id: id.into(),
            inner,
            min_ttl,
            max_ttl,
        }
    }
}

#[async_trait]
impl DnsResolver for TtlModifier {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        let mut response = self.inner.resolve(query, client).await?;
        let (min, max) = (self.min_ttl, self.max_ttl);
        message::map_ttls(&mut response, |ttl| {
            let mut ttl = ttl;
            if min > 0 && ttl < min {
                ttl = min;
            }
            if max > 0 && ttl > max {
                ttl = max;
            }
            ttl
        });
        Ok(response)
    }
}
