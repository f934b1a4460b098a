//! Inspects the names in a response's answer section (owner names and
//! CNAME targets) against a name blocklist. CNAME cloaking is the
//! target: the queried name is clean but the chain walks through a
//! blocked domain.

use super::super::blocklist::SwappableDb;
use super::super::message;
use async_trait::async_trait;
use conduit_dns_application::ports::{DnsResolver, RefreshPort};
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{RData, Record};
use std::sync::Arc;
use tracing::debug;

pub struct ResponseBlocklistName {
    id: Arc<str>,
    inner: Arc<dyn DnsResolver>,
    blocklist: Arc<SwappableDb>,
    /// Answers blocked queries instead of NXDOMAIN.
    block_resolver: Option<Arc<dyn DnsResolver>>,
}

impl ResponseBlocklistName {
    pub fn new(
        id: impl Into<Arc<str>>,
        inner: Arc<dyn DnsResolver>,
        blocklist: Arc<SwappableDb>,
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

    fn record_names(record: &Record) -> Vec<String> {
        let normalize = |name: &hickory_proto::rr::Name| {
            name.to_lowercase().to_utf8().trim_end_matches('.').to_string()
        };
        let mut names = vec![normalize(record.name())];
        if let RData::CNAME(target) = record.data() {
            names.push(normalize(&target.0));
        }
        names
    }
}

#[async_trait]
impl DnsResolver for ResponseBlocklistName {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        let response = self.inner.resolve(query, client).await?;

        let db = self.blocklist.current();
        for record in response.answers() {
            for name in Self::record_names(record) {
                if let Some(rule) = db.matches(&name) {
                    debug!(resolver = %self.id, name, rule = %rule.rule, "Response name blocked");
                    return match &self.block_resolver {
                        Some(sinkhole) => sinkhole.resolve(query, client).await,
                        None => Ok(message::reply_with_rcode(query, ResponseCode::NXDomain)),
                    };
                }
            }
        }

        Ok(response)
    }
}
