//! Inspects A/AAAA addresses in the answer section against an IP
//! blocklist. In `filter` mode only the offending records are stripped;
//! otherwise a single match condemns the whole response.

use super::super::blocklist::SwappableIpDb;
use super::super::message;
use async_trait::async_trait;
use conduit_dns_application::ports::{DnsResolver, RefreshPort};
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{RData, Record};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

pub struct ResponseBlocklistIp {
    id: Arc<str>,
    inner: Arc<dyn DnsResolver>,
    blocklist: Arc<SwappableIpDb>,
    /// Answers blocked queries instead of NXDOMAIN. Ignored in filter mode.
    block_resolver: Option<Arc<dyn DnsResolver>>,
    /// Strip matching records instead of replacing the whole response.
    filter: bool,
}

impl ResponseBlocklistIp {
    pub fn new(
        id: impl Into<Arc<str>>,
        inner: Arc<dyn DnsResolver>,
        blocklist: Arc<SwappableIpDb>,
        block_resolver: Option<Arc<dyn DnsResolver>>,
        filter: bool,
    ) -> Self {
        Self {
            id: id.into(),
            inner,
            blocklist,
            block_resolver,
            filter,
        }
    }

    pub fn refresh_ports(&self) -> Vec<Arc<dyn RefreshPort>> {
        vec![self.blocklist.clone()]
    }

    fn record_address(record: &Record) -> Option<IpAddr> {
        match record.data() {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        }
    }
}

#[async_trait]
impl DnsResolver for ResponseBlocklistIp {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        let mut response = self.inner.resolve(query, client).await?;
        let db = self.blocklist.current();

        if self.filter {
            let had_answers = !response.answers().is_empty();
            let kept: Vec<_> = response
                .take_answers()
                .into_iter()
                .filter(|record| match Self::record_address(record) {
                    Some(ip) => match db.matches(ip) {
                        Some(rule) => {
                            debug!(resolver = %self.id, %ip, rule = %rule.rule, "Answer record filtered");
                            false
                        }
                        None => true,
                    },
                    None => true,
                })
                .collect();

            if had_answers && kept.is_empty() {
                return Ok(message::reply_with_rcode(query, ResponseCode::NXDomain));
            }
            response.insert_answers(kept);
            return Ok(response);
        }

        let blocked = response
            .answers()
            .iter()
            .filter_map(Self::record_address)
            .find_map(|ip| db.matches(ip).map(|rule| (ip, rule)));

        if let Some((ip, rule)) = blocked {
            debug!(resolver = %self.id, %ip, rule = %rule.rule, "Response address blocked");
            return match &self.block_resolver {
                Some(sinkhole) => sinkhole.resolve(query, client).await,
                None => Ok(message::reply_with_rcode(query, ResponseCode::NXDomain)),
            };
        }

        Ok(response)
    }
}
