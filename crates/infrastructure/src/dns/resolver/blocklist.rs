//! Query-name blocklist stage. The allowlist is consulted first
//! (allow-overrides-block); a blocked name is answered with a spoofed
//! record when the matching rule carries one (hosts format), by the
//! sinkhole resolver when one is configured, and with NXDOMAIN otherwise.

use super::super::blocklist::SwappableDb;
use super::super::message;
use async_trait::async_trait;
use conduit_dns_application::ports::{DnsResolver, NameRuleMatch, RefreshPort};
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{RData, Record, RecordType};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

const SPOOFED_TTL: u32 = 3600;

#[derive(Default)]
pub struct BlocklistOptions {
    /// Answers blocked queries instead of NXDOMAIN (the sinkhole).
    pub block_resolver: Option<Arc<dyn DnsResolver>>,
    /// Names matching here bypass the blocklist entirely.
    pub allowlist: Option<Arc<SwappableDb>>,
    /// Answers allowlisted queries; the wrapped child when unset.
    pub allow_resolver: Option<Arc<dyn DnsResolver>>,
}

pub struct Blocklist {
    id: Arc<str>,
    inner: Arc<dyn DnsResolver>,
    blocklist: Arc<SwappableDb>,
    options: BlocklistOptions,
}

impl Blocklist {
    pub fn new(
        id: impl Into<Arc<str>>,
        inner: Arc<dyn DnsResolver>,
        blocklist: Arc<SwappableDb>,
        options: BlocklistOptions,
    ) -> Self {
        Self {
            id: id.into(),
            inner,
            blocklist,
            options,
        }
    }

    /// Refreshable snapshots held by this stage, for the job runner.
    pub fn refresh_ports(&self) -> Vec<Arc<dyn RefreshPort>> {
        let mut ports: Vec<Arc<dyn RefreshPort>> = vec![self.blocklist.clone()];
        if let Some(allowlist) = &self.options.allowlist {
            ports.push(allowlist.clone());
        }
        ports
    }

    /// Spoofed answer from a hosts-format rule, when the rule carries an
    /// address usable for the query type. All-unspecified rules
    /// (0.0.0.0 / ::) block with NXDOMAIN instead.
    fn spoofed_reply(&self, query: &Message, rule: &NameRuleMatch) -> Option<Message> {
        let question = query.queries().first()?;
        let qname = question.name().clone();
        let qtype = question.query_type();

        let mut response = message::reply_with_rcode(query, ResponseCode::NoError);
        let mut added = false;
        for address in &rule.answers {
            if address.is_unspecified() {
                continue;
            }
            let rdata = match (qtype, address) {
                (RecordType::A, IpAddr::V4(v4)) => RData::A(A(*v4)),
                (RecordType::AAAA, IpAddr::V6(v6)) => RData::AAAA(AAAA(*v6)),
                _ => continue,
            };
            response.add_answer(Record::from_rdata(qname.clone(), SPOOFED_TTL, rdata));
            added = true;
        }
        added.then_some(response)
    }
}

#[async_trait]
impl DnsResolver for Blocklist {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        let Some(qname) = message::qname(query) else {
            return self.inner.resolve(query, client).await;
        };

        if let Some(allowlist) = &self.options.allowlist {
            if let Some(rule) = allowlist.current().matches(&qname) {
                debug!(resolver = %self.id, qname, rule = %rule.rule, "Allowlist match");
                return match &self.options.allow_resolver {
                    Some(allow) => allow.resolve(query, client).await,
                    None => self.inner.resolve(query, client).await,
                };
            }
        }

        if let Some(rule) = self.blocklist.current().matches(&qname) {
            debug!(resolver = %self.id, qname, rule = %rule.rule, "Blocklist match");
            if !rule.answers.is_empty() {
                if let Some(spoofed) = self.spoofed_reply(query, &rule) {
                    return Ok(spoofed);
                }
                return Ok(message::reply_with_rcode(query, ResponseCode::NXDomain));
            }
            return match &self.options.block_resolver {
                Some(sinkhole) => sinkhole.resolve(query, client).await,
                None => Ok(message::reply_with_rcode(query, ResponseCode::NXDomain)),
            };
        }

        self.inner.resolve(query, client).await
    }
}
