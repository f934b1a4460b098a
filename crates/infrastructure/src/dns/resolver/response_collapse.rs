//! Collapses CNAME chains in the answer section down to the terminal
//! A/AAAA records, rewritten onto the query name. Some stub resolvers
//! and embedded clients choke on chains; this stage hides them.

use super::super::message;
use async_trait::async_trait;
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::RecordType;
use std::sync::Arc;

pub struct ResponseCollapse {
    id: Arc<str>,
    inner: Arc<dyn DnsResolver>,
    /// RCODE for responses where collapsing leaves no answers; default
    /// NOERROR with an empty answer section.
    null_rcode: ResponseCode,
}

impl ResponseCollapse {
    pub fn new(
        id: impl Into<Arc<str>>,
        inner: Arc<dyn DnsResolver>,
        null_rcode: Option<ResponseCode>,
    ) -> Self {
        Self {
            id: id.into(),
            inner,
            null_rcode: null_rcode.unwrap_or(ResponseCode::NoError),
        }
    }
}

#[async_trait]
impl DnsResolver for ResponseCollapse {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        let mut response = self.inner.resolve(query, client).await?;
        if response.answers().is_empty() {
            return Ok(response);
        }

        let qname = message::question(query)?.name().clone();

        let collapsed: Vec<_> = response
            .take_answers()
            .into_iter()
            .filter(|r| matches!(r.record_type(), RecordType::A | RecordType::AAAA))
            .map(|mut r| {
                r.set_name(qname.clone());
                r
            })
            .collect();

        if collapsed.is_empty() {
            response.set_response_code(self.null_rcode);
        }
        response.insert_answers(collapsed);
        Ok(response)
    }
}
