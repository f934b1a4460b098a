//! Manipulates the EDNS0 CLIENT-SUBNET option on outgoing queries:
//! install one, strip it, or truncate the client address it carries to a
//! privacy-preserving prefix.

use super::super::edns::{self, EcsOption};
use async_trait::async_trait;
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::Message;
use std::net::IpAddr;
use std::sync::Arc;

pub const DEFAULT_PREFIX4: u8 = 24;
pub const DEFAULT_PREFIX6: u8 = 56;

#[derive(Debug, Clone)]
pub enum EcsOp {
    /// Install an option for the configured address, or for the querying
    /// client's address when none is configured.
    Add {
        address: Option<IpAddr>,
        prefix4: u8,
        prefix6: u8,
    },
    /// Remove any CLIENT-SUBNET option.
    Delete,
    /// Truncate an existing option's address to the configured prefixes.
    Privacy { prefix4: u8, prefix6: u8 },
}

pub struct EcsModifier {
    id: Arc<str>,
    inner: Arc<dyn DnsResolver>,
    op: EcsOp,
}

impl EcsModifier {
    pub fn new(id: impl Into<Arc<str>>, inner: Arc<dyn DnsResolver>, op: EcsOp) -> Self {
        Self {
            id: id.into(),
            inner,
            op,
        }
    }

    fn apply(&self, query: &mut Message, client: &ClientInfo) {
        match &self.op {
            EcsOp::Add {
                address,
                prefix4,
                prefix6,
            } => {
                let address = address.unwrap_or_else(|| client.source_ip());
                let prefix = match address {
                    IpAddr::V4(_) => *prefix4,
                    IpAddr::V6(_) => *prefix6,
                };
                let ecs = EcsOption::new(address, prefix).truncated(prefix);
                edns::set_ecs(query, &ecs);
            }
            EcsOp::Delete => edns::remove_ecs(query),
            EcsOp::Privacy { prefix4, prefix6 } => {
                if let Some(existing) = EcsOption::from_message(query) {
                    let prefix = match existing.address {
                        IpAddr::V4(_) => *prefix4,
                        IpAddr::V6(_) => *prefix6,
                    };
                    edns::set_ecs(query, &existing.truncated(prefix));
                }
            }
        }
    }
}

#[async_trait]
impl DnsResolver for EcsModifier {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        let mut derived = query.clone();
        self.apply(&mut derived, client);
        self.inner.resolve(&derived, client).await
    }
}
