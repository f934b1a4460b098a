//! Name lookup for the proxy's own upstream endpoints.
//!
//! Upstream hostnames (`tls://dns.example:853`) cannot be resolved through
//! the OS stub when this process is the OS's resolver, so a configured
//! bootstrap resolver, itself a pipeline node, performs the lookup. The
//! OS resolver is the fallback when none is configured.

use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RData, RecordType};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

pub struct NameLookup {
    resolver: Arc<dyn DnsResolver>,
}

impl NameLookup {
    pub fn new(resolver: Arc<dyn DnsResolver>) -> Self {
        Self { resolver }
    }

    pub async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        let client = ClientInfo::new(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            "bootstrap-resolver",
        );

        let mut addresses = self.lookup(host, RecordType::A, &client).await?;
        if addresses.is_empty() {
            addresses = self.lookup(host, RecordType::AAAA, &client).await?;
        }
        if addresses.is_empty() {
            return Err(ResolveError::NoUpstreamAddress {
                host: host.to_string(),
            });
        }
        debug!(host, addresses = addresses.len(), "Bootstrap lookup completed");
        Ok(addresses)
    }

    async fn lookup(
        &self,
        host: &str,
        record_type: RecordType,
        client: &ClientInfo,
    ) -> Result<Vec<IpAddr>, ResolveError> {
        let name = Name::from_str(host)
            .map_err(|e| ResolveError::MalformedQuery(format!("invalid host '{}': {}", host, e)))?;

        let mut query = Message::new();
        query.set_id(fastrand::u16(..));
        query.set_message_type(MessageType::Query);
        query.set_op_code(OpCode::Query);
        query.set_recursion_desired(true);
        query.add_query(Query::query(name, record_type));

        let response = self.resolver.resolve(&query, client).await?;

        let addresses = response
            .answers()
            .iter()
            .filter_map(|record| match record.data() {
                RData::A(a) => Some(IpAddr::V4(a.0)),
                RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
                _ => None,
            })
            .collect();
        Ok(addresses)
    }
}

/// Resolve `host` through the bootstrap resolver when one is installed,
/// through the OS otherwise.
pub async fn resolve_host(
    host: &str,
    bootstrap: Option<&NameLookup>,
) -> Result<Vec<IpAddr>, ResolveError> {
    match bootstrap {
        Some(lookup) => lookup.lookup_ip(host).await,
        None => {
            let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
                .await
                .map_err(|e| ResolveError::NoUpstreamAddress {
                    host: format!("{}: {}", host, e),
                })?
                .map(|sa| sa.ip())
                .collect();
            if addrs.is_empty() {
                return Err(ResolveError::NoUpstreamAddress {
                    host: host.to_string(),
                });
            }
            Ok(addrs)
        }
    }
}
