//! Leaf resolver: forwards queries to one upstream server over the
//! endpoint's transport.
//!
//! The outgoing message carries a fresh random wire id (0 for QUIC, per
//! RFC 9250); the client's id is restored on the parsed response. A UDP
//! response with the TC bit set is retried once over TCP before the
//! truncation is reported as a transient error.

use super::super::bootstrap::NameLookup;
use super::super::message;
use super::super::transport::{self, tcp::TcpTransport, Transport};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError, UpstreamEndpoint};
use hickory_proto::op::Message;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct UpstreamResolver {
    id: Arc<str>,
    endpoint: UpstreamEndpoint,
    bootstrap: Option<Arc<NameLookup>>,
    timeout: Duration,
    /// Cached hostname resolution; cleared after a transport failure so
    /// the next query re-resolves.
    resolved: ArcSwapOption<SocketAddr>,
    /// Set when `bootstrap-address` pinned the address in config; pinned
    /// addresses survive transport failures.
    pinned: bool,
}

impl UpstreamResolver {
    pub fn new(id: impl Into<Arc<str>>, endpoint: UpstreamEndpoint) -> Self {
        Self {
            id: id.into(),
            endpoint,
            bootstrap: None,
            timeout: DEFAULT_QUERY_TIMEOUT,
            resolved: ArcSwapOption::empty(),
            pinned: false,
        }
    }

    pub fn with_bootstrap(mut self, bootstrap: Option<Arc<NameLookup>>) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Pin the endpoint hostname to a known address, bypassing lookups.
    pub fn with_pinned_addr(mut self, addr: SocketAddr) -> Self {
        self.resolved.store(Some(Arc::new(addr)));
        self.pinned = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn connected_endpoint(&self) -> Result<UpstreamEndpoint, ResolveError> {
        let (host, port) = match self.endpoint.unresolved_parts() {
            Some(parts) => parts,
            None => return Ok(self.endpoint.clone()),
        };
        if let Some(addr) = self.resolved.load_full() {
            return Ok(self.endpoint.with_resolved_addr(*addr));
        }
        let ip = super::super::bootstrap::resolve_host(host, self.bootstrap.as_deref())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ResolveError::NoUpstreamAddress {
                host: host.to_string(),
            })?;
        let addr = SocketAddr::new(ip, port);
        debug!(resolver = %self.id, host, %addr, "Upstream hostname resolved");
        self.resolved.store(Some(Arc::new(addr)));
        Ok(self.endpoint.with_resolved_addr(addr))
    }

    fn wire_id(&self) -> u16 {
        // RFC 9250 §4.2.1: DoQ messages use a fixed id of 0.
        if matches!(self.endpoint, UpstreamEndpoint::Quic { .. }) {
            0
        } else {
            fastrand::u16(..)
        }
    }

    async fn exchange(
        &self,
        endpoint: &UpstreamEndpoint,
        wire_bytes: &[u8],
        wire_id: u16,
    ) -> Result<Message, ResolveError> {
        let transport = transport::create_transport(endpoint)?;
        let response = transport.send(wire_bytes, self.timeout).await?;
        let mut parsed = message::parse_message(&response.bytes)?;

        // Recover from UDP truncation by retrying the same bytes over TCP.
        if parsed.truncated() {
            if let UpstreamEndpoint::Udp { .. } = endpoint {
                let addr =
                    endpoint
                        .socket_addr()
                        .ok_or_else(|| ResolveError::NoUpstreamAddress {
                            host: endpoint.to_string(),
                        })?;
                debug!(resolver = %self.id, server = %addr, "Truncated UDP response, retrying over TCP");
                let tcp = Transport::Tcp(TcpTransport::new(addr));
                let response = tcp.send(wire_bytes, self.timeout).await?;
                parsed = message::parse_message(&response.bytes)?;
            }
        }
        if parsed.truncated() {
            return Err(ResolveError::Truncated {
                server: endpoint.to_string(),
            });
        }

        if parsed.id() != wire_id {
            return Err(ResolveError::IdMismatch {
                want: wire_id,
                got: parsed.id(),
            });
        }
        Ok(parsed)
    }
}

#[async_trait]
impl DnsResolver for UpstreamResolver {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(
        &self,
        query: &Message,
        _client: &ClientInfo,
    ) -> Result<Message, ResolveError> {
        message::question(query)?;

        let wire_id = self.wire_id();
        let mut outbound = query.clone();
        outbound.set_id(wire_id);
        let wire_bytes = message::serialize_message(&outbound)?;

        let endpoint = self.connected_endpoint().await?;

        let mut response = match self.exchange(&endpoint, &wire_bytes, wire_id).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_transient() && self.endpoint.needs_resolution() && !self.pinned {
                    // A stale address may be the cause; drop it.
                    self.resolved.store(None);
                }
                warn!(resolver = %self.id, server = %endpoint, error = %e, "Upstream exchange failed");
                return Err(e);
            }
        };

        response.set_id(query.id());
        Ok(response)
    }
}
