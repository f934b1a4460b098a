pub mod https;
pub mod quic;
pub mod tcp;
pub mod tls;
pub mod udp;

use async_trait::async_trait;
use conduit_dns_domain::{ResolveError, UpstreamEndpoint};
use std::time::Duration;

#[derive(Debug)]
pub struct TransportResponse {
    pub bytes: Vec<u8>,
    pub protocol_used: &'static str,
}

/// One request/response exchange of raw DNS wire bytes with a single
/// upstream server.
#[async_trait]
pub trait DnsTransport: Send + Sync {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, ResolveError>;

    fn protocol_name(&self) -> &'static str;
}

pub enum Transport {
    Udp(udp::UdpTransport),
    Tcp(tcp::TcpTransport),
    Tls(tls::TlsTransport),
    Https(https::HttpsTransport),
    Quic(quic::QuicTransport),
}

impl Transport {
    pub async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, ResolveError> {
        match self {
            Self::Udp(t) => DnsTransport::send(t, message_bytes, timeout).await,
            Self::Tcp(t) => DnsTransport::send(t, message_bytes, timeout).await,
            Self::Tls(t) => DnsTransport::send(t, message_bytes, timeout).await,
            Self::Https(t) => DnsTransport::send(t, message_bytes, timeout).await,
            Self::Quic(t) => DnsTransport::send(t, message_bytes, timeout).await,
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        match self {
            Self::Udp(_) => "UDP",
            Self::Tcp(_) => "TCP",
            Self::Tls(_) => "TLS",
            Self::Https(_) => "HTTPS",
            Self::Quic(_) => "QUIC",
        }
    }
}

/// Transport for an endpoint whose hostname, if any, has been resolved.
pub fn create_transport(endpoint: &UpstreamEndpoint) -> Result<Transport, ResolveError> {
    let addr_of = |endpoint: &UpstreamEndpoint| {
        endpoint
            .socket_addr()
            .ok_or_else(|| ResolveError::NoUpstreamAddress {
                host: endpoint.to_string(),
            })
    };

    match endpoint {
        UpstreamEndpoint::Udp { .. } => {
            Ok(Transport::Udp(udp::UdpTransport::new(addr_of(endpoint)?)))
        }
        UpstreamEndpoint::Tcp { .. } => {
            Ok(Transport::Tcp(tcp::TcpTransport::new(addr_of(endpoint)?)))
        }
        UpstreamEndpoint::Tls { server_name, .. } => Ok(Transport::Tls(tls::TlsTransport::new(
            addr_of(endpoint)?,
            server_name.clone(),
        ))),
        UpstreamEndpoint::Https { url, .. } => {
            Ok(Transport::Https(https::HttpsTransport::new(url.clone())))
        }
        UpstreamEndpoint::Quic { server_name, .. } => Ok(Transport::Quic(
            quic::QuicTransport::new(addr_of(endpoint)?, server_name.clone()),
        )),
    }
}
