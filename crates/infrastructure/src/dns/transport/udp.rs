//! Plain DNS over UDP (RFC 1035 §4.2.1). Messages are sent unframed;
//! responses with the TC bit set are the caller's cue to retry over TCP.

use super::{DnsTransport, TransportResponse};
use async_trait::async_trait;
use conduit_dns_domain::ResolveError;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Maximum UDP DNS response size with EDNS(0).
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

pub struct UdpTransport {
    server_addr: SocketAddr,
}

impl UdpTransport {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self { server_addr }
    }
}

#[async_trait]
impl DnsTransport for UdpTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, ResolveError> {
        let bind_addr: SocketAddr = if self.server_addr.is_ipv4() {
            "0.0.0.0:0".parse().expect("valid wildcard address")
        } else {
            "[::]:0".parse().expect("valid wildcard address")
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| ResolveError::Io {
                server: self.server_addr.to_string(),
                reason: format!("failed to bind UDP socket: {}", e),
            })?;

        tokio::time::timeout(timeout, socket.send_to(message_bytes, self.server_addr))
            .await
            .map_err(|_| ResolveError::UpstreamTimeout {
                server: self.server_addr.to_string(),
            })?
            .map_err(|e| io_error(self.server_addr, e))?;

        let mut recv_buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        let (bytes_received, from_addr) =
            tokio::time::timeout(timeout, socket.recv_from(&mut recv_buf))
                .await
                .map_err(|_| ResolveError::UpstreamTimeout {
                    server: self.server_addr.to_string(),
                })?
                .map_err(|e| io_error(self.server_addr, e))?;

        if from_addr.ip() != self.server_addr.ip() {
            warn!(
                expected = %self.server_addr,
                received_from = %from_addr,
                "UDP response from unexpected source"
            );
        }

        recv_buf.truncate(bytes_received);
        debug!(server = %self.server_addr, bytes_received, "UDP response received");

        Ok(TransportResponse {
            bytes: recv_buf,
            protocol_used: "UDP",
        })
    }

    fn protocol_name(&self) -> &'static str {
        "UDP"
    }
}

fn io_error(server: SocketAddr, e: std::io::Error) -> ResolveError {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => ResolveError::ConnectionRefused {
            server: server.to_string(),
        },
        std::io::ErrorKind::ConnectionReset => ResolveError::ConnectionReset {
            server: server.to_string(),
        },
        _ => ResolveError::Io {
            server: server.to_string(),
            reason: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_creation() {
        let addr: SocketAddr = "9.9.9.9:53".parse().unwrap();
        let transport = UdpTransport::new(addr);
        assert_eq!(transport.server_addr, addr);
        assert_eq!(transport.protocol_name(), "UDP");
    }

    #[test]
    fn transport_ipv6() {
        let addr: SocketAddr = "[2620:fe::fe]:53".parse().unwrap();
        let transport = UdpTransport::new(addr);
        assert_eq!(transport.server_addr, addr);
    }
}
