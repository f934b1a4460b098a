//! Plain DNS over TCP (RFC 1035 §4.2.2): two-byte big-endian length
//! prefix before each message. The framing helpers are shared with the
//! TLS and QUIC transports, which use the same prefix.

use super::{DnsTransport, TransportResponse};
use async_trait::async_trait;
use conduit_dns_domain::ResolveError;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

const MAX_TCP_MESSAGE_SIZE: usize = 65535;

pub struct TcpTransport {
    server_addr: SocketAddr,
}

impl TcpTransport {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self { server_addr }
    }
}

#[async_trait]
impl DnsTransport for TcpTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, ResolveError> {
        let server = self.server_addr.to_string();

        let mut stream = tokio::time::timeout(timeout, TcpStream::connect(self.server_addr))
            .await
            .map_err(|_| ResolveError::UpstreamTimeout {
                server: server.clone(),
            })?
            .map_err(|e| connect_error(&server, e))?;

        tokio::time::timeout(timeout, send_with_length_prefix(&mut stream, message_bytes))
            .await
            .map_err(|_| ResolveError::UpstreamTimeout {
                server: server.clone(),
            })?
            .map_err(|e| e.for_server(&server))?;

        debug!(server = %self.server_addr, message_len = message_bytes.len(), "TCP query sent");

        let response_bytes = tokio::time::timeout(timeout, read_with_length_prefix(&mut stream))
            .await
            .map_err(|_| ResolveError::UpstreamTimeout {
                server: server.clone(),
            })?
            .map_err(|e| e.for_server(&server))?;

        debug!(
            server = %self.server_addr,
            response_len = response_bytes.len(),
            "TCP response received"
        );

        Ok(TransportResponse {
            bytes: response_bytes,
            protocol_used: "TCP",
        })
    }

    fn protocol_name(&self) -> &'static str {
        "TCP"
    }
}

fn connect_error(server: &str, e: std::io::Error) -> ResolveError {
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

/// Framing error without server context; the transport that owns the
/// connection fills the server in.
pub(crate) enum FramingError {
    Io(std::io::Error),
    Oversize(usize),
}

impl FramingError {
    pub(crate) fn for_server(self, server: &str) -> ResolveError {
        match self {
            FramingError::Io(e) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                ResolveError::ConnectionReset {
                    server: server.to_string(),
                }
            }
            FramingError::Io(e) => ResolveError::Io {
                server: server.to_string(),
                reason: e.to_string(),
            },
            FramingError::Oversize(len) => ResolveError::MalformedResponse(format!(
                "length prefix {} exceeds maximum message size {}",
                len, MAX_TCP_MESSAGE_SIZE
            )),
        }
    }
}

pub(crate) async fn send_with_length_prefix<S>(
    stream: &mut S,
    message_bytes: &[u8],
) -> Result<(), FramingError>
where
    S: AsyncWriteExt + Unpin,
{
    let length = message_bytes.len() as u16;
    stream
        .write_all(&length.to_be_bytes())
        .await
        .map_err(FramingError::Io)?;
    stream
        .write_all(message_bytes)
        .await
        .map_err(FramingError::Io)?;
    stream.flush().await.map_err(FramingError::Io)?;
    Ok(())
}

pub(crate) async fn read_with_length_prefix<S>(stream: &mut S) -> Result<Vec<u8>, FramingError>
where
    S: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(FramingError::Io)?;

    let response_len = u16::from_be_bytes(len_buf) as usize;
    if response_len > MAX_TCP_MESSAGE_SIZE {
        return Err(FramingError::Oversize(response_len));
    }

    let mut response = vec![0u8; response_len];
    stream
        .read_exact(&mut response)
        .await
        .map_err(FramingError::Io)?;
    Ok(response)
}
