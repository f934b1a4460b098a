//! DNS-over-TLS (RFC 7858). TCP framing inside a TLS session. Idle
//! sessions are pooled per (address, server name) so consecutive queries
//! skip the handshake.

use super::tcp::{read_with_length_prefix, send_with_length_prefix};
use super::{DnsTransport, TransportResponse};
use async_trait::async_trait;
use conduit_dns_domain::ResolveError;
use dashmap::DashMap;
use rustls::pki_types::ServerName;
use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::debug;

const MAX_IDLE_PER_HOST: usize = 2;

static SHARED_TLS_CONFIG: LazyLock<Arc<rustls::ClientConfig>> = LazyLock::new(|| {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
});

type TlsConnection = TlsStream<TcpStream>;
type PoolKey = (SocketAddr, Arc<str>);

static TLS_POOL: LazyLock<DashMap<PoolKey, Vec<TlsConnection>>> = LazyLock::new(DashMap::new);

pub struct TlsTransport {
    server_addr: SocketAddr,
    server_name: Arc<str>,
}

impl TlsTransport {
    pub fn new(server_addr: SocketAddr, server_name: Arc<str>) -> Self {
        Self {
            server_addr,
            server_name,
        }
    }

    fn take_pooled(&self) -> Option<TlsConnection> {
        let key = (self.server_addr, self.server_name.clone());
        let mut entry = TLS_POOL.get_mut(&key)?;
        entry.pop()
    }

    fn return_to_pool(&self, stream: TlsConnection) {
        let key = (self.server_addr, self.server_name.clone());
        let mut entry = TLS_POOL.entry(key).or_default();
        if entry.len() < MAX_IDLE_PER_HOST {
            entry.push(stream);
        }
    }

    async fn connect_new(&self, timeout: Duration) -> Result<TlsConnection, ResolveError> {
        let connector = tokio_rustls::TlsConnector::from(SHARED_TLS_CONFIG.clone());

        let server_name =
            ServerName::try_from(self.server_name.to_string()).map_err(|e| {
                ResolveError::TlsHandshake {
                    server: self.server_addr.to_string(),
                    reason: format!("invalid server name '{}': {}", self.server_name, e),
                }
            })?;

        let tcp_stream = tokio::time::timeout(timeout, TcpStream::connect(self.server_addr))
            .await
            .map_err(|_| ResolveError::UpstreamTimeout {
                server: self.server_addr.to_string(),
            })?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::ConnectionRefused => ResolveError::ConnectionRefused {
                    server: self.server_addr.to_string(),
                },
                _ => ResolveError::Io {
                    server: self.server_addr.to_string(),
                    reason: e.to_string(),
                },
            })?;

        let tls_stream = tokio::time::timeout(timeout, connector.connect(server_name, tcp_stream))
            .await
            .map_err(|_| ResolveError::UpstreamTimeout {
                server: self.server_addr.to_string(),
            })?
            .map_err(|e| ResolveError::TlsHandshake {
                server: self.server_addr.to_string(),
                reason: e.to_string(),
            })?;

        debug!(server = %self.server_addr, server_name = %self.server_name, "TLS connection established");
        Ok(tls_stream)
    }

    async fn send_on_stream(
        &self,
        stream: &mut TlsConnection,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, ResolveError> {
        let server = self.server_addr.to_string();

        tokio::time::timeout(timeout, send_with_length_prefix(stream, message_bytes))
            .await
            .map_err(|_| ResolveError::UpstreamTimeout {
                server: server.clone(),
            })?
            .map_err(|e| e.for_server(&server))?;

        tokio::time::timeout(timeout, read_with_length_prefix(stream))
            .await
            .map_err(|_| ResolveError::UpstreamTimeout {
                server: server.clone(),
            })?
            .map_err(|e| e.for_server(&server))
    }
}

#[async_trait]
impl DnsTransport for TlsTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, ResolveError> {
        if let Some(mut stream) = self.take_pooled() {
            match self
                .send_on_stream(&mut stream, message_bytes, timeout)
                .await
            {
                Ok(response_bytes) => {
                    debug!(server = %self.server_addr, "TLS query via pooled connection");
                    self.return_to_pool(stream);
                    return Ok(TransportResponse {
                        bytes: response_bytes,
                        protocol_used: "TLS",
                    });
                }
                Err(_) => {
                    debug!(server = %self.server_addr, "Pooled TLS connection stale, reconnecting");
                }
            }
        }

        let mut stream = self.connect_new(timeout).await?;
        let response_bytes = self
            .send_on_stream(&mut stream, message_bytes, timeout)
            .await?;

        debug!(
            server = %self.server_addr,
            response_len = response_bytes.len(),
            "TLS response received"
        );

        self.return_to_pool(stream);

        Ok(TransportResponse {
            bytes: response_bytes,
            protocol_used: "TLS",
        })
    }

    fn protocol_name(&self) -> &'static str {
        "TLS"
    }
}
