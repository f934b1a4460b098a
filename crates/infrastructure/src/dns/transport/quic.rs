//! DNS-over-QUIC (RFC 9250): one bidirectional stream per query, TCP-style
//! two-byte length prefix, stream finished after the query is written.
//! Connections are pooled per (address, server name); RFC 9250 requires
//! the wire message id be 0, which the upstream client takes care of.

use super::tcp::{read_with_length_prefix, send_with_length_prefix};
use super::{DnsTransport, TransportResponse};
use async_trait::async_trait;
use conduit_dns_domain::ResolveError;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::debug;

type PoolKey = (SocketAddr, Arc<str>);

static SHARED_QUIC_CLIENT_CONFIG: LazyLock<quinn::ClientConfig> = LazyLock::new(|| {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    let mut tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    tls_config.alpn_protocols = vec![b"doq".to_vec()];
    let quic_config = quinn::crypto::rustls::QuicClientConfig::try_from(Arc::new(tls_config))
        .expect("valid QUIC TLS config");
    quinn::ClientConfig::new(Arc::new(quic_config))
});

static QUIC_ENDPOINT: LazyLock<quinn::Endpoint> = LazyLock::new(|| {
    let mut endpoint = quinn::Endpoint::client("0.0.0.0:0".parse().expect("wildcard address"))
        .expect("QUIC client endpoint");
    endpoint.set_default_client_config(SHARED_QUIC_CLIENT_CONFIG.clone());
    endpoint
});

static QUIC_POOL: LazyLock<DashMap<PoolKey, quinn::Connection>> = LazyLock::new(DashMap::new);

pub struct QuicTransport {
    server_addr: SocketAddr,
    server_name: Arc<str>,
}

impl QuicTransport {
    pub fn new(server_addr: SocketAddr, server_name: Arc<str>) -> Self {
        Self {
            server_addr,
            server_name,
        }
    }

    async fn get_or_connect(&self, timeout: Duration) -> Result<quinn::Connection, ResolveError> {
        let key = (self.server_addr, self.server_name.clone());
        if let Some(conn) = QUIC_POOL.get(&key) {
            if conn.close_reason().is_none() {
                return Ok(conn.clone());
            }
            drop(conn);
            QUIC_POOL.remove(&key);
        }
        let conn = self.connect_new(timeout).await?;
        QUIC_POOL.insert(key, conn.clone());
        Ok(conn)
    }

    async fn connect_new(&self, timeout: Duration) -> Result<quinn::Connection, ResolveError> {
        let connecting = QUIC_ENDPOINT
            .connect(self.server_addr, self.server_name.as_ref())
            .map_err(|e| ResolveError::Io {
                server: self.server_addr.to_string(),
                reason: format!("failed to initiate QUIC connection: {}", e),
            })?;

        tokio::time::timeout(timeout, connecting)
            .await
            .map_err(|_| ResolveError::UpstreamTimeout {
                server: self.server_addr.to_string(),
            })?
            .map_err(|e| ResolveError::TlsHandshake {
                server: format!("{} ({})", self.server_name, self.server_addr),
                reason: e.to_string(),
            })
    }

    async fn send_on_stream(
        conn: &quinn::Connection,
        message_bytes: &[u8],
        timeout: Duration,
        server_addr: SocketAddr,
    ) -> Result<Vec<u8>, ResolveError> {
        let server = server_addr.to_string();

        let (mut send_stream, mut recv_stream) = tokio::time::timeout(timeout, conn.open_bi())
            .await
            .map_err(|_| ResolveError::UpstreamTimeout {
                server: server.clone(),
            })?
            .map_err(|e| ResolveError::QuicStreamReset {
                server: server.clone(),
                reason: e.to_string(),
            })?;

        tokio::time::timeout(
            timeout,
            send_with_length_prefix(&mut send_stream, message_bytes),
        )
        .await
        .map_err(|_| ResolveError::UpstreamTimeout {
            server: server.clone(),
        })?
        .map_err(|e| e.for_server(&server))?;

        send_stream
            .finish()
            .map_err(|e| ResolveError::QuicStreamReset {
                server: server.clone(),
                reason: e.to_string(),
            })?;

        tokio::time::timeout(timeout, read_with_length_prefix(&mut recv_stream))
            .await
            .map_err(|_| ResolveError::UpstreamTimeout {
                server: server.clone(),
            })?
            .map_err(|e| e.for_server(&server))
    }
}

#[async_trait]
impl DnsTransport for QuicTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, ResolveError> {
        let conn = self.get_or_connect(timeout).await?;

        match Self::send_on_stream(&conn, message_bytes, timeout, self.server_addr).await {
            Ok(response_bytes) => {
                debug!(server = %self.server_addr, "QUIC query via pooled connection");
                return Ok(TransportResponse {
                    bytes: response_bytes,
                    protocol_used: "QUIC",
                });
            }
            Err(_) => {
                QUIC_POOL.remove(&(self.server_addr, self.server_name.clone()));
                debug!(server = %self.server_addr, "QUIC connection stale, reconnecting");
            }
        }

        let fresh_conn = self.connect_new(timeout).await?;
        QUIC_POOL.insert(
            (self.server_addr, self.server_name.clone()),
            fresh_conn.clone(),
        );

        let response_bytes =
            Self::send_on_stream(&fresh_conn, message_bytes, timeout, self.server_addr).await?;

        debug!(
            server = %self.server_addr,
            response_len = response_bytes.len(),
            "QUIC response received"
        );

        Ok(TransportResponse {
            bytes: response_bytes,
            protocol_used: "QUIC",
        })
    }

    fn protocol_name(&self) -> &'static str {
        "QUIC"
    }
}
