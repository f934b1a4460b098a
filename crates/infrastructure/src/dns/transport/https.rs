//! DNS-over-HTTPS (RFC 8484): the query goes out as an HTTP POST with
//! `application/dns-message` content type, the response body is the raw
//! DNS wire format answer.

use super::{DnsTransport, TransportResponse};
use async_trait::async_trait;
use conduit_dns_domain::ResolveError;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::debug;

/// Shared HTTP/2 client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(4)
        .http2_prior_knowledge()
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

pub struct HttpsTransport {
    url: Arc<str>,
}

impl HttpsTransport {
    pub fn new(url: Arc<str>) -> Self {
        Self { url }
    }
}

#[async_trait]
impl DnsTransport for HttpsTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, ResolveError> {
        debug!(url = %self.url, message_len = message_bytes.len(), "Sending DoH query");

        let response = tokio::time::timeout(
            timeout,
            SHARED_CLIENT
                .post(self.url.as_ref())
                .header("Content-Type", DNS_MESSAGE_CONTENT_TYPE)
                .header("Accept", DNS_MESSAGE_CONTENT_TYPE)
                .body(message_bytes.to_vec())
                .send(),
        )
        .await
        .map_err(|_| ResolveError::UpstreamTimeout {
            server: self.url.to_string(),
        })?
        .map_err(|e| {
            if e.is_connect() {
                ResolveError::ConnectionRefused {
                    server: self.url.to_string(),
                }
            } else {
                ResolveError::Io {
                    server: self.url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Io {
                server: self.url.to_string(),
                reason: format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("unknown")
                ),
            });
        }

        let response_bytes = tokio::time::timeout(timeout, response.bytes())
            .await
            .map_err(|_| ResolveError::UpstreamTimeout {
                server: self.url.to_string(),
            })?
            .map_err(|e| ResolveError::Io {
                server: self.url.to_string(),
                reason: e.to_string(),
            })?;

        debug!(url = %self.url, response_len = response_bytes.len(), "DoH response received");

        Ok(TransportResponse {
            bytes: response_bytes.to_vec(),
            protocol_used: "HTTPS",
        })
    }

    fn protocol_name(&self) -> &'static str {
        "HTTPS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_creation() {
        let transport = HttpsTransport::new("https://1.1.1.1/dns-query".into());
        assert_eq!(transport.url.as_ref(), "https://1.1.1.1/dns-query");
        assert_eq!(transport.protocol_name(), "HTTPS");
    }
}
