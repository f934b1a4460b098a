use serde::Deserialize;

/// Definition of a leaf upstream resolver.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolverSpec {
    /// Endpoint URL: udp://, tcp://, tls://, https:// or quic://.
    /// A bare host:port is treated as udp://.
    pub address: String,

    /// Pre-resolved IP for the endpoint hostname, bypassing the bootstrap
    /// resolver for this one upstream.
    #[serde(default)]
    pub bootstrap_address: Option<String>,
}
