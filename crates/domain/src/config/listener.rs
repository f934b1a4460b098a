use serde::Deserialize;

/// Definition of a listener: where to accept queries and which root
/// resolver serves them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListenerSpec {
    /// Bind address, host:port.
    pub address: String,

    /// Wire protocol, `udp` or `tcp`.
    pub protocol: String,

    /// Root resolver id queries are handed to.
    #[serde(default)]
    pub resolver: Option<String>,

    /// Client CIDR allow-list; empty means allow everyone. Queries from
    /// outside are answered with REFUSED.
    #[serde(default)]
    pub allowed_net: Vec<String>,
}
