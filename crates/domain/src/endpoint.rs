use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

/// An upstream server address that may or may not already be an IP.
///
/// Unresolved hostnames are looked up at connect time through the
/// bootstrap resolver (or the OS resolver when none is configured).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpstreamAddr {
    Resolved(SocketAddr),
    Unresolved { hostname: Arc<str>, port: u16 },
}

impl UpstreamAddr {
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            UpstreamAddr::Resolved(addr) => Some(*addr),
            UpstreamAddr::Unresolved { .. } => None,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            UpstreamAddr::Resolved(addr) => addr.port(),
            UpstreamAddr::Unresolved { port, .. } => *port,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, UpstreamAddr::Unresolved { .. })
    }

    /// Returns (hostname, port) if this address still needs resolution.
    pub fn unresolved_parts(&self) -> Option<(&str, u16)> {
        match self {
            UpstreamAddr::Unresolved { hostname, port } => Some((hostname, *port)),
            UpstreamAddr::Resolved(_) => None,
        }
    }
}

impl fmt::Display for UpstreamAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamAddr::Resolved(addr) => write!(f, "{}", addr),
            UpstreamAddr::Unresolved { hostname, port } => write!(f, "{}:{}", hostname, port),
        }
    }
}

/// A parsed upstream endpoint, one variant per wire protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpstreamEndpoint {
    Udp {
        addr: UpstreamAddr,
    },
    Tcp {
        addr: UpstreamAddr,
    },
    Tls {
        addr: UpstreamAddr,
        server_name: Arc<str>,
    },
    Https {
        url: Arc<str>,
        server_name: Arc<str>,
    },
    Quic {
        addr: UpstreamAddr,
        server_name: Arc<str>,
    },
}

const PLAIN_DNS_PORT: u16 = 53;
const ENCRYPTED_DNS_PORT: u16 = 853;

impl UpstreamEndpoint {
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            UpstreamEndpoint::Udp { addr }
            | UpstreamEndpoint::Tcp { addr }
            | UpstreamEndpoint::Tls { addr, .. }
            | UpstreamEndpoint::Quic { addr, .. } => addr.socket_addr(),
            UpstreamEndpoint::Https { .. } => None,
        }
    }

    pub fn server_name(&self) -> Option<&str> {
        match self {
            UpstreamEndpoint::Tls { server_name, .. }
            | UpstreamEndpoint::Https { server_name, .. }
            | UpstreamEndpoint::Quic { server_name, .. } => Some(server_name),
            _ => None,
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        match self {
            UpstreamEndpoint::Udp { .. } => "UDP",
            UpstreamEndpoint::Tcp { .. } => "TCP",
            UpstreamEndpoint::Tls { .. } => "TLS",
            UpstreamEndpoint::Https { .. } => "HTTPS",
            UpstreamEndpoint::Quic { .. } => "QUIC",
        }
    }

    /// True when the endpoint carries a hostname that must be resolved
    /// before a connection can be made.
    pub fn needs_resolution(&self) -> bool {
        match self {
            UpstreamEndpoint::Udp { addr }
            | UpstreamEndpoint::Tcp { addr }
            | UpstreamEndpoint::Tls { addr, .. }
            | UpstreamEndpoint::Quic { addr, .. } => addr.is_unresolved(),
            UpstreamEndpoint::Https { .. } => false,
        }
    }

    pub fn unresolved_parts(&self) -> Option<(&str, u16)> {
        match self {
            UpstreamEndpoint::Udp { addr }
            | UpstreamEndpoint::Tcp { addr }
            | UpstreamEndpoint::Tls { addr, .. }
            | UpstreamEndpoint::Quic { addr, .. } => addr.unresolved_parts(),
            UpstreamEndpoint::Https { .. } => None,
        }
    }

    /// Copy of this endpoint with the hostname replaced by a resolved address.
    pub fn with_resolved_addr(&self, resolved: SocketAddr) -> Self {
        match self {
            UpstreamEndpoint::Udp { .. } => UpstreamEndpoint::Udp {
                addr: UpstreamAddr::Resolved(resolved),
            },
            UpstreamEndpoint::Tcp { .. } => UpstreamEndpoint::Tcp {
                addr: UpstreamAddr::Resolved(resolved),
            },
            UpstreamEndpoint::Tls { server_name, .. } => UpstreamEndpoint::Tls {
                addr: UpstreamAddr::Resolved(resolved),
                server_name: server_name.clone(),
            },
            UpstreamEndpoint::Quic { server_name, .. } => UpstreamEndpoint::Quic {
                addr: UpstreamAddr::Resolved(resolved),
                server_name: server_name.clone(),
            },
            UpstreamEndpoint::Https { .. } => self.clone(),
        }
    }
}

fn split_host_port(s: &str) -> Option<(&str, Option<u16>)> {
    if s.is_empty() {
        return None;
    }
    if s.starts_with('[') {
        // Bracketed IPv6 literal, [::1]:853
        let end = s.find(']')?;
        let host = &s[1..end];
        let rest = &s[end + 1..];
        if rest.is_empty() {
            return Some((host, None));
        }
        let port = rest.strip_prefix(':')?.parse::<u16>().ok()?;
        return Some((host, Some(port)));
    }
    match s.rsplit_once(':') {
        // A second ':' means an unbracketed IPv6 address without a port.
        Some((host, port_str)) if !host.contains(':') => {
            let port = port_str.parse::<u16>().ok()?;
            Some((host, Some(port)))
        }
        _ => Some((s, None)),
    }
}

fn parse_upstream_addr(addr_str: &str, default_port: u16) -> Result<UpstreamAddr, String> {
    if let Ok(addr) = addr_str.parse::<SocketAddr>() {
        return Ok(UpstreamAddr::Resolved(addr));
    }
    let (host, port) = split_host_port(addr_str)
        .ok_or_else(|| format!("invalid address '{}'", addr_str))?;
    let port = port.unwrap_or(default_port);
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        return Ok(UpstreamAddr::Resolved(SocketAddr::new(ip, port)));
    }
    Ok(UpstreamAddr::Unresolved {
        hostname: host.into(),
        port,
    })
}

/// Hostname part of an address string, used as the TLS server name when
/// none is given explicitly.
fn host_of(addr_str: &str) -> Result<Arc<str>, String> {
    split_host_port(addr_str)
        .map(|(host, _)| Arc::from(host))
        .ok_or_else(|| format!("invalid address '{}'", addr_str))
}

impl FromStr for UpstreamEndpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("udp://") {
            let addr = parse_upstream_addr(rest, PLAIN_DNS_PORT)?;
            return Ok(UpstreamEndpoint::Udp { addr });
        }
        if let Some(rest) = s.strip_prefix("tcp://") {
            let addr = parse_upstream_addr(rest, PLAIN_DNS_PORT)?;
            return Ok(UpstreamEndpoint::Tcp { addr });
        }
        if let Some(rest) = s.strip_prefix("tls://") {
            let addr = parse_upstream_addr(rest, ENCRYPTED_DNS_PORT)?;
            return Ok(UpstreamEndpoint::Tls {
                addr,
                server_name: host_of(rest)?,
            });
        }
        if let Some(rest) = s
            .strip_prefix("quic://")
            .or_else(|| s.strip_prefix("doq://"))
        {
            let addr = parse_upstream_addr(rest, ENCRYPTED_DNS_PORT)?;
            return Ok(UpstreamEndpoint::Quic {
                addr,
                server_name: host_of(rest)?,
            });
        }
        if let Some(rest) = s.strip_prefix("https://") {
            let server_name = rest
                .split('/')
                .next()
                .filter(|h| !h.is_empty())
                .ok_or_else(|| format!("invalid HTTPS URL '{}'", s))?;
            let server_name = split_host_port(server_name)
                .map(|(host, _)| Arc::from(host))
                .ok_or_else(|| format!("invalid HTTPS URL '{}'", s))?;
            return Ok(UpstreamEndpoint::Https {
                url: s.into(),
                server_name,
            });
        }
        // Bare host:port defaults to plain UDP.
        if !s.contains("://") {
            let addr = parse_upstream_addr(s, PLAIN_DNS_PORT)?;
            return Ok(UpstreamEndpoint::Udp { addr });
        }
        Err(format!(
            "invalid upstream endpoint '{}': expected udp://, tcp://, tls://, https:// or quic://",
            s
        ))
    }
}

impl fmt::Display for UpstreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamEndpoint::Udp { addr } => write!(f, "udp://{}", addr),
            UpstreamEndpoint::Tcp { addr } => write!(f, "tcp://{}", addr),
            UpstreamEndpoint::Tls { addr, .. } => write!(f, "tls://{}", addr),
            UpstreamEndpoint::Https { url, .. } => write!(f, "{}", url),
            UpstreamEndpoint::Quic { addr, .. } => write!(f, "quic://{}", addr),
        }
    }
}
