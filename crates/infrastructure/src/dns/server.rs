//! Plain UDP and TCP listeners: the graph's roots. Each listener frames
//! and deframes wire messages, enforces its client allow-list and hands
//! `(query, client)` to its root resolver. Failures are logged and the
//! packet dropped (UDP) or the connection closed (TCP); a `drop` leaf's
//! verdict means no reply at all.

use super::message;
use super::transport::tcp::{read_with_length_prefix, send_with_length_prefix};
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, Config, ConfigError, ResolveError};
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use ipnetwork::IpNetwork;
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tracing::{debug, info, warn};

const QUERY_TIMEOUT: Duration = Duration::from_secs(10);
const TCP_IDLE_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_UDP_PAYLOAD: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerProtocol {
    Udp,
    Tcp,
}

pub struct DnsListener {
    id: Arc<str>,
    address: SocketAddr,
    protocol: ListenerProtocol,
    resolver: Arc<dyn DnsResolver>,
    allowed_net: Vec<IpNetwork>,
}

impl DnsListener {
    pub fn new(
        id: impl Into<Arc<str>>,
        address: SocketAddr,
        protocol: ListenerProtocol,
        resolver: Arc<dyn DnsResolver>,
        allowed_net: Vec<IpNetwork>,
    ) -> Self {
        Self {
            id: id.into(),
            address,
            protocol,
            resolver,
            allowed_net,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Serve until an I/O error tears the listener down. The supervisor
    /// in the binary restarts it after a backoff.
    pub async fn run(&self) -> std::io::Result<()> {
        match self.protocol {
            ListenerProtocol::Udp => self.run_udp().await,
            ListenerProtocol::Tcp => self.run_tcp().await,
        }
    }

    fn client_allowed(&self, addr: SocketAddr) -> bool {
        self.allowed_net.is_empty() || self.allowed_net.iter().any(|net| net.contains(addr.ip()))
    }

    async fn run_udp(&self) -> std::io::Result<()> {
        let socket = Arc::new(create_udp_socket(self.address)?);
        info!(listener = %self.id, address = %self.address, "UDP listener ready");

        let mut recv_buf = [0u8; MAX_UDP_PAYLOAD];
        loop {
            let (n, from) = socket.recv_from(&mut recv_buf).await?;
            let query_bytes = recv_buf[..n].to_vec();
            let socket = socket.clone();
            let resolver = self.resolver.clone();
            let client = ClientInfo::new(from, self.id.clone());
            let allowed = self.client_allowed(from);

            tokio::spawn(async move {
                if let Some(response) =
                    serve_query(&query_bytes, resolver, client, allowed).await
                {
                    let response = clamp_udp_response(response);
                    let _ = socket.send_to(&response, from).await;
                }
            });
        }
    }

    async fn run_tcp(&self) -> std::io::Result<()> {
        let listener = create_tcp_listener(self.address)?;
        info!(listener = %self.id, address = %self.address, "TCP listener ready");

        loop {
            let (stream, from) = listener.accept().await?;
            let resolver = self.resolver.clone();
            let client = ClientInfo::new(from, self.id.clone());
            let allowed = self.client_allowed(from);

            tokio::spawn(async move {
                if let Err(e) = serve_tcp_connection(stream, resolver, client, allowed).await {
                    debug!(client = %from, error = %e, "TCP connection closed");
                }
            });
        }
    }
}

async fn serve_tcp_connection(
    mut stream: TcpStream,
    resolver: Arc<dyn DnsResolver>,
    client: ClientInfo,
    allowed: bool,
) -> std::io::Result<()> {
    loop {
        let query_bytes =
            match tokio::time::timeout(TCP_IDLE_TIMEOUT, read_with_length_prefix(&mut stream))
                .await
            {
                Ok(Ok(bytes)) => bytes,
                // Idle timeout or broken framing both end the connection.
                Ok(Err(_)) | Err(_) => return Ok(()),
            };

        let Some(response) =
            serve_query(&query_bytes, resolver.clone(), client.clone(), allowed).await
        else {
            continue;
        };

        if send_with_length_prefix(&mut stream, &response).await.is_err() {
            return Ok(());
        }
    }
}

/// One query through the pipeline. `None` means "send nothing back".
async fn serve_query(
    query_bytes: &[u8],
    resolver: Arc<dyn DnsResolver>,
    client: ClientInfo,
    allowed: bool,
) -> Option<Vec<u8>> {
    let query = match message::parse_query(query_bytes) {
        Ok(query) => query,
        Err(e) => {
            debug!(client = %client.source_addr, error = %e, "Malformed query");
            return formerr_for_raw(query_bytes);
        }
    };

    if !allowed {
        debug!(listener = %client.listener_id, client = %client.source_addr, "Client not in allowed-net");
        let refused = message::reply_with_rcode(&query, ResponseCode::Refused);
        return message::serialize_message(&refused).ok();
    }

    // The pipeline only speaks ordinary queries; UPDATE, NOTIFY and
    // friends must not reach a cache or an upstream.
    if query.op_code() != OpCode::Query {
        debug!(client = %client.source_addr, op_code = ?query.op_code(), "Unsupported opcode");
        let notimp = message::reply_with_rcode(&query, ResponseCode::NotImp);
        return message::serialize_message(&notimp).ok();
    }

    let response =
        match tokio::time::timeout(QUERY_TIMEOUT, resolver.resolve(&query, &client)).await {
            Ok(Ok(response)) => response,
            Ok(Err(ResolveError::Dropped)) => {
                debug!(client = %client.source_addr, "Query dropped by policy");
                return None;
            }
            Ok(Err(e)) => {
                warn!(client = %client.source_addr, error = %e, "Query failed");
                return None;
            }
            Err(_) => {
                warn!(client = %client.source_addr, "Query deadline exceeded");
                return None;
            }
        };

    message::serialize_message(&response).ok()
}

/// FORMERR reply carrying the raw query's id, when the header is intact
/// enough to read one.
fn formerr_for_raw(query_bytes: &[u8]) -> Option<Vec<u8>> {
    if query_bytes.len() < 2 {
        return None;
    }
    let id = u16::from_be_bytes([query_bytes[0], query_bytes[1]]);
    let mut response = Message::new();
    response.set_id(id);
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.set_response_code(ResponseCode::FormErr);
    message::serialize_message(&response).ok()
}

/// Oversized UDP responses are replaced by an empty truncated reply so
/// the client retries over TCP.
fn clamp_udp_response(response: Vec<u8>) -> Vec<u8> {
    if response.len() <= MAX_UDP_PAYLOAD {
        return response;
    }
    match message::parse_message(&response) {
        Ok(full) => {
            let mut truncated = message::reply_with_rcode(&full, full.response_code());
            truncated.set_truncated(true);
            message::serialize_message(&truncated).unwrap_or(response)
        }
        Err(_) => response,
    }
}

fn create_udp_socket(socket_addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let domain = if socket_addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if socket_addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_recv_buffer_size(8 * 1024 * 1024)?;
    socket.set_send_buffer_size(4 * 1024 * 1024)?;
    socket.bind(&socket_addr.into())?;
    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

fn create_tcp_listener(socket_addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if socket_addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    if socket_addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(1024)?;
    socket.set_nonblocking(true)?;
    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

/// Validate listener definitions against the finished resolver map and
/// construct them. Listeners come last; they may point at any node.
pub fn build_listeners(
    config: &Config,
    resolvers: &HashMap<String, Arc<dyn DnsResolver>>,
) -> Result<Vec<DnsListener>, ConfigError> {
    let mut listeners = Vec::with_capacity(config.listeners.len());

    for (id, spec) in &config.listeners {
        let protocol = match spec.protocol.as_str() {
            "udp" => ListenerProtocol::Udp,
            "tcp" => ListenerProtocol::Tcp,
            other => {
                return Err(ConfigError::Listener {
                    id: id.clone(),
                    reason: format!("unsupported protocol '{}'", other),
                })
            }
        };

        let address: SocketAddr = spec.address.parse().map_err(|e| ConfigError::Listener {
            id: id.clone(),
            reason: format!("invalid address '{}': {}", spec.address, e),
        })?;

        let resolver_id = spec.resolver.as_deref().ok_or_else(|| ConfigError::Listener {
            id: id.clone(),
            reason: "no resolver configured".to_string(),
        })?;
        let resolver =
            resolvers
                .get(resolver_id)
                .cloned()
                .ok_or_else(|| ConfigError::UnresolvedDependency {
                    id: id.clone(),
                    reference: resolver_id.to_string(),
                })?;

        let mut allowed_net = Vec::with_capacity(spec.allowed_net.len());
        for cidr in &spec.allowed_net {
            let network: IpNetwork = cidr.parse().map_err(|e| ConfigError::InvalidCidr {
                value: cidr.clone(),
                reason: format!("{}", e),
            })?;
            allowed_net.push(network);
        }

        listeners.push(DnsListener::new(
            id.as_str(),
            address,
            protocol,
            resolver,
            allowed_net,
        ));
    }

    Ok(listeners)
}
