use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Client context that travels alongside every query through the pipeline.
///
/// The source address is the remote peer as seen by the listener (after
/// trusted-proxy resolution, where the listener supports it). Stages that
/// key on the client (rate limiter, client blocklist, ECS privacy) read it
/// from here rather than from the DNS message.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub source_addr: SocketAddr,
    pub listener_id: Arc<str>,
}

impl ClientInfo {
    pub fn new(source_addr: SocketAddr, listener_id: impl Into<Arc<str>>) -> Self {
        Self {
            source_addr,
            listener_id: listener_id.into(),
        }
    }

    pub fn source_ip(&self) -> IpAddr {
        self.source_addr.ip()
    }
}
