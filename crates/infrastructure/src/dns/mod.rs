pub mod blocklist;
pub mod bootstrap;
pub mod edns;
pub mod graph;
pub mod message;
pub mod resolver;
pub mod server;
pub mod transport;

pub use graph::{assemble, Graph};
pub use server::{build_listeners, DnsListener, ListenerProtocol};
