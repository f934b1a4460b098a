pub mod client_info;
pub mod config;
pub mod endpoint;
pub mod errors;

pub use client_info::ClientInfo;
pub use config::{
    Config, ConfigError, GroupSpec, ListSpec, ListenerSpec, ReplaceRule, ResolverSpec, RouteSpec,
    RouterSpec,
};
pub use endpoint::{UpstreamAddr, UpstreamEndpoint};
pub use errors::ResolveError;
