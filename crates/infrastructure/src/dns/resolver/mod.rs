pub mod blocklist;
pub mod cache;
pub mod client_blocklist;
pub mod drop;
pub mod ecs_modifier;
pub mod edns0_modifier;
pub mod fail_back;
pub mod fail_rotate;
pub mod random;
pub mod rate_limiter;
pub mod replace;
pub mod response_blocklist_ip;
pub mod response_blocklist_name;
pub mod response_collapse;
pub mod response_minimize;
pub mod round_robin;
pub mod router;
pub mod static_responder;
pub mod ttl_modifier;
pub mod upstream;

pub use blocklist::{Blocklist, BlocklistOptions};
pub use cache::{CacheOptions, CacheResolver};
pub use client_blocklist::ClientBlocklist;
pub use drop::DropResolver;
pub use ecs_modifier::{EcsModifier, EcsOp};
pub use edns0_modifier::{Edns0Modifier, Edns0Op};
pub use fail_back::{FailBack, DEFAULT_RESET_AFTER};
pub use fail_rotate::FailRotate;
pub use random::Random;
pub use rate_limiter::{RateLimiter, RateLimiterOptions};
pub use replace::{Replace, ReplaceRule};
pub use response_blocklist_ip::ResponseBlocklistIp;
pub use response_blocklist_name::ResponseBlocklistName;
pub use response_collapse::ResponseCollapse;
pub use response_minimize::ResponseMinimize;
pub use round_robin::RoundRobin;
pub use router::{Route, Router};
pub use static_responder::{StaticResolver, StaticResolverOptions};
pub use ttl_modifier::TtlModifier;
pub use upstream::UpstreamResolver;
