use serde::Deserialize;
use std::net::IpAddr;

use super::list::ListSpec;

/// One qname rewrite rule for the `replace` stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReplaceRule {
    pub from: String,
    pub to: String,
}

/// Definition of a group node: a stage kind plus the union of all per-kind
/// options. The graph assembler validates which options apply to which
/// kind; unknown combinations are startup errors there, not here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GroupSpec {
    #[serde(rename = "type")]
    pub kind: String,

    /// Child resolver ids, in declaration order.
    #[serde(default)]
    pub resolvers: Vec<String>,

    /// Cool-down for fail-back and random groups, seconds. Default 60.
    #[serde(default)]
    pub reset_after: Option<u64>,

    // cache
    #[serde(default)]
    pub gc_period: Option<u64>,
    #[serde(default)]
    pub cache_size: Option<usize>,
    #[serde(default)]
    pub negative_ttl: Option<u32>,

    // blocklist (v1 flavor: single source, inline rules)
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub refresh: Option<u64>,

    // blocklist-v2 / response-blocklist family
    #[serde(default)]
    pub blocklist: Vec<String>,
    #[serde(default)]
    pub blocklist_format: Option<String>,
    #[serde(default)]
    pub blocklist_source: Vec<ListSpec>,
    #[serde(default)]
    pub blocklist_refresh: Option<u64>,
    #[serde(default)]
    pub blocklist_resolver: Option<String>,
    #[serde(default)]
    pub allowlist: Vec<String>,
    #[serde(default)]
    pub allowlist_source: Vec<ListSpec>,
    #[serde(default)]
    pub allowlist_refresh: Option<u64>,
    #[serde(default)]
    pub allowlist_resolver: Option<String>,
    /// response-blocklist-ip only: strip matching RRs instead of replacing
    /// the whole response.
    #[serde(default)]
    pub filter: bool,

    // rate-limiter
    #[serde(default)]
    pub requests: Option<u64>,
    #[serde(default)]
    pub window: Option<u64>,
    #[serde(default)]
    pub prefix4: Option<u8>,
    #[serde(default)]
    pub prefix6: Option<u8>,
    #[serde(default)]
    pub limit_resolver: Option<String>,

    // ttl-modifier
    #[serde(default)]
    pub ttl_min: Option<u32>,
    #[serde(default)]
    pub ttl_max: Option<u32>,

    // ecs-modifier
    #[serde(default)]
    pub ecs_op: Option<String>,
    #[serde(default)]
    pub ecs_address: Option<IpAddr>,
    #[serde(default)]
    pub ecs_prefix4: Option<u8>,
    #[serde(default)]
    pub ecs_prefix6: Option<u8>,

    // edns0-modifier
    #[serde(default)]
    pub edns0_op: Option<String>,
    #[serde(default)]
    pub edns0_code: Option<u16>,
    /// Option payload as a hex string.
    #[serde(default)]
    pub edns0_data: Option<String>,

    // replace
    #[serde(default)]
    pub replace: Vec<ReplaceRule>,

    // static-responder
    #[serde(default)]
    pub answer: Vec<String>,
    #[serde(default)]
    pub ns: Vec<String>,
    #[serde(default)]
    pub extra: Vec<String>,
    #[serde(default)]
    pub rcode: Option<u16>,

    // response-collapse
    #[serde(default)]
    pub null_rcode: Option<u16>,
}
