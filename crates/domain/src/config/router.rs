use serde::Deserialize;

/// One route in a router. Empty predicate fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RouteSpec {
    /// Regular expression matched against the query name.
    #[serde(default)]
    pub name: Option<String>,

    /// Query class, e.g. "IN".
    #[serde(default)]
    pub class: Option<String>,

    /// Deprecated singular form; merged into `types` at build time.
    #[serde(rename = "type", default)]
    pub query_type: Option<String>,

    /// Query types, e.g. ["A", "AAAA"].
    #[serde(default)]
    pub types: Vec<String>,

    /// Client source CIDR.
    #[serde(default)]
    pub source: Option<String>,

    /// Negate the whole predicate.
    #[serde(default)]
    pub invert: bool,

    /// Target resolver id.
    pub resolver: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RouterSpec {
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
}
