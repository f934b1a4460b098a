use serde::Deserialize;

/// A single blocklist/allowlist source: where the rules come from and how
/// they are written.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListSpec {
    /// Rule syntax: `regexp` (default), `domain` or `hosts` for name
    /// lists; `cidr` (default) for IP lists.
    #[serde(default)]
    pub format: Option<String>,

    /// File path or http(s) URL.
    #[serde(default)]
    pub source: String,

    /// Directory for the on-disk copy kept by the HTTP loader. When a
    /// refresh fetch fails, the cached copy is used instead.
    #[serde(default)]
    pub cache_dir: Option<String>,
}
