//! Name blocklist in `hosts` format: `IP name [name..]` per line, exact
//! name matching. The IP is the substitution target for spoofed answers;
//! 0.0.0.0 or :: mean "block with NXDOMAIN".

use super::loader::significant_lines;
use async_trait::async_trait;
use compact_str::CompactString;
use conduit_dns_application::ports::{BlocklistDb, NameRuleMatch, RuleLoader};
use conduit_dns_domain::ResolveError;
use rustc_hash::FxBuildHasher;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

pub struct HostsDb {
    loader: Arc<dyn RuleLoader>,
    entries: HashMap<CompactString, Vec<IpAddr>, FxBuildHasher>,
}

impl HostsDb {
    pub async fn load(loader: Arc<dyn RuleLoader>) -> Result<Self, ResolveError> {
        let lines = loader.load().await?;
        let mut entries: HashMap<CompactString, Vec<IpAddr>, FxBuildHasher> =
            HashMap::with_hasher(FxBuildHasher);

        for line in significant_lines(&lines) {
            // Inline comments are allowed after the names.
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let Some(ip_str) = fields.next() else {
                continue;
            };
            let ip: IpAddr = ip_str.parse().map_err(|e| ResolveError::ListParse {
                rule: line.to_string(),
                reason: format!("invalid address '{}': {}", ip_str, e),
            })?;
            let mut saw_name = false;
            for name in fields {
                saw_name = true;
                entries
                    .entry(CompactString::new(name.to_lowercase()))
                    .or_default()
                    .push(ip);
            }
            if !saw_name {
                return Err(ResolveError::ListParse {
                    rule: line.to_string(),
                    reason: "no host names after address".to_string(),
                });
            }
        }
        Ok(Self { loader, entries })
    }
}

#[async_trait]
impl BlocklistDb for HostsDb {
    fn matches(&self, qname: &str) -> Option<NameRuleMatch> {
        self.entries.get(qname).map(|addrs| NameRuleMatch {
            rule: qname.to_string(),
            answers: addrs.clone(),
        })
    }

    async fn reload(&self) -> Result<Arc<dyn BlocklistDb>, ResolveError> {
        Ok(Arc::new(Self::load(self.loader.clone()).await?))
    }

    fn rule_count(&self) -> usize {
        self.entries.len()
    }
}
