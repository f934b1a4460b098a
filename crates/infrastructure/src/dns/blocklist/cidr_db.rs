//! IP blocklist in `cidr` format: one network per line.

use super::loader::significant_lines;
use async_trait::async_trait;
use conduit_dns_application::ports::{IpBlocklistDb, IpRuleMatch, RuleLoader};
use conduit_dns_domain::ResolveError;
use ipnetwork::IpNetwork;
use std::net::IpAddr;
use std::sync::Arc;

pub struct CidrDb {
    loader: Arc<dyn RuleLoader>,
    networks: Vec<IpNetwork>,
}

impl CidrDb {
    pub async fn load(loader: Arc<dyn RuleLoader>) -> Result<Self, ResolveError> {
        let lines = loader.load().await?;
        let mut networks = Vec::new();
        for rule in significant_lines(&lines) {
            let network: IpNetwork = rule.parse().map_err(|e| ResolveError::ListParse {
                rule: rule.to_string(),
                reason: format!("{}", e),
            })?;
            networks.push(network);
        }
        Ok(Self { loader, networks })
    }
}

#[async_trait]
impl IpBlocklistDb for CidrDb {
    fn matches(&self, ip: IpAddr) -> Option<IpRuleMatch> {
        self.networks
            .iter()
            .find(|network| network.contains(ip))
            .map(|network| IpRuleMatch {
                rule: network.to_string(),
            })
    }

    async fn reload(&self) -> Result<Arc<dyn IpBlocklistDb>, ResolveError> {
        Ok(Arc::new(Self::load(self.loader.clone()).await?))
    }

    fn rule_count(&self) -> usize {
        self.networks.len()
    }
}
