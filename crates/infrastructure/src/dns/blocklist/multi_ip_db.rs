//! Union of several IP blocklist databases.

use async_trait::async_trait;
use conduit_dns_application::ports::{IpBlocklistDb, IpRuleMatch};
use conduit_dns_domain::ResolveError;
use std::net::IpAddr;
use std::sync::Arc;

pub struct MultiIpDb {
    members: Vec<Arc<dyn IpBlocklistDb>>,
}

impl MultiIpDb {
    pub fn new(members: Vec<Arc<dyn IpBlocklistDb>>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl IpBlocklistDb for MultiIpDb {
    fn matches(&self, ip: IpAddr) -> Option<IpRuleMatch> {
        self.members.iter().find_map(|db| db.matches(ip))
    }

    async fn reload(&self) -> Result<Arc<dyn IpBlocklistDb>, ResolveError> {
        let mut members = Vec::with_capacity(self.members.len());
        for member in &self.members {
            members.push(member.reload().await?);
        }
        Ok(Arc::new(Self::new(members)))
    }

    fn rule_count(&self) -> usize {
        self.members.iter().map(|db| db.rule_count()).sum()
    }
}
