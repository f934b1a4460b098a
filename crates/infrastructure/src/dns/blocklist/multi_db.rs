//! Union of several name blocklist databases, used when a stage is fed
//! from more than one source. First matching member wins; reload rebuilds
//! every member and fails if any of them fails, keeping the union
//! consistent.

use async_trait::async_trait;
use conduit_dns_application::ports::{BlocklistDb, NameRuleMatch};
use conduit_dns_domain::ResolveError;
use std::sync::Arc;

pub struct MultiDb {
    members: Vec<Arc<dyn BlocklistDb>>,
}

impl MultiDb {
    pub fn new(members: Vec<Arc<dyn BlocklistDb>>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl BlocklistDb for MultiDb {
    fn matches(&self, qname: &str) -> Option<NameRuleMatch> {
        self.members.iter().find_map(|db| db.matches(qname))
    }

    async fn reload(&self) -> Result<Arc<dyn BlocklistDb>, ResolveError> {
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
