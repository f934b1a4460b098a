//! Name blocklist in `domain` format: one domain per line, matching the
//! domain itself and everything below it.

use super::loader::significant_lines;
use super::suffix_trie::SuffixTrie;
use async_trait::async_trait;
use conduit_dns_application::ports::{BlocklistDb, NameRuleMatch, RuleLoader};
use conduit_dns_domain::ResolveError;
use std::sync::Arc;

pub struct DomainDb {
    loader: Arc<dyn RuleLoader>,
    trie: SuffixTrie,
}

impl DomainDb {
    pub async fn load(loader: Arc<dyn RuleLoader>) -> Result<Self, ResolveError> {
        let lines = loader.load().await?;
        let mut trie = SuffixTrie::new();
        for rule in significant_lines(&lines) {
            trie.insert(&rule.to_lowercase());
        }
        Ok(Self { loader, trie })
    }
}

#[async_trait]
impl BlocklistDb for DomainDb {
    fn matches(&self, qname: &str) -> Option<NameRuleMatch> {
        self.trie.lookup(qname).map(|rule| NameRuleMatch {
            rule: rule.to_string(),
            answers: Vec::new(),
        })
    }

    async fn reload(&self) -> Result<Arc<dyn BlocklistDb>, ResolveError> {
        Ok(Arc::new(Self::load(self.loader.clone()).await?))
    }

    fn rule_count(&self) -> usize {
        self.trie.len()
    }
}
