//! Name blocklist in `regexp` format: one pattern per line, matched
//! against the lowercased query name without its trailing dot.

use super::loader::significant_lines;
use async_trait::async_trait;
use conduit_dns_application::ports::{BlocklistDb, NameRuleMatch, RuleLoader};
use conduit_dns_domain::ResolveError;
use std::sync::Arc;
use tracing::warn;

pub struct RegexpDb {
    loader: Arc<dyn RuleLoader>,
    patterns: Vec<fancy_regex::Regex>,
}

impl RegexpDb {
    pub async fn load(loader: Arc<dyn RuleLoader>) -> Result<Self, ResolveError> {
        let lines = loader.load().await?;
        let mut patterns = Vec::new();
        for rule in significant_lines(&lines) {
            let pattern =
                fancy_regex::Regex::new(rule).map_err(|e| ResolveError::ListParse {
                    rule: rule.to_string(),
                    reason: e.to_string(),
                })?;
            patterns.push(pattern);
        }
        Ok(Self { loader, patterns })
    }
}

#[async_trait]
impl BlocklistDb for RegexpDb {
    fn matches(&self, qname: &str) -> Option<NameRuleMatch> {
        for pattern in &self.patterns {
            match pattern.is_match(qname) {
                Ok(true) => {
                    return Some(NameRuleMatch {
                        rule: pattern.as_str().to_string(),
                        answers: Vec::new(),
                    })
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(pattern = %pattern.as_str(), error = %e, "Pattern failed to evaluate");
                }
            }
        }
        None
    }

    async fn reload(&self) -> Result<Arc<dyn BlocklistDb>, ResolveError> {
        Ok(Arc::new(Self::load(self.loader.clone()).await?))
    }

    fn rule_count(&self) -> usize {
        self.patterns.len()
    }
}
