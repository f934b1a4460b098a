//! Rewrites the query name before resolution through an ordered list of
//! regex rules (first match wins) and restores the original name on the
//! way back, so the client sees the name it asked for. Useful for
//! mapping legacy or internal names onto their real counterparts.

use async_trait::async_trait;
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::Message;
use hickory_proto::rr::Name;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ReplaceRule {
    pattern: fancy_regex::Regex,
    replacement: String,
}

impl ReplaceRule {
    pub fn compile(from: &str, to: &str) -> Result<Self, String> {
        let pattern = fancy_regex::Regex::new(from)
            .map_err(|e| format!("invalid pattern '{}': {}", from, e))?;
        Ok(Self {
            pattern,
            replacement: to.to_string(),
        })
    }
}

pub struct Replace {
    id: Arc<str>,
    inner: Arc<dyn DnsResolver>,
    rules: Vec<ReplaceRule>,
}

impl Replace {
    pub fn new(
        id: impl Into<Arc<str>>,
        inner: Arc<dyn DnsResolver>,
        rules: Vec<ReplaceRule>,
    ) -> Self {
        Self {
            id: id.into(),
            inner,
            rules,
        }
    }

    fn rewrite(&self, qname: &str) -> Option<String> {
        for rule in &self.rules {
            match rule.pattern.is_match(qname) {
                Ok(true) => {
                    let rewritten = rule
                        .pattern
                        .replace(qname, rule.replacement.as_str())
                        .into_owned();
                    return Some(rewritten);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(pattern = %rule.pattern.as_str(), error = %e, "Replace pattern failed to evaluate");
                }
            }
        }
        None
    }
}

#[async_trait]
impl DnsResolver for Replace {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        let question = query
            .queries()
            .first()
            .cloned()
            .ok_or_else(|| ResolveError::MalformedQuery("missing question section".to_string()))?;
        let original_name = question.name().clone();
        let qname = original_name.to_utf8();

        let Some(rewritten) = self.rewrite(&qname) else {
            return self.inner.resolve(query, client).await;
        };

        let new_name = Name::from_str(&rewritten).map_err(|e| {
            ResolveError::MalformedQuery(format!("rewritten name '{}' is invalid: {}", rewritten, e))
        })?;
        debug!(resolver = %self.id, from = %qname, to = %rewritten, "Query name rewritten");

        let mut derived = query.clone();
        derived.take_queries();
        let mut new_question = question;
        new_question.set_name(new_name.clone());
        derived.add_query(new_question);

        let mut response = self.inner.resolve(&derived, client).await?;

        // Put the client's name back on the question and on the answers
        // that carry the rewritten owner name.
        let restored_queries: Vec<_> = response
            .take_queries()
            .into_iter()
            .map(|mut q| {
                if q.name() == &new_name {
                    q.set_name(original_name.clone());
                }
                q
            })
            .collect();
        for q in restored_queries {
            response.add_query(q);
        }

        let restored_answers: Vec<_> = response
            .take_answers()
            .into_iter()
            .map(|mut r| {
                if r.name() == &new_name {
                    r.set_name(original_name.clone());
                }
                r
            })
            .collect();
        response.insert_answers(restored_answers);

        Ok(response)
    }
}
