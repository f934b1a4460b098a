//! Group resolver with a sticky active child. A transient failure rotates
//! the active index to the next sibling and retries, wrapping around, for
//! at most one full cycle. The rotated-to child stays active for future
//! queries; there is no automatic return to the first child (see
//! fail-back for that).

use async_trait::async_trait;
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::Message;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

pub struct FailRotate {
    id: Arc<str>,
    children: Vec<Arc<dyn DnsResolver>>,
    active: AtomicUsize,
}

impl FailRotate {
    pub fn new(id: impl Into<Arc<str>>, children: Vec<Arc<dyn DnsResolver>>) -> Self {
        Self {
            id: id.into(),
            children,
            active: AtomicUsize::new(0),
        }
    }

    /// Advance the active index past `observed` if no other query rotated
    /// it already.
    fn rotate_from(&self, observed: usize) -> usize {
        let next = (observed + 1) % self.children.len();
        let _ = self
            .active
            .compare_exchange(observed, next, Ordering::AcqRel, Ordering::Acquire);
        self.active.load(Ordering::Acquire)
    }
}

#[async_trait]
impl DnsResolver for FailRotate {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        let mut index = self.active.load(Ordering::Acquire) % self.children.len();
        let mut last_error = None;

        for _ in 0..self.children.len() {
            let child = &self.children[index];
            match child.resolve(query, client).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() => {
                    warn!(resolver = %self.id, child = %child.id(), error = %e, "Failing over");
                    index = self.rotate_from(index);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.expect("at least one attempt was made"))
    }
}
