//! Group resolver picking a child uniformly at random. A child that
//! fails with a transient error is quarantined for `reset_after`; when
//! every child is quarantined the whole set is considered healthy again
//! rather than failing queries outright.

use async_trait::async_trait;
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::Message;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct Random {
    id: Arc<str>,
    children: Vec<Arc<dyn DnsResolver>>,
    reset_after: Duration,
    quarantined: Mutex<HashMap<usize, Instant>>,
}

impl Random {
    pub fn new(
        id: impl Into<Arc<str>>,
        reset_after: Duration,
        children: Vec<Arc<dyn DnsResolver>>,
    ) -> Self {
        Self {
            id: id.into(),
            children,
            reset_after,
            quarantined: Mutex::new(HashMap::new()),
        }
    }

    /// Indices currently considered healthy. Expired quarantines are
    /// dropped on the way; a fully quarantined set resets to all-healthy.
    fn healthy_children(&self) -> Vec<usize> {
        let mut quarantined = self.quarantined.lock().expect("lock poisoned");
        quarantined.retain(|_, since| since.elapsed() < self.reset_after);

        let healthy: Vec<usize> = (0..self.children.len())
            .filter(|i| !quarantined.contains_key(i))
            .collect();
        if healthy.is_empty() {
            debug!(resolver = %self.id, "All children quarantined, resetting");
            quarantined.clear();
            return (0..self.children.len()).collect();
        }
        healthy
    }

    fn quarantine(&self, index: usize) {
        self.quarantined
            .lock()
            .expect("lock poisoned")
            .insert(index, Instant::now());
    }
}

#[async_trait]
impl DnsResolver for Random {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        let mut last_error = None;

        for _ in 0..self.children.len() {
            let healthy = self.healthy_children();
            let index = healthy[fastrand::usize(..healthy.len())];
            let child = &self.children[index];

            match child.resolve(query, client).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() => {
                    warn!(resolver = %self.id, child = %child.id(), error = %e, "Quarantining child");
                    self.quarantine(index);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.expect("at least one attempt was made"))
    }
}
