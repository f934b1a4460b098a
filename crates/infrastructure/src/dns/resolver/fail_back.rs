//! Fail-rotate with a cool-down: once `reset_after` passes without any
//! child failing, the next query goes back to the first (preferred)
//! child. The cool-down timer re-arms on every failure, so a flapping
//! primary is not hammered.

use async_trait::async_trait;
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::Message;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_RESET_AFTER: Duration = Duration::from_secs(60);

pub struct FailBack {
    id: Arc<str>,
    children: Vec<Arc<dyn DnsResolver>>,
    active: AtomicUsize,
    reset_after: Duration,
    last_failure: Mutex<Option<Instant>>,
}

impl FailBack {
    pub fn new(
        id: impl Into<Arc<str>>,
        reset_after: Duration,
        children: Vec<Arc<dyn DnsResolver>>,
    ) -> Self {
        Self {
            id: id.into(),
            children,
            active: AtomicUsize::new(0),
            reset_after,
            last_failure: Mutex::new(None),
        }
    }

    fn record_failure(&self) {
        *self.last_failure.lock().expect("lock poisoned") = Some(Instant::now());
    }

    /// Reset to the preferred child when the cool-down has elapsed since
    /// the most recent failure.
    fn maybe_fail_back(&self) {
        if self.active.load(Ordering::Acquire) == 0 {
            return;
        }
        let cooled_down = self
            .last_failure
            .lock()
            .expect("lock poisoned")
            .map(|at| at.elapsed() >= self.reset_after)
            .unwrap_or(true);
        if cooled_down {
            debug!(resolver = %self.id, "Cool-down expired, failing back to primary");
            self.active.store(0, Ordering::Release);
        }
    }

    fn rotate_from(&self, observed: usize) -> usize {
        let next = (observed + 1) % self.children.len();
        let _ = self
            .active
            .compare_exchange(observed, next, Ordering::AcqRel, Ordering::Acquire);
        self.active.load(Ordering::Acquire)
    }
}

#[async_trait]
impl DnsResolver for FailBack {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        self.maybe_fail_back();

        let mut index = self.active.load(Ordering::Acquire) % self.children.len();
        let mut last_error = None;

        for _ in 0..self.children.len() {
            let child = &self.children[index];
            match child.resolve(query, client).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() => {
                    warn!(resolver = %self.id, child = %child.id(), error = %e, "Failing over");
                    self.record_failure();
                    index = self.rotate_from(index);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.expect("at least one attempt was made"))
    }
}
