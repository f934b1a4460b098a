//! Atomically swappable blocklist snapshots.
//!
//! Query-path readers grab the current snapshot through one atomic load
//! and never wait on a refresh; the refresher rebuilds off-line and swaps
//! the reference. A failed rebuild leaves the old snapshot in force.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use conduit_dns_application::ports::{BlocklistDb, IpBlocklistDb, RefreshPort};
use conduit_dns_domain::ResolveError;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct SwappableDb {
    name: String,
    db: ArcSwap<Arc<dyn BlocklistDb>>,
    interval: Option<Duration>,
}

impl SwappableDb {
    pub fn new(name: impl Into<String>, db: Arc<dyn BlocklistDb>, interval: Option<Duration>) -> Self {
        Self {
            name: name.into(),
            db: ArcSwap::from_pointee(db),
            interval,
        }
    }

    pub fn current(&self) -> Arc<dyn BlocklistDb> {
        let guard = self.db.load();
        Arc::clone(&**guard)
    }
}

#[async_trait]
impl RefreshPort for SwappableDb {
    fn name(&self) -> &str {
        &self.name
    }

    fn refresh_interval(&self) -> Option<Duration> {
        self.interval
    }

    async fn refresh(&self) -> Result<(), ResolveError> {
        let fresh = self.current().reload().await?;
        info!(list = %self.name, rules = fresh.rule_count(), "List snapshot swapped");
        self.db.store(Arc::new(fresh));
        Ok(())
    }
}

pub struct SwappableIpDb {
    name: String,
    db: ArcSwap<Arc<dyn IpBlocklistDb>>,
    interval: Option<Duration>,
}

impl SwappableIpDb {
    pub fn new(
        name: impl Into<String>,
        db: Arc<dyn IpBlocklistDb>,
        interval: Option<Duration>,
    ) -> Self {
        Self {
            name: name.into(),
            db: ArcSwap::from_pointee(db),
            interval,
        }
    }

    pub fn current(&self) -> Arc<dyn IpBlocklistDb> {
        let guard = self.db.load();
        Arc::clone(&**guard)
    }
}

#[async_trait]
impl RefreshPort for SwappableIpDb {
    fn name(&self) -> &str {
        &self.name
    }

    fn refresh_interval(&self) -> Option<Duration> {
        self.interval
    }

    async fn refresh(&self) -> Result<(), ResolveError> {
        let fresh = self.current().reload().await?;
        info!(list = %self.name, rules = fresh.rule_count(), "List snapshot swapped");
        self.db.store(Arc::new(fresh));
        Ok(())
    }
}
