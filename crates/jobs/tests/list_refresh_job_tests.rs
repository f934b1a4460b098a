use async_trait::async_trait;
use conduit_dns_application::ports::{CacheMaintenancePort, RefreshPort, SweepOutcome};
use conduit_dns_domain::ResolveError;
use conduit_dns_jobs::{CacheMaintenanceJob, ListRefreshJob};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct CountingRefreshPort {
    refreshes: AtomicUsize,
    interval: Option<Duration>,
    fail: bool,
}

impl CountingRefreshPort {
    fn new(interval: Option<Duration>, fail: bool) -> Self {
        Self {
            refreshes: AtomicUsize::new(0),
            interval,
            fail,
        }
    }
}

#[async_trait]
impl RefreshPort for CountingRefreshPort {
    fn name(&self) -> &str {
        "test-list"
    }

    fn refresh_interval(&self) -> Option<Duration> {
        self.interval
    }

    async fn refresh(&self) -> Result<(), ResolveError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(ResolveError::ListLoad {
                source_name: "test".into(),
                reason: "boom".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn refreshes_on_interval() {
    let port = Arc::new(CountingRefreshPort::new(
        Some(Duration::from_millis(30)),
        false,
    ));
    let job = Arc::new(ListRefreshJob::new(port.clone() as Arc<dyn RefreshPort>).unwrap());
    tokio::spawn(job.start());

    tokio::time::sleep(Duration::from_millis(110)).await;
    let refreshes = port.refreshes.load(Ordering::SeqCst);
    assert!(refreshes >= 2, "expected at least 2 refreshes, got {}", refreshes);
}

#[tokio::test]
async fn refresh_disabled_without_interval() {
    let port = Arc::new(CountingRefreshPort::new(None, false));
    assert!(ListRefreshJob::new(port as Arc<dyn RefreshPort>).is_none());
}

#[tokio::test]
async fn keeps_running_after_failed_refresh() {
    let port = Arc::new(CountingRefreshPort::new(
        Some(Duration::from_millis(25)),
        true,
    ));
    let job = Arc::new(ListRefreshJob::new(port.clone() as Arc<dyn RefreshPort>).unwrap());
    tokio::spawn(job.start());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(port.refreshes.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn cancellation_stops_the_job() {
    let port = Arc::new(CountingRefreshPort::new(
        Some(Duration::from_millis(20)),
        false,
    ));
    let token = CancellationToken::new();
    let job = Arc::new(
        ListRefreshJob::new(port.clone() as Arc<dyn RefreshPort>)
            .unwrap()
            .with_cancellation(token.clone()),
    );
    tokio::spawn(job.start());

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let at_cancel = port.refreshes.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(port.refreshes.load(Ordering::SeqCst), at_cancel);
}

struct CountingCache {
    sweeps: AtomicUsize,
}

impl CacheMaintenancePort for CountingCache {
    fn name(&self) -> &str {
        "test-cache"
    }

    fn gc_period(&self) -> Duration {
        Duration::from_millis(25)
    }

    fn sweep_expired(&self) -> SweepOutcome {
        self.sweeps.fetch_add(1, Ordering::SeqCst);
        SweepOutcome::default()
    }
}

#[tokio::test]
async fn cache_job_sweeps_on_period() {
    let cache = Arc::new(CountingCache {
        sweeps: AtomicUsize::new(0),
    });
    let job = Arc::new(CacheMaintenanceJob::new(
        cache.clone() as Arc<dyn CacheMaintenancePort>
    ));
    tokio::spawn(job.start());

    tokio::time::sleep(Duration::from_millis(90)).await;
    assert!(cache.sweeps.load(Ordering::SeqCst) >= 2);
}
