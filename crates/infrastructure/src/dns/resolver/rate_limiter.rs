//! Per-client fixed-window rate limiting. Clients are keyed by their
//! source address masked to a configurable prefix, so a misbehaving /24
//! or /56 shares one budget. Windows align to absolute time boundaries,
//! which keeps the counters in a single map that is reset wholesale when
//! the window rolls over.

use super::super::edns::mask_address;
use super::super::message;
use async_trait::async_trait;
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError};
use dashmap::DashMap;
use hickory_proto::op::{Message, ResponseCode};
use rustc_hash::FxBuildHasher;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub const DEFAULT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_PREFIX4: u8 = 24;
pub const DEFAULT_PREFIX6: u8 = 56;

#[derive(Debug, Clone)]
pub struct RateLimiterOptions {
    /// Allowed queries per window per masked client prefix.
    pub requests: u64,
    /// Window length in seconds.
    pub window: u64,
    pub prefix4: u8,
    pub prefix6: u8,
}

pub struct RateLimiter {
    id: Arc<str>,
    inner: Arc<dyn DnsResolver>,
    /// Answers over-limit queries instead of a plain REFUSED.
    limit_resolver: Option<Arc<dyn DnsResolver>>,
    options: RateLimiterOptions,
    counters: DashMap<IpAddr, u64, FxBuildHasher>,
    current_window: AtomicU64,
    reset_lock: Mutex<()>,
}

impl RateLimiter {
    pub fn new(
        id: impl Into<Arc<str>>,
        inner: Arc<dyn DnsResolver>,
        limit_resolver: Option<Arc<dyn DnsResolver>>,
        options: RateLimiterOptions,
    ) -> Self {
        Self {
            id: id.into(),
            inner,
            limit_resolver,
            options,
            counters: DashMap::with_hasher(FxBuildHasher),
            current_window: AtomicU64::new(0),
            reset_lock: Mutex::new(()),
        }
    }

    fn window_of(&self, unix_secs: u64) -> u64 {
        unix_secs / self.options.window.max(1)
    }

    /// Reset the counters when the window rolled over since the last
    /// query. Double-checked under the lock so concurrent queries reset
    /// at most once.
    fn roll_window(&self, window: u64) {
        if self.current_window.load(Ordering::Acquire) == window {
            return;
        }
        let _guard = self.reset_lock.lock().expect("lock poisoned");
        if self.current_window.load(Ordering::Acquire) != window {
            self.counters.clear();
            self.current_window.store(window, Ordering::Release);
        }
    }

    fn client_key(&self, client: &ClientInfo) -> IpAddr {
        let prefix = match client.source_ip() {
            IpAddr::V4(_) => self.options.prefix4,
            IpAddr::V6(_) => self.options.prefix6,
        };
        mask_address(client.source_ip(), prefix)
    }
}

#[async_trait]
impl DnsResolver for RateLimiter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        let unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.roll_window(self.window_of(unix_secs));

        let key = self.client_key(client);
        let count = {
            let mut entry = self.counters.entry(key).or_insert(0);
            *entry += 1;
            *entry
        };

        if count > self.options.requests {
            debug!(resolver = %self.id, client = %key, count, "Rate limit exceeded");
            return match &self.limit_resolver {
                Some(limit) => limit.resolve(query, client).await,
                None => Ok(message::reply_with_rcode(query, ResponseCode::Refused)),
            };
        }

        self.inner.resolve(query, client).await
    }
}
