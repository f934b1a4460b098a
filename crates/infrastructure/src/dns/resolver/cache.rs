//! Response cache with request coalescing.
//!
//! Keys are (lowercased qname, qtype, qclass, ECS prefix if present).
//! Hits return a copy of the stored response with TTLs decremented by the
//! entry's age, floored at 1. Concurrent misses for one key share a
//! single upstream call through a per-key `watch` slot: the first caller
//! resolves, the rest await its published result. Negative responses
//! (NXDOMAIN and NODATA) are cached for the configured negative TTL;
//! upstream errors pass through uncached.

use super::super::edns::{self, EcsOption};
use super::super::message;
use async_trait::async_trait;
use compact_str::CompactString;
use conduit_dns_application::ports::{CacheMaintenancePort, DnsResolver, SweepOutcome};
use conduit_dns_domain::{ClientInfo, ResolveError};
use dashmap::DashMap;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{DNSClass, RecordType};
use rustc_hash::FxBuildHasher;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::debug;

type InflightSender = Arc<watch::Sender<Option<Arc<Message>>>>;

#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    /// How often the sweeper removes expired entries.
    pub gc_period: Duration,
    /// Maximum number of entries; 0 means unbounded. Enforcement evicts
    /// oldest-inserted entries first.
    pub capacity: usize,
    /// TTL for NXDOMAIN/NODATA responses; 0 disables negative caching.
    pub negative_ttl: u32,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            gc_period: Duration::from_secs(60),
            capacity: 0,
            negative_ttl: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EcsKey {
    prefix: u8,
    address: IpAddr,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    qname: CompactString,
    qtype: RecordType,
    qclass: DNSClass,
    ecs: Option<EcsKey>,
}

impl CacheKey {
    fn from_query(query: &Message) -> Option<Self> {
        let q = query.queries().first()?;
        let qname =
            CompactString::from(q.name().to_lowercase().to_utf8().trim_end_matches('.'));
        let ecs = EcsOption::from_message(query).map(|e| EcsKey {
            prefix: e.source_prefix,
            address: edns::mask_address(e.address, e.source_prefix),
        });
        Some(Self {
            qname,
            qtype: q.query_type(),
            qclass: q.query_class(),
            ecs,
        })
    }
}

struct CacheEntry {
    response: Message,
    inserted: Instant,
    expires: Instant,
    /// Insertion sequence number; the eviction log uses it to tell
    /// whether a logged insertion still owns the slot.
    seq: u64,
}

pub struct CacheResolver {
    id: Arc<str>,
    inner: Arc<dyn DnsResolver>,
    options: CacheOptions,
    entries: DashMap<CacheKey, Arc<CacheEntry>, FxBuildHasher>,
    insertion_log: Mutex<VecDeque<(u64, CacheKey)>>,
    seq: AtomicU64,
    inflight: DashMap<CacheKey, InflightSender, FxBuildHasher>,
}

impl CacheResolver {
    pub fn new(
        id: impl Into<Arc<str>>,
        inner: Arc<dyn DnsResolver>,
        options: CacheOptions,
    ) -> Self {
        Self {
            id: id.into(),
            inner,
            options,
            entries: DashMap::with_hasher(FxBuildHasher),
            insertion_log: Mutex::new(VecDeque::new()),
            seq: AtomicU64::new(0),
            inflight: DashMap::with_hasher(FxBuildHasher),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_cache(&self, key: &CacheKey, query: &Message) -> Option<Message> {
        let entry = self.entries.get(key)?;
        if Instant::now() >= entry.expires {
            return None;
        }
        let elapsed = entry.inserted.elapsed().as_secs() as u32;
        let mut response = entry.response.clone();
        drop(entry);

        response.set_id(query.id());
        message::map_ttls(&mut response, |ttl| ttl.saturating_sub(elapsed).max(1));
        Some(response)
    }

    fn cacheable_ttl(&self, response: &Message) -> Option<u32> {
        if message::is_negative(response) {
            return (self.options.negative_ttl > 0).then_some(self.options.negative_ttl);
        }
        if response.response_code() != ResponseCode::NoError {
            // SERVFAIL, REFUSED and friends pass through uncached.
            return None;
        }
        message::min_answer_ttl(response).filter(|ttl| *ttl > 0)
    }

    fn store(&self, key: CacheKey, response: &Message) {
        let Some(ttl) = self.cacheable_ttl(response) else {
            return;
        };
        let now = Instant::now();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let entry = CacheEntry {
            response: response.clone(),
            inserted: now,
            expires: now + Duration::from_secs(u64::from(ttl)),
            seq,
        };
        self.entries.insert(key.clone(), Arc::new(entry));

        let mut log = self.insertion_log.lock().expect("lock poisoned");
        log.push_back((seq, key));
        if self.options.capacity > 0 {
            while self.entries.len() > self.options.capacity {
                let Some((old_seq, old_key)) = log.pop_front() else {
                    break;
                };
                let still_current = self
                    .entries
                    .get(&old_key)
                    .map(|e| e.seq == old_seq)
                    .unwrap_or(false);
                if still_current {
                    self.entries.remove(&old_key);
                }
            }
        }
    }

    fn respond_from_shared(shared: &Message, query: &Message) -> Message {
        let mut response = shared.clone();
        response.set_id(query.id());
        response
    }
}

#[async_trait]
impl DnsResolver for CacheResolver {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        let Some(key) = CacheKey::from_query(query) else {
            return self.inner.resolve(query, client).await;
        };

        if let Some(hit) = self.check_cache(&key, query) {
            debug!(resolver = %self.id, qname = %key.qname, "Cache HIT");
            return Ok(hit);
        }

        let (is_leader, mut rx) = match self.inflight.entry(key.clone()) {
            dashmap::Entry::Occupied(e) => {
                let rx = e.get().subscribe();
                drop(e);
                (false, rx)
            }
            dashmap::Entry::Vacant(e) => {
                let (tx, rx) = watch::channel(None::<Arc<Message>>);
                e.insert(Arc::new(tx));
                (true, rx)
            }
        };

        if !is_leader {
            // Happy path: leader published the response before closing.
            if rx.changed().await.is_ok() {
                if let Some(shared) = rx.borrow().clone() {
                    return Ok(Self::respond_from_shared(&shared, query));
                }
            }
            // The leader may have published before we subscribed; the
            // value is still readable.
            if let Some(shared) = rx.borrow().clone() {
                return Ok(Self::respond_from_shared(&shared, query));
            }
            // Or it stored a result we can serve from cache.
            if let Some(hit) = self.check_cache(&key, query) {
                return Ok(hit);
            }
            // Leader failed; make our own attempt.
            let result = self.inner.resolve(query, client).await;
            if let Ok(response) = &result {
                self.store(key, response);
            }
            return result;
        }

        debug!(resolver = %self.id, qname = %key.qname, "Cache MISS");
        let result = self.inner.resolve(query, client).await;

        match &result {
            Ok(response) => {
                self.store(key.clone(), response);
                if let Some((_, tx)) = self.inflight.remove(&key) {
                    let _ = tx.send(Some(Arc::new(response.clone())));
                }
            }
            Err(_) => {
                // Dropping the sender wakes the followers into their
                // fallback path.
                self.inflight.remove(&key);
            }
        }

        result
    }
}

impl CacheMaintenancePort for CacheResolver {
    fn name(&self) -> &str {
        &self.id
    }

    fn gc_period(&self) -> Duration {
        self.options.gc_period
    }

    fn sweep_expired(&self) -> SweepOutcome {
        let scanned = self.entries.len();
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            if now >= entry.expires {
                removed += 1;
                false
            } else {
                true
            }
        });

        let mut log = self.insertion_log.lock().expect("lock poisoned");
        log.retain(|(seq, key)| {
            self.entries
                .get(key)
                .map(|e| e.seq == *seq)
                .unwrap_or(false)
        });

        SweepOutcome {
            scanned,
            removed,
            remaining: self.entries.len(),
        }
    }
}
