mod helpers;

use conduit_dns_application::ports::{CacheMaintenancePort, DnsResolver};
use conduit_dns_infrastructure::dns::resolver::{CacheOptions, CacheResolver};
use futures::future::join_all;
use helpers::{make_client, make_query, MockBehavior, MockResolver};
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RecordType;
use std::sync::Arc;
use std::time::Duration;

fn options(negative_ttl: u32, capacity: usize) -> CacheOptions {
    CacheOptions {
        gc_period: Duration::from_secs(60),
        capacity,
        negative_ttl,
    }
}

#[tokio::test]
async fn second_query_is_served_from_cache() {
    let upstream = MockResolver::new(
        "up",
        MockBehavior::Answer(vec![helpers::a_record("ignored.", 60, "192.0.2.1")]),
    );
    let cache = CacheResolver::new(
        "cache",
        upstream.clone() as Arc<dyn DnsResolver>,
        options(0, 0),
    );
    let client = make_client("127.0.0.1:40000");

    let first = cache
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .unwrap();
    let second = cache
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .unwrap();

    assert_eq!(upstream.call_count(), 1, "leaf must receive exactly one call");
    assert_eq!(helpers::answer_addrs(&first), helpers::answer_addrs(&second));
}

#[tokio::test]
async fn hit_carries_the_askers_id_and_decremented_ttl() {
    let upstream = MockResolver::new(
        "up",
        MockBehavior::Answer(vec![helpers::a_record("ignored.", 60, "192.0.2.1")]),
    );
    let cache = CacheResolver::new(
        "cache",
        upstream as Arc<dyn DnsResolver>,
        options(0, 0),
    );
    let client = make_client("127.0.0.1:40000");

    cache
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let query = make_query("example.com.", RecordType::A);
    let hit = cache.resolve(&query, &client).await.unwrap();
    assert_eq!(hit.id(), query.id());

    let ttl = hit.answers()[0].ttl();
    assert!(ttl < 60, "TTL must decrement with entry age, got {}", ttl);
    assert!(ttl >= 55, "TTL decrement out of range, got {}", ttl);
}

#[tokio::test]
async fn expired_entry_goes_back_upstream() {
    let upstream = MockResolver::new(
        "up",
        MockBehavior::Answer(vec![helpers::a_record("ignored.", 1, "192.0.2.1")]),
    );
    let cache = CacheResolver::new(
        "cache",
        upstream.clone() as Arc<dyn DnsResolver>,
        options(0, 0),
    );
    let client = make_client("127.0.0.1:40000");

    cache
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1200)).await;
    cache
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .unwrap();

    assert_eq!(upstream.call_count(), 2);
}

#[tokio::test]
async fn different_types_are_cached_separately() {
    let upstream = MockResolver::new(
        "up",
        MockBehavior::Answer(vec![helpers::a_record("ignored.", 60, "192.0.2.1")]),
    );
    let cache = CacheResolver::new(
        "cache",
        upstream.clone() as Arc<dyn DnsResolver>,
        options(0, 0),
    );
    let client = make_client("127.0.0.1:40000");

    cache
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .unwrap();
    cache
        .resolve(&make_query("example.com.", RecordType::AAAA), &client)
        .await
        .unwrap();
    cache
        .resolve(&make_query("EXAMPLE.COM.", RecordType::A), &client)
        .await
        .unwrap();

    assert_eq!(
        upstream.call_count(),
        2,
        "qname is case-folded, qtype is part of the key"
    );
}

#[tokio::test]
async fn negative_responses_honor_negative_ttl() {
    let upstream = MockResolver::new("up", MockBehavior::Rcode(ResponseCode::NXDomain));
    let cache = CacheResolver::new(
        "cache",
        upstream.clone() as Arc<dyn DnsResolver>,
        options(30, 0),
    );
    let client = make_client("127.0.0.1:40000");

    cache
        .resolve(&make_query("missing.example.", RecordType::A), &client)
        .await
        .unwrap();
    let hit = cache
        .resolve(&make_query("missing.example.", RecordType::A), &client)
        .await
        .unwrap();

    assert_eq!(upstream.call_count(), 1);
    assert_eq!(hit.response_code(), ResponseCode::NXDomain);
}

#[tokio::test]
async fn negative_ttl_zero_disables_negative_caching() {
    let upstream = MockResolver::new("up", MockBehavior::Rcode(ResponseCode::NXDomain));
    let cache = CacheResolver::new(
        "cache",
        upstream.clone() as Arc<dyn DnsResolver>,
        options(0, 0),
    );
    let client = make_client("127.0.0.1:40000");

    cache
        .resolve(&make_query("missing.example.", RecordType::A), &client)
        .await
        .unwrap();
    cache
        .resolve(&make_query("missing.example.", RecordType::A), &client)
        .await
        .unwrap();

    assert_eq!(upstream.call_count(), 2);
}

#[tokio::test]
async fn errors_pass_through_uncached() {
    let upstream = MockResolver::failing("up");
    let cache = CacheResolver::new(
        "cache",
        upstream.clone() as Arc<dyn DnsResolver>,
        options(30, 0),
    );
    let client = make_client("127.0.0.1:40000");

    assert!(cache
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .is_err());
    assert!(cache
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .is_err());
    assert_eq!(upstream.call_count(), 2);
}

#[tokio::test]
async fn concurrent_misses_share_one_upstream_call() {
    let upstream = MockResolver::with_delay(
        "up",
        MockBehavior::Answer(vec![helpers::a_record("ignored.", 60, "192.0.2.1")]),
        Duration::from_millis(50),
    );
    let cache = Arc::new(CacheResolver::new(
        "cache",
        upstream.clone() as Arc<dyn DnsResolver>,
        options(0, 0),
    ));
    let client = make_client("127.0.0.1:40000");

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            let client = client.clone();
            tokio::spawn(async move {
                cache
                    .resolve(&make_query("example.com.", RecordType::A), &client)
                    .await
            })
        })
        .collect();

    let results = join_all(tasks).await;

    assert_eq!(upstream.call_count(), 1, "expected exactly 1 upstream call");
    for result in results {
        let response = result.unwrap().unwrap();
        assert_eq!(helpers::answer_addrs(&response), vec!["192.0.2.1"]);
    }
}

#[tokio::test]
async fn capacity_evicts_oldest_inserted_first() {
    let upstream = MockResolver::new(
        "up",
        MockBehavior::Answer(vec![helpers::a_record("ignored.", 600, "192.0.2.1")]),
    );
    let cache = CacheResolver::new(
        "cache",
        upstream.clone() as Arc<dyn DnsResolver>,
        options(0, 2),
    );
    let client = make_client("127.0.0.1:40000");

    cache
        .resolve(&make_query("a.example.", RecordType::A), &client)
        .await
        .unwrap();
    cache
        .resolve(&make_query("b.example.", RecordType::A), &client)
        .await
        .unwrap();
    cache
        .resolve(&make_query("c.example.", RecordType::A), &client)
        .await
        .unwrap();

    assert_eq!(cache.len(), 2);

    // a.example was the oldest insertion and must have been evicted.
    cache
        .resolve(&make_query("a.example.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(upstream.call_count(), 4);

    // b or c is still cached.
    cache
        .resolve(&make_query("c.example.", RecordType::A), &client)
        .await
        .unwrap();
    assert!(upstream.call_count() <= 5);
}

#[tokio::test]
async fn sweep_removes_expired_entries() {
    let upstream = MockResolver::new(
        "up",
        MockBehavior::Answer(vec![helpers::a_record("ignored.", 1, "192.0.2.1")]),
    );
    let cache = CacheResolver::new(
        "cache",
        upstream as Arc<dyn DnsResolver>,
        options(0, 0),
    );
    let client = make_client("127.0.0.1:40000");

    cache
        .resolve(&make_query("a.example.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(cache.len(), 1);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    let outcome = cache.sweep_expired();
    assert_eq!(outcome.removed, 1);
    assert_eq!(outcome.remaining, 0);
    assert!(cache.is_empty());
}
