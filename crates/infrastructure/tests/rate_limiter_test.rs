mod helpers;

use conduit_dns_application::ports::DnsResolver;
use conduit_dns_infrastructure::dns::resolver::{RateLimiter, RateLimiterOptions};
use helpers::{make_client, make_query, MockResolver};
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RecordType;
use std::sync::Arc;

fn options(requests: u64, prefix4: u8) -> RateLimiterOptions {
    RateLimiterOptions {
        requests,
        window: 60,
        prefix4,
        prefix6: 56,
    }
}

#[tokio::test]
async fn over_limit_queries_are_refused() {
    let upstream = MockResolver::answering("up", "192.0.2.1");
    let limiter = RateLimiter::new(
        "rl",
        upstream.clone() as Arc<dyn DnsResolver>,
        None,
        options(2, 32),
    );
    let client = make_client("203.0.113.9:50000");

    for _ in 0..2 {
        let response = limiter
            .resolve(&make_query("example.com.", RecordType::A), &client)
            .await
            .unwrap();
        assert_eq!(response.response_code(), ResponseCode::NoError);
    }

    let third = limiter
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(third.response_code(), ResponseCode::Refused);
    assert_eq!(upstream.call_count(), 2);
}

#[tokio::test]
async fn limit_resolver_takes_over_limit_queries() {
    let upstream = MockResolver::answering("up", "192.0.2.1");
    let overflow = MockResolver::answering("overflow", "192.0.2.254");
    let limiter = RateLimiter::new(
        "rl",
        upstream as Arc<dyn DnsResolver>,
        Some(overflow.clone() as Arc<dyn DnsResolver>),
        options(1, 32),
    );
    let client = make_client("203.0.113.9:50000");

    limiter
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .unwrap();
    let second = limiter
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .unwrap();

    assert_eq!(helpers::answer_addrs(&second), vec!["192.0.2.254"]);
    assert_eq!(overflow.call_count(), 1);
}

#[tokio::test]
async fn prefix_masking_shares_a_budget_across_a_subnet() {
    let upstream = MockResolver::answering("up", "192.0.2.1");
    let limiter = RateLimiter::new(
        "rl",
        upstream.clone() as Arc<dyn DnsResolver>,
        None,
        options(2, 24),
    );

    // Two clients in the same /24 burn the shared budget.
    limiter
        .resolve(
            &make_query("example.com.", RecordType::A),
            &make_client("203.0.113.5:50000"),
        )
        .await
        .unwrap();
    limiter
        .resolve(
            &make_query("example.com.", RecordType::A),
            &make_client("203.0.113.200:50000"),
        )
        .await
        .unwrap();
    let refused = limiter
        .resolve(
            &make_query("example.com.", RecordType::A),
            &make_client("203.0.113.66:50000"),
        )
        .await
        .unwrap();
    assert_eq!(refused.response_code(), ResponseCode::Refused);

    // A client outside that /24 has its own budget.
    let other = limiter
        .resolve(
            &make_query("example.com.", RecordType::A),
            &make_client("198.51.100.1:50000"),
        )
        .await
        .unwrap();
    assert_eq!(other.response_code(), ResponseCode::NoError);
}

#[tokio::test]
async fn short_window_resets_the_budget() {
    let upstream = MockResolver::answering("up", "192.0.2.1");
    let limiter = RateLimiter::new(
        "rl",
        upstream.clone() as Arc<dyn DnsResolver>,
        None,
        RateLimiterOptions {
            requests: 1,
            window: 1,
            prefix4: 32,
            prefix6: 56,
        },
    );
    let client = make_client("203.0.113.9:50000");

    limiter
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .unwrap();
    let refused = limiter
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(refused.response_code(), ResponseCode::Refused);

    // Wait past the window boundary; the budget is fresh.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let allowed = limiter
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(allowed.response_code(), ResponseCode::NoError);
}
