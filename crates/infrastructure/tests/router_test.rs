mod helpers;

use conduit_dns_application::ports::DnsResolver;
use conduit_dns_infrastructure::dns::resolver::{Route, Router};
use conduit_dns_domain::RouteSpec;
use helpers::{make_client, make_query, MockResolver};
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RecordType;
use std::sync::Arc;

fn route(spec: RouteSpec, target: Arc<MockResolver>) -> Route {
    Route::compile(&spec, target as Arc<dyn DnsResolver>).unwrap()
}

#[tokio::test]
async fn first_matching_route_wins() {
    let by_type = MockResolver::answering("by-type", "192.0.2.1");
    let catch_all = MockResolver::answering("catch-all", "192.0.2.2");

    let router = Router::new(
        "router",
        vec![
            route(
                RouteSpec {
                    types: vec!["AAAA".into()],
                    resolver: "by-type".into(),
                    ..Default::default()
                },
                by_type.clone(),
            ),
            route(
                RouteSpec {
                    name: Some(".*".into()),
                    resolver: "catch-all".into(),
                    ..Default::default()
                },
                catch_all.clone(),
            ),
        ],
    );
    let client = make_client("127.0.0.1:40000");

    router
        .resolve(&make_query("a.com.", RecordType::AAAA), &client)
        .await
        .unwrap();
    assert_eq!(by_type.call_count(), 1);
    assert_eq!(catch_all.call_count(), 0);

    router
        .resolve(&make_query("a.com.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(catch_all.call_count(), 1);
}

#[tokio::test]
async fn name_pattern_matches_fqdn() {
    let internal = MockResolver::answering("internal", "192.0.2.1");
    let router = Router::new(
        "router",
        vec![route(
            RouteSpec {
                name: Some(r"(^|\.)corp\.example\.$".into()),
                resolver: "internal".into(),
                ..Default::default()
            },
            internal.clone(),
        )],
    );
    let client = make_client("127.0.0.1:40000");

    router
        .resolve(&make_query("host.corp.example.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(internal.call_count(), 1);

    let response = router
        .resolve(&make_query("corp.example.com.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(response.response_code(), ResponseCode::Refused);
}

#[tokio::test]
async fn no_match_returns_refused() {
    let target = MockResolver::answering("target", "192.0.2.1");
    let router = Router::new(
        "router",
        vec![route(
            RouteSpec {
                types: vec!["MX".into()],
                resolver: "target".into(),
                ..Default::default()
            },
            target.clone(),
        )],
    );
    let client = make_client("127.0.0.1:40000");

    let query = make_query("a.com.", RecordType::A);
    let response = router.resolve(&query, &client).await.unwrap();
    assert_eq!(response.response_code(), ResponseCode::Refused);
    assert_eq!(response.id(), query.id());
    assert_eq!(target.call_count(), 0);
}

#[tokio::test]
async fn invert_negates_the_whole_predicate() {
    let others = MockResolver::answering("others", "192.0.2.1");
    let router = Router::new(
        "router",
        vec![route(
            RouteSpec {
                name: Some(r"\.internal\.$".into()),
                invert: true,
                resolver: "others".into(),
                ..Default::default()
            },
            others.clone(),
        )],
    );
    let client = make_client("127.0.0.1:40000");

    router
        .resolve(&make_query("www.example.com.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(others.call_count(), 1);

    let response = router
        .resolve(&make_query("host.internal.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(response.response_code(), ResponseCode::Refused);
}

#[tokio::test]
async fn source_cidr_matches_client_address() {
    let lan = MockResolver::answering("lan", "192.0.2.1");
    let router = Router::new(
        "router",
        vec![route(
            RouteSpec {
                source: Some("10.0.0.0/8".into()),
                resolver: "lan".into(),
                ..Default::default()
            },
            lan.clone(),
        )],
    );

    router
        .resolve(
            &make_query("a.com.", RecordType::A),
            &make_client("10.1.2.3:53000"),
        )
        .await
        .unwrap();
    assert_eq!(lan.call_count(), 1);

    let response = router
        .resolve(
            &make_query("a.com.", RecordType::A),
            &make_client("192.0.2.99:53000"),
        )
        .await
        .unwrap();
    assert_eq!(response.response_code(), ResponseCode::Refused);
}

#[test]
fn deprecated_singular_type_merges_and_dedups() {
    let target = MockResolver::answering("t", "192.0.2.1");
    let spec = RouteSpec {
        query_type: Some("A".into()),
        types: vec!["A".into(), "AAAA".into()],
        resolver: "t".into(),
        ..Default::default()
    };
    // Compiles fine; duplicate "A" collapses.
    Route::compile(&spec, target as Arc<dyn DnsResolver>).unwrap();
}

#[test]
fn bad_patterns_fail_compilation() {
    let target = MockResolver::answering("t", "192.0.2.1");
    let spec = RouteSpec {
        name: Some("(unclosed".into()),
        resolver: "t".into(),
        ..Default::default()
    };
    assert!(Route::compile(&spec, target.clone() as Arc<dyn DnsResolver>).is_err());

    let spec = RouteSpec {
        source: Some("10.0.0.0/99".into()),
        resolver: "t".into(),
        ..Default::default()
    };
    assert!(Route::compile(&spec, target as Arc<dyn DnsResolver>).is_err());
}
