mod helpers;

use conduit_dns_application::ports::DnsResolver;
use conduit_dns_infrastructure::dns::blocklist::{
    CidrDb, DomainDb, StaticLoader, SwappableDb, SwappableIpDb,
};
use conduit_dns_infrastructure::dns::resolver::{
    ClientBlocklist, ResponseBlocklistIp, ResponseBlocklistName,
};
use helpers::{make_client, make_query, MockBehavior, MockResolver};
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RecordType;
use std::sync::Arc;

async fn cidr_swap(rules: &[&str]) -> Arc<SwappableIpDb> {
    let loader = Arc::new(StaticLoader::new(
        rules.iter().map(|s| s.to_string()).collect(),
    ));
    let db = Arc::new(CidrDb::load(loader).await.unwrap());
    Arc::new(SwappableIpDb::new("ip-bl", db, None))
}

#[tokio::test]
async fn filter_mode_strips_only_offending_records() {
    let upstream = MockResolver::new(
        "up",
        MockBehavior::Answer(vec![
            helpers::a_record("ignored.", 60, "192.0.2.1"),
            helpers::a_record("ignored.", 60, "198.51.100.7"),
        ]),
    );
    let stage = ResponseBlocklistIp::new(
        "rbl",
        upstream as Arc<dyn DnsResolver>,
        cidr_swap(&["198.51.100.0/24"]).await,
        None,
        true,
    );
    let client = make_client("127.0.0.1:40000");

    let response = stage
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert_eq!(helpers::answer_addrs(&response), vec!["192.0.2.1"]);
}

#[tokio::test]
async fn filter_mode_with_nothing_left_returns_nxdomain() {
    let upstream = MockResolver::new(
        "up",
        MockBehavior::Answer(vec![
            helpers::a_record("ignored.", 60, "198.51.100.1"),
            helpers::a_record("ignored.", 60, "198.51.100.2"),
        ]),
    );
    let stage = ResponseBlocklistIp::new(
        "rbl",
        upstream as Arc<dyn DnsResolver>,
        cidr_swap(&["198.51.100.0/24"]).await,
        None,
        true,
    );
    let client = make_client("127.0.0.1:40000");

    let response = stage
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(response.response_code(), ResponseCode::NXDomain);
    assert!(response.answers().is_empty());
}

#[tokio::test]
async fn whole_response_condemned_outside_filter_mode() {
    let upstream = MockResolver::new(
        "up",
        MockBehavior::Answer(vec![
            helpers::a_record("ignored.", 60, "192.0.2.1"),
            helpers::a_record("ignored.", 60, "198.51.100.7"),
        ]),
    );
    let stage = ResponseBlocklistIp::new(
        "rbl",
        upstream as Arc<dyn DnsResolver>,
        cidr_swap(&["198.51.100.0/24"]).await,
        None,
        false,
    );
    let client = make_client("127.0.0.1:40000");

    let response = stage
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(response.response_code(), ResponseCode::NXDomain);
    assert!(response.answers().is_empty());
}

#[tokio::test]
async fn clean_responses_pass_unchanged() {
    let upstream = MockResolver::new(
        "up",
        MockBehavior::Answer(vec![helpers::a_record("ignored.", 60, "192.0.2.1")]),
    );
    let stage = ResponseBlocklistIp::new(
        "rbl",
        upstream as Arc<dyn DnsResolver>,
        cidr_swap(&["198.51.100.0/24"]).await,
        None,
        false,
    );
    let client = make_client("127.0.0.1:40000");

    let response = stage
        .resolve(&make_query("example.com.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(helpers::answer_addrs(&response), vec!["192.0.2.1"]);
}

#[tokio::test]
async fn cname_target_in_answer_is_blocked_by_name() {
    let upstream = MockResolver::new(
        "up",
        MockBehavior::AnswerVerbatim(vec![
            helpers::cname_record("clean.example.", 60, "cdn.tracker.example."),
            helpers::a_record("cdn.tracker.example.", 60, "192.0.2.1"),
        ]),
    );
    let loader = Arc::new(StaticLoader::new(vec!["tracker.example".into()]));
    let db = Arc::new(DomainDb::load(loader).await.unwrap());
    let stage = ResponseBlocklistName::new(
        "rbl-name",
        upstream as Arc<dyn DnsResolver>,
        Arc::new(SwappableDb::new("bl", db, None)),
        None,
    );
    let client = make_client("127.0.0.1:40000");

    let response = stage
        .resolve(&make_query("clean.example.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(response.response_code(), ResponseCode::NXDomain);
}

#[tokio::test]
async fn client_blocklist_refuses_before_the_child_is_consulted() {
    let upstream = MockResolver::answering("up", "192.0.2.1");
    let stage = ClientBlocklist::new(
        "cbl",
        upstream.clone() as Arc<dyn DnsResolver>,
        cidr_swap(&["10.0.0.0/8"]).await,
        None,
    );

    let refused = stage
        .resolve(
            &make_query("example.com.", RecordType::A),
            &make_client("10.1.2.3:50000"),
        )
        .await
        .unwrap();
    assert_eq!(refused.response_code(), ResponseCode::Refused);
    assert_eq!(upstream.call_count(), 0);

    let allowed = stage
        .resolve(
            &make_query("example.com.", RecordType::A),
            &make_client("192.0.2.10:50000"),
        )
        .await
        .unwrap();
    assert_eq!(helpers::answer_addrs(&allowed), vec!["192.0.2.1"]);
}
