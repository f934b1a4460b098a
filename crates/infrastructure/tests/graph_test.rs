mod helpers;

use conduit_dns_domain::{Config, ConfigError};
use conduit_dns_infrastructure::dns::{assemble, build_listeners};
use helpers::{make_client, make_query};
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RecordType;

fn config(toml: &str) -> Config {
    Config::from_str(toml, "test").unwrap()
}

#[tokio::test]
async fn assembles_forward_references() {
    // "router" references "blocked" and "upstreams", both declared later
    // in dependency terms; the fixed-point loop has to sort it out.
    let config = config(
        r#"
        [resolvers.up1]
        address = "udp://192.0.2.53:53"

        [groups.blocked]
        type = "static-responder"
        rcode = 3

        [groups.upstreams]
        type = "round-robin"
        resolvers = ["up1"]

        [routers.router]
        routes = [
            { types = ["AAAA"], resolver = "blocked" },
            { resolver = "upstreams" },
        ]
        "#,
    );

    let graph = assemble(&config).await.unwrap();
    assert_eq!(graph.resolvers.len(), 4);

    let router = graph.resolvers.get("router").unwrap();
    let response = router
        .resolve(
            &make_query("a.com.", RecordType::AAAA),
            &make_client("127.0.0.1:40000"),
        )
        .await
        .unwrap();
    assert_eq!(response.response_code(), ResponseCode::NXDomain);
}

#[tokio::test]
async fn nested_groups_resolve_in_any_declaration_order() {
    let config = config(
        r#"
        [groups.outer]
        type = "response-minimize"
        resolvers = ["middle"]

        [groups.middle]
        type = "ttl-modifier"
        resolvers = ["inner"]
        ttl-min = 60

        [groups.inner]
        type = "static-responder"
        answer = ["x. 5 IN A 192.0.2.1"]
        "#,
    );

    let graph = assemble(&config).await.unwrap();
    let outer = graph.resolvers.get("outer").unwrap();
    let response = outer
        .resolve(
            &make_query("www.example.com.", RecordType::A),
            &make_client("127.0.0.1:40000"),
        )
        .await
        .unwrap();
    assert_eq!(response.answers()[0].ttl(), 60, "ttl-modifier applied");
}

#[tokio::test]
async fn static_blocklist_end_to_end() {
    let config = config(
        r#"
        [groups.garden]
        type = "static-responder"
        answer = ["x. 3600 IN A 192.0.2.254"]

        [groups.ads]
        type = "blocklist-v2"
        resolvers = ["garden"]
        blocklist = ["ads.example"]
        blocklist-format = "domain"
        "#,
    );

    let graph = assemble(&config).await.unwrap();
    let ads = graph.resolvers.get("ads").unwrap();
    let client = make_client("127.0.0.1:40000");

    let blocked = ads
        .resolve(&make_query("ads.example.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(blocked.response_code(), ResponseCode::NXDomain);

    let clean = ads
        .resolve(&make_query("ok.example.", RecordType::A), &client)
        .await
        .unwrap();
    assert_eq!(helpers::answer_addrs(&clean), vec!["192.0.2.254"]);
}

#[tokio::test]
async fn refresh_and_cache_ports_are_collected() {
    let config = config(
        r#"
        [resolvers.up]
        address = "udp://192.0.2.53:53"

        [groups.cached]
        type = "cache"
        resolvers = ["up"]
        gc-period = 30

        [groups.ads]
        type = "blocklist-v2"
        resolvers = ["cached"]
        blocklist = ["ads.example"]
        blocklist-format = "domain"
        allowlist = ["good.ads.example"]
        "#,
    );

    let graph = assemble(&config).await.unwrap();
    assert_eq!(graph.cache_ports.len(), 1);
    assert_eq!(graph.refresh_ports.len(), 2, "blocklist and allowlist");
}

#[tokio::test]
async fn cycle_is_detected() {
    let config = config(
        r#"
        [groups.a]
        type = "round-robin"
        resolvers = ["b"]

        [groups.b]
        type = "round-robin"
        resolvers = ["a"]
        "#,
    );

    match assemble(&config).await {
        Err(ConfigError::DependencyCycle(ids)) => {
            assert!(ids.contains('a') && ids.contains('b'));
        }
        other => panic!("expected cycle error, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn dangling_reference_is_reported_as_such() {
    let config = config(
        r#"
        [groups.a]
        type = "round-robin"
        resolvers = ["ghost"]
        "#,
    );

    match assemble(&config).await {
        Err(ConfigError::UnresolvedDependency { id, reference }) => {
            assert_eq!(id, "a");
            assert_eq!(reference, "ghost");
        }
        other => panic!("expected unresolved dependency, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn duplicate_id_across_namespaces_is_rejected() {
    let config = config(
        r#"
        [resolvers.dup]
        address = "udp://192.0.2.53:53"

        [groups.dup]
        type = "drop"
        "#,
    );

    assert!(matches!(
        assemble(&config).await,
        Err(ConfigError::DuplicateId(_))
    ));
}

#[tokio::test]
async fn cache_requires_exactly_one_child() {
    let config = config(
        r#"
        [resolvers.up1]
        address = "udp://192.0.2.53:53"

        [resolvers.up2]
        address = "udp://192.0.2.54:53"

        [groups.cached]
        type = "cache"
        resolvers = ["up1", "up2"]
        "#,
    );

    assert!(matches!(
        assemble(&config).await,
        Err(ConfigError::Arity { .. })
    ));
}

#[tokio::test]
async fn static_rules_and_source_are_mutually_exclusive() {
    let config = config(
        r#"
        [resolvers.up]
        address = "udp://192.0.2.53:53"

        [groups.ads]
        type = "blocklist"
        resolvers = ["up"]
        blocklist = ["ads.example"]
        source = "/tmp/list.txt"
        "#,
    );

    assert!(matches!(
        assemble(&config).await,
        Err(ConfigError::OptionConflict { .. })
    ));
}

#[tokio::test]
async fn unknown_kind_is_rejected() {
    let config = config(
        r#"
        [groups.mystery]
        type = "quantum-resolver"
        "#,
    );

    assert!(matches!(
        assemble(&config).await,
        Err(ConfigError::UnknownKind { .. })
    ));
}

#[tokio::test]
async fn listener_must_reference_an_existing_resolver() {
    let config = config(
        r#"
        [resolvers.up]
        address = "udp://192.0.2.53:53"

        [listeners.local]
        address = "127.0.0.1:5300"
        protocol = "udp"
        resolver = "ghost"
        "#,
    );

    let graph = assemble(&config).await.unwrap();
    assert!(matches!(
        build_listeners(&config, &graph.resolvers),
        Err(ConfigError::UnresolvedDependency { .. })
    ));
}

#[tokio::test]
async fn listener_builds_with_allowed_net() {
    let config = config(
        r#"
        [resolvers.up]
        address = "udp://192.0.2.53:53"

        [listeners.local]
        address = "127.0.0.1:5300"
        protocol = "udp"
        resolver = "up"
        allowed-net = ["127.0.0.0/8", "::1/128"]
        "#,
    );

    let graph = assemble(&config).await.unwrap();
    let listeners = build_listeners(&config, &graph.resolvers).unwrap();
    assert_eq!(listeners.len(), 1);
    assert_eq!(listeners[0].id(), "local");
}

#[tokio::test]
async fn encrypted_listener_protocols_are_rejected() {
    let config = config(
        r#"
        [resolvers.up]
        address = "udp://192.0.2.53:53"

        [listeners.secure]
        address = "127.0.0.1:8853"
        protocol = "doh"
        resolver = "up"
        "#,
    );

    let graph = assemble(&config).await.unwrap();
    assert!(matches!(
        build_listeners(&config, &graph.resolvers),
        Err(ConfigError::Listener { .. })
    ));
}
