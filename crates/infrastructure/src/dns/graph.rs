//! Builds the resolver DAG from its declarative description.
//!
//! Leaves (upstream resolvers) are instantiated first. Groups and routers
//! reference other nodes by id, in any order and with forward references,
//! so they are built by a fixed-point loop: each pass instantiates every
//! node whose dependencies already exist, and a pass that makes no
//! progress means a reference cycle or a dangling id. This is the only
//! module that knows the kind → constructor mapping and the per-kind
//! arity and option rules.

use super::blocklist::{
    CidrDb, DomainDb, FileLoader, HostsDb, HttpLoader, MultiDb, MultiIpDb, RegexpDb, StaticLoader,
    SwappableDb, SwappableIpDb,
};
use super::bootstrap::NameLookup;
use super::message;
use super::resolver::{
    Blocklist, BlocklistOptions, CacheOptions, CacheResolver, ClientBlocklist, DropResolver,
    EcsModifier, EcsOp, Edns0Modifier, Edns0Op, FailBack, FailRotate, Random, RateLimiter,
    RateLimiterOptions, Replace, ReplaceRule, ResponseBlocklistIp, ResponseBlocklistName,
    ResponseCollapse, ResponseMinimize, Route, Router, RoundRobin, StaticResolver,
    StaticResolverOptions, TtlModifier, UpstreamResolver,
};
use super::resolver::{ecs_modifier, edns0_modifier, fail_back, rate_limiter};
use conduit_dns_application::ports::{
    BlocklistDb, CacheMaintenancePort, DnsResolver, IpBlocklistDb, RefreshPort, RuleLoader,
};
use conduit_dns_domain::{
    Config, ConfigError, GroupSpec, ListSpec, ResolverSpec, RouterSpec, UpstreamEndpoint,
};
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// The assembled pipeline: every node by id, plus the background-work
/// handles the job runner drives.
pub struct Graph {
    pub resolvers: HashMap<String, Arc<dyn DnsResolver>>,
    pub refresh_ports: Vec<Arc<dyn RefreshPort>>,
    pub cache_ports: Vec<Arc<dyn CacheMaintenancePort>>,
    pub bootstrap: Option<Arc<NameLookup>>,
}

pub async fn assemble(config: &Config) -> Result<Graph, ConfigError> {
    check_unique_ids(config)?;

    let bootstrap = match &config.bootstrap_resolver {
        Some(spec) => {
            let resolver = build_upstream("bootstrap-resolver", spec, None)?;
            Some(Arc::new(NameLookup::new(resolver)))
        }
        None => None,
    };

    let mut graph = Graph {
        resolvers: HashMap::new(),
        refresh_ports: Vec::new(),
        cache_ports: Vec::new(),
        bootstrap,
    };

    for (id, spec) in &config.resolvers {
        let resolver = build_upstream(id, spec, graph.bootstrap.clone())?;
        graph.resolvers.insert(id.clone(), resolver);
    }

    // Ids every group and router waits on, including the auxiliary
    // references (sinkholes, limit resolvers).
    let mut pending: HashMap<&str, Vec<&str>> = HashMap::new();
    for (id, spec) in &config.groups {
        pending.insert(id, group_dependencies(spec));
    }
    for (id, spec) in &config.routers {
        pending.insert(
            id,
            spec.routes.iter().map(|r| r.resolver.as_str()).collect(),
        );
    }

    let all_ids: HashSet<&str> = config
        .resolvers
        .keys()
        .chain(config.groups.keys())
        .chain(config.routers.keys())
        .map(String::as_str)
        .collect();

    while !pending.is_empty() {
        let ready: Vec<&str> = pending
            .iter()
            .filter(|(_, deps)| deps.iter().all(|dep| graph.resolvers.contains_key(*dep)))
            .map(|(id, _)| *id)
            .collect();

        if ready.is_empty() {
            // No progress: tell a dangling reference apart from a cycle.
            for (id, deps) in &pending {
                for dep in deps {
                    if !all_ids.contains(dep) {
                        return Err(ConfigError::UnresolvedDependency {
                            id: id.to_string(),
                            reference: dep.to_string(),
                        });
                    }
                }
            }
            let mut stuck: Vec<&str> = pending.keys().copied().collect();
            stuck.sort_unstable();
            return Err(ConfigError::DependencyCycle(stuck.join(", ")));
        }

        for id in ready {
            if let Some(spec) = config.groups.get(id) {
                let resolver = instantiate_group(id, spec, &mut graph).await?;
                graph.resolvers.insert(id.to_string(), resolver);
            } else if let Some(spec) = config.routers.get(id) {
                let resolver = instantiate_router(id, spec, &graph)?;
                graph.resolvers.insert(id.to_string(), resolver);
            }
            pending.remove(id);
            debug!(id, "Node instantiated");
        }
    }

    info!(
        nodes = graph.resolvers.len(),
        refreshable = graph.refresh_ports.len(),
        caches = graph.cache_ports.len(),
        "Resolver graph assembled"
    );
    Ok(graph)
}

fn check_unique_ids(config: &Config) -> Result<(), ConfigError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for id in config
        .resolvers
        .keys()
        .chain(config.groups.keys())
        .chain(config.routers.keys())
    {
        if !seen.insert(id) {
            return Err(ConfigError::DuplicateId(id.clone()));
        }
    }
    Ok(())
}

fn group_dependencies(spec: &GroupSpec) -> Vec<&str> {
    let mut deps: Vec<&str> = spec.resolvers.iter().map(String::as_str).collect();
    for aux in [
        &spec.blocklist_resolver,
        &spec.allowlist_resolver,
        &spec.limit_resolver,
    ]
    .into_iter()
    .flatten()
    {
        deps.push(aux);
    }
    deps
}

fn build_upstream(
    id: &str,
    spec: &ResolverSpec,
    bootstrap: Option<Arc<NameLookup>>,
) -> Result<Arc<dyn DnsResolver>, ConfigError> {
    let endpoint: UpstreamEndpoint =
        spec.address
            .parse()
            .map_err(|reason| ConfigError::InvalidEndpoint {
                id: id.to_string(),
                reason,
            })?;

    let mut upstream = UpstreamResolver::new(id, endpoint.clone()).with_bootstrap(bootstrap);

    if let Some(pin) = &spec.bootstrap_address {
        let ip: IpAddr = pin.parse().map_err(|e| ConfigError::InvalidEndpoint {
            id: id.to_string(),
            reason: format!("invalid bootstrap-address '{}': {}", pin, e),
        })?;
        if let Some((_, port)) = endpoint.unresolved_parts() {
            upstream = upstream.with_pinned_addr(SocketAddr::new(ip, port));
        }
    }

    Ok(Arc::new(upstream))
}

fn children_of(
    id: &str,
    names: &[String],
    graph: &Graph,
) -> Result<Vec<Arc<dyn DnsResolver>>, ConfigError> {
    names
        .iter()
        .map(|name| {
            graph
                .resolvers
                .get(name)
                .cloned()
                .ok_or_else(|| ConfigError::UnresolvedDependency {
                    id: id.to_string(),
                    reference: name.clone(),
                })
        })
        .collect()
}

fn one_child(
    id: &str,
    kind: &str,
    mut children: Vec<Arc<dyn DnsResolver>>,
) -> Result<Arc<dyn DnsResolver>, ConfigError> {
    if children.len() != 1 {
        return Err(ConfigError::Arity {
            id: id.to_string(),
            kind: kind.to_string(),
            expected: "exactly one resolver",
        });
    }
    Ok(children.remove(0))
}

fn at_least_one(
    id: &str,
    kind: &str,
    children: &[Arc<dyn DnsResolver>],
) -> Result<(), ConfigError> {
    if children.is_empty() {
        return Err(ConfigError::Arity {
            id: id.to_string(),
            kind: kind.to_string(),
            expected: "at least one resolver",
        });
    }
    Ok(())
}

fn optional_ref(
    id: &str,
    graph: &Graph,
    name: &Option<String>,
) -> Result<Option<Arc<dyn DnsResolver>>, ConfigError> {
    match name {
        Some(name) => graph
            .resolvers
            .get(name)
            .cloned()
            .map(Some)
            .ok_or_else(|| ConfigError::UnresolvedDependency {
                id: id.to_string(),
                reference: name.clone(),
            }),
        None => Ok(None),
    }
}

fn refresh_interval(secs: Option<u64>) -> Option<Duration> {
    secs.filter(|s| *s > 0).map(Duration::from_secs)
}

fn build_loader(source: &str, cache_dir: Option<&str>) -> Arc<dyn RuleLoader> {
    if source.starts_with("http://") || source.starts_with("https://") {
        Arc::new(HttpLoader::new(
            source,
            cache_dir.map(std::path::PathBuf::from),
        ))
    } else {
        Arc::new(FileLoader::new(source))
    }
}

async fn build_name_db(
    id: &str,
    format: Option<&str>,
    loader: Arc<dyn RuleLoader>,
) -> Result<Arc<dyn BlocklistDb>, ConfigError> {
    let list_error = |e: conduit_dns_domain::ResolveError| ConfigError::ListSource {
        id: id.to_string(),
        reason: e.to_string(),
    };
    match format.unwrap_or("regexp") {
        "regexp" => Ok(Arc::new(RegexpDb::load(loader).await.map_err(list_error)?)),
        "domain" => Ok(Arc::new(DomainDb::load(loader).await.map_err(list_error)?)),
        "hosts" => Ok(Arc::new(HostsDb::load(loader).await.map_err(list_error)?)),
        other => Err(ConfigError::ListSource {
            id: id.to_string(),
            reason: format!("unsupported list format '{}'", other),
        }),
    }
}

async fn build_ip_db(
    id: &str,
    format: Option<&str>,
    loader: Arc<dyn RuleLoader>,
) -> Result<Arc<dyn IpBlocklistDb>, ConfigError> {
    match format.unwrap_or("cidr") {
        "cidr" => Ok(Arc::new(CidrDb::load(loader).await.map_err(|e| {
            ConfigError::ListSource {
                id: id.to_string(),
                reason: e.to_string(),
            }
        })?)),
        other => Err(ConfigError::ListSource {
            id: id.to_string(),
            reason: format!("unsupported IP list format '{}'", other),
        }),
    }
}

/// Name database from either inline rules or a list of sources; the two
/// are mutually exclusive.
async fn name_db_from_spec(
    id: &str,
    what: &str,
    inline: &[String],
    inline_format: Option<&str>,
    sources: &[ListSpec],
) -> Result<Option<Arc<dyn BlocklistDb>>, ConfigError> {
    if !inline.is_empty() && !sources.is_empty() {
        return Err(ConfigError::OptionConflict {
            id: id.to_string(),
            reason: format!("static {} rules can't be combined with sources", what),
        });
    }
    if !inline.is_empty() {
        let loader = Arc::new(StaticLoader::new(inline.to_vec()));
        return Ok(Some(build_name_db(id, inline_format, loader).await?));
    }
    if sources.is_empty() {
        return Ok(None);
    }
    let mut members = Vec::with_capacity(sources.len());
    for source in sources {
        let loader = build_loader(&source.source, source.cache_dir.as_deref());
        members.push(build_name_db(id, source.format.as_deref(), loader).await?);
    }
    Ok(Some(if members.len() == 1 {
        members.remove(0)
    } else {
        Arc::new(MultiDb::new(members))
    }))
}

async fn ip_db_from_spec(
    id: &str,
    what: &str,
    inline: &[String],
    inline_format: Option<&str>,
    sources: &[ListSpec],
) -> Result<Option<Arc<dyn IpBlocklistDb>>, ConfigError> {
    if !inline.is_empty() && !sources.is_empty() {
        return Err(ConfigError::OptionConflict {
            id: id.to_string(),
            reason: format!("static {} rules can't be combined with sources", what),
        });
    }
    if !inline.is_empty() {
        let loader = Arc::new(StaticLoader::new(inline.to_vec()));
        return Ok(Some(build_ip_db(id, inline_format, loader).await?));
    }
    if sources.is_empty() {
        return Ok(None);
    }
    let mut members = Vec::with_capacity(sources.len());
    for source in sources {
        let loader = build_loader(&source.source, source.cache_dir.as_deref());
        members.push(build_ip_db(id, source.format.as_deref(), loader).await?);
    }
    Ok(Some(if members.len() == 1 {
        members.remove(0)
    } else {
        Arc::new(MultiIpDb::new(members))
    }))
}

fn missing_list(id: &str, what: &str) -> ConfigError {
    ConfigError::OptionConflict {
        id: id.to_string(),
        reason: format!("no {} rules or sources configured", what),
    }
}

async fn instantiate_group(
    id: &str,
    spec: &GroupSpec,
    graph: &mut Graph,
) -> Result<Arc<dyn DnsResolver>, ConfigError> {
    let children = children_of(id, &spec.resolvers, graph)?;
    let reset_after = spec
        .reset_after
        .map(Duration::from_secs)
        .unwrap_or(fail_back::DEFAULT_RESET_AFTER);

    match spec.kind.as_str() {
        "round-robin" => {
            at_least_one(id, &spec.kind, &children)?;
            Ok(Arc::new(RoundRobin::new(id, children)))
        }
        "fail-rotate" => {
            at_least_one(id, &spec.kind, &children)?;
            Ok(Arc::new(FailRotate::new(id, children)))
        }
        "fail-back" => {
            at_least_one(id, &spec.kind, &children)?;
            Ok(Arc::new(FailBack::new(id, reset_after, children)))
        }
        "random" => {
            at_least_one(id, &spec.kind, &children)?;
            Ok(Arc::new(Random::new(id, reset_after, children)))
        }
        "cache" => {
            let child = one_child(id, &spec.kind, children)?;
            let options = CacheOptions {
                gc_period: Duration::from_secs(spec.gc_period.unwrap_or(60).max(1)),
                capacity: spec.cache_size.unwrap_or(0),
                negative_ttl: spec.negative_ttl.unwrap_or(0),
            };
            let cache = Arc::new(CacheResolver::new(id, child, options));
            graph.cache_ports.push(cache.clone());
            Ok(cache)
        }
        "blocklist" => {
            let child = one_child(id, &spec.kind, children)?;
            if !spec.blocklist.is_empty() && spec.source.is_some() {
                return Err(ConfigError::OptionConflict {
                    id: id.to_string(),
                    reason: "static blocklist can't be combined with 'source'".to_string(),
                });
            }
            let db = if !spec.blocklist.is_empty() {
                let loader = Arc::new(StaticLoader::new(spec.blocklist.clone()));
                build_name_db(id, spec.format.as_deref(), loader).await?
            } else {
                let source = spec.source.as_deref().ok_or_else(|| missing_list(id, "block"))?;
                build_name_db(id, spec.format.as_deref(), build_loader(source, None)).await?
            };
            let swap = Arc::new(SwappableDb::new(
                format!("{}-blocklist", id),
                db,
                refresh_interval(spec.refresh),
            ));
            let stage = Arc::new(Blocklist::new(id, child, swap, BlocklistOptions::default()));
            graph.refresh_ports.extend(stage.refresh_ports());
            Ok(stage)
        }
        "blocklist-v2" => {
            let child = one_child(id, &spec.kind, children)?;
            let block_db = name_db_from_spec(
                id,
                "blocklist",
                &spec.blocklist,
                spec.blocklist_format.as_deref(),
                &spec.blocklist_source,
            )
            .await?
            .ok_or_else(|| missing_list(id, "block"))?;
            let allow_db = name_db_from_spec(
                id,
                "allowlist",
                &spec.allowlist,
                spec.blocklist_format.as_deref(),
                &spec.allowlist_source,
            )
            .await?;

            let blocklist = Arc::new(SwappableDb::new(
                format!("{}-blocklist", id),
                block_db,
                refresh_interval(spec.blocklist_refresh),
            ));
            let options = BlocklistOptions {
                block_resolver: optional_ref(id, graph, &spec.blocklist_resolver)?,
                allowlist: allow_db.map(|db| {
                    Arc::new(SwappableDb::new(
                        format!("{}-allowlist", id),
                        db,
                        refresh_interval(spec.allowlist_refresh),
                    ))
                }),
                allow_resolver: optional_ref(id, graph, &spec.allowlist_resolver)?,
            };
            let stage = Arc::new(Blocklist::new(id, child, blocklist, options));
            graph.refresh_ports.extend(stage.refresh_ports());
            Ok(stage)
        }
        "response-blocklist-name" => {
            let child = one_child(id, &spec.kind, children)?;
            let db = name_db_from_spec(
                id,
                "blocklist",
                &spec.blocklist,
                spec.blocklist_format.as_deref(),
                &spec.blocklist_source,
            )
            .await?
            .ok_or_else(|| missing_list(id, "block"))?;
            let swap = Arc::new(SwappableDb::new(
                format!("{}-blocklist", id),
                db,
                refresh_interval(spec.blocklist_refresh),
            ));
            let stage = Arc::new(ResponseBlocklistName::new(
                id,
                child,
                swap,
                optional_ref(id, graph, &spec.blocklist_resolver)?,
            ));
            graph.refresh_ports.extend(stage.refresh_ports());
            Ok(stage)
        }
        "response-blocklist-ip" => {
            let child = one_child(id, &spec.kind, children)?;
            let db = ip_db_from_spec(
                id,
                "blocklist",
                &spec.blocklist,
                spec.blocklist_format.as_deref(),
                &spec.blocklist_source,
            )
            .await?
            .ok_or_else(|| missing_list(id, "block"))?;
            let swap = Arc::new(SwappableIpDb::new(
                format!("{}-blocklist", id),
                db,
                refresh_interval(spec.blocklist_refresh),
            ));
            let stage = Arc::new(ResponseBlocklistIp::new(
                id,
                child,
                swap,
                optional_ref(id, graph, &spec.blocklist_resolver)?,
                spec.filter,
            ));
            graph.refresh_ports.extend(stage.refresh_ports());
            Ok(stage)
        }
        "client-blocklist" => {
            let child = one_child(id, &spec.kind, children)?;
            let db = ip_db_from_spec(
                id,
                "blocklist",
                &spec.blocklist,
                spec.blocklist_format.as_deref(),
                &spec.blocklist_source,
            )
            .await?
            .ok_or_else(|| missing_list(id, "block"))?;
            let swap = Arc::new(SwappableIpDb::new(
                format!("{}-blocklist", id),
                db,
                refresh_interval(spec.blocklist_refresh),
            ));
            let stage = Arc::new(ClientBlocklist::new(
                id,
                child,
                swap,
                optional_ref(id, graph, &spec.blocklist_resolver)?,
            ));
            graph.refresh_ports.extend(stage.refresh_ports());
            Ok(stage)
        }
        "rate-limiter" => {
            let child = one_child(id, &spec.kind, children)?;
            let requests = spec.requests.ok_or_else(|| ConfigError::OptionConflict {
                id: id.to_string(),
                reason: "rate-limiter requires 'requests'".to_string(),
            })?;
            let options = RateLimiterOptions {
                requests,
                window: spec.window.unwrap_or(rate_limiter::DEFAULT_WINDOW_SECS),
                prefix4: spec.prefix4.unwrap_or(rate_limiter::DEFAULT_PREFIX4),
                prefix6: spec.prefix6.unwrap_or(rate_limiter::DEFAULT_PREFIX6),
            };
            Ok(Arc::new(RateLimiter::new(
                id,
                child,
                optional_ref(id, graph, &spec.limit_resolver)?,
                options,
            )))
        }
        "ttl-modifier" => {
            let child = one_child(id, &spec.kind, children)?;
            Ok(Arc::new(TtlModifier::new(
                id,
                child,
                spec.ttl_min.unwrap_or(0),
                spec.ttl_max.unwrap_or(0),
            )))
        }
        "ecs-modifier" => {
            let child = one_child(id, &spec.kind, children)?;
            let prefix4 = spec.ecs_prefix4.unwrap_or(ecs_modifier::DEFAULT_PREFIX4);
            let prefix6 = spec.ecs_prefix6.unwrap_or(ecs_modifier::DEFAULT_PREFIX6);
            let op = match spec.ecs_op.as_deref() {
                Some("add") => EcsOp::Add {
                    address: spec.ecs_address,
                    prefix4,
                    prefix6,
                },
                Some("delete") => EcsOp::Delete,
                Some("privacy") => EcsOp::Privacy { prefix4, prefix6 },
                other => {
                    return Err(ConfigError::OptionConflict {
                        id: id.to_string(),
                        reason: format!(
                            "unsupported ecs-modifier operation '{}'",
                            other.unwrap_or("")
                        ),
                    })
                }
            };
            Ok(Arc::new(EcsModifier::new(id, child, op)))
        }
        "edns0-modifier" => {
            let child = one_child(id, &spec.kind, children)?;
            let code = spec.edns0_code.ok_or_else(|| ConfigError::OptionConflict {
                id: id.to_string(),
                reason: "edns0-modifier requires 'edns0-code'".to_string(),
            })?;
            let op = match spec.edns0_op.as_deref() {
                Some("add") => {
                    let data = edns0_modifier::parse_hex_data(
                        spec.edns0_data.as_deref().unwrap_or(""),
                    )
                    .map_err(|reason| ConfigError::OptionConflict {
                        id: id.to_string(),
                        reason,
                    })?;
                    Edns0Op::Add { code, data }
                }
                Some("delete") => Edns0Op::Delete { code },
                other => {
                    return Err(ConfigError::OptionConflict {
                        id: id.to_string(),
                        reason: format!(
                            "unsupported edns0-modifier operation '{}'",
                            other.unwrap_or("")
                        ),
                    })
                }
            };
            Ok(Arc::new(Edns0Modifier::new(id, child, op)))
        }
        "replace" => {
            let child = one_child(id, &spec.kind, children)?;
            let mut rules = Vec::with_capacity(spec.replace.len());
            for rule in &spec.replace {
                rules.push(ReplaceRule::compile(&rule.from, &rule.to).map_err(|reason| {
                    ConfigError::InvalidPattern {
                        id: id.to_string(),
                        pattern: rule.from.clone(),
                        reason,
                    }
                })?);
            }
            Ok(Arc::new(Replace::new(id, child, rules)))
        }
        "response-minimize" => {
            let child = one_child(id, &spec.kind, children)?;
            Ok(Arc::new(ResponseMinimize::new(id, child)))
        }
        "response-collapse" => {
            let child = one_child(id, &spec.kind, children)?;
            let null_rcode = match spec.null_rcode {
                Some(value) => Some(message::rcode_from_u16(value).ok_or_else(|| {
                    ConfigError::OptionConflict {
                        id: id.to_string(),
                        reason: format!("unsupported null-rcode {}", value),
                    }
                })?),
                None => None,
            };
            Ok(Arc::new(ResponseCollapse::new(id, child, null_rcode)))
        }
        "static-responder" => {
            if !children.is_empty() {
                return Err(ConfigError::Arity {
                    id: id.to_string(),
                    kind: spec.kind.clone(),
                    expected: "no resolvers",
                });
            }
            let options = StaticResolverOptions {
                answer: spec.answer.clone(),
                ns: spec.ns.clone(),
                extra: spec.extra.clone(),
                rcode: spec.rcode,
            };
            let stage = StaticResolver::new(id, options).map_err(|reason| {
                ConfigError::InvalidRecord {
                    id: id.to_string(),
                    value: String::new(),
                    reason,
                }
            })?;
            Ok(Arc::new(stage))
        }
        "drop" => {
            if !children.is_empty() {
                return Err(ConfigError::Arity {
                    id: id.to_string(),
                    kind: spec.kind.clone(),
                    expected: "no resolvers",
                });
            }
            Ok(Arc::new(DropResolver::new(id)))
        }
        other => Err(ConfigError::UnknownKind {
            id: id.to_string(),
            kind: other.to_string(),
        }),
    }
}

fn instantiate_router(
    id: &str,
    spec: &RouterSpec,
    graph: &Graph,
) -> Result<Arc<dyn DnsResolver>, ConfigError> {
    let mut routes = Vec::with_capacity(spec.routes.len());
    for route_spec in &spec.routes {
        let target = graph
            .resolvers
            .get(&route_spec.resolver)
            .cloned()
            .ok_or_else(|| ConfigError::UnresolvedDependency {
                id: id.to_string(),
                reference: route_spec.resolver.clone(),
            })?;
        let route = Route::compile(route_spec, target).map_err(|reason| {
            ConfigError::InvalidPattern {
                id: id.to_string(),
                pattern: route_spec.name.clone().unwrap_or_default(),
                reason,
            }
        })?;
        routes.push(route);
    }
    Ok(Arc::new(Router::new(id, routes)))
}
