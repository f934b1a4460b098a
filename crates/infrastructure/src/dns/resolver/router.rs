//! Routes queries to at most one child based on query attributes. Routes
//! are evaluated in declaration order, first match wins; a query matching
//! no route is answered with REFUSED.

use super::super::message;
use async_trait::async_trait;
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError, RouteSpec};
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{DNSClass, RecordType};
use ipnetwork::IpNetwork;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Route {
    name: Option<fancy_regex::Regex>,
    class: Option<DNSClass>,
    types: Vec<RecordType>,
    source: Option<IpNetwork>,
    invert: bool,
    resolver: Arc<dyn DnsResolver>,
}

impl Route {
    /// Compile a route definition. Empty predicate fields match
    /// everything; the deprecated singular `type` is folded into `types`.
    pub fn compile(spec: &RouteSpec, resolver: Arc<dyn DnsResolver>) -> Result<Self, String> {
        let name = match spec.name.as_deref().filter(|p| !p.is_empty()) {
            Some(pattern) => Some(
                fancy_regex::Regex::new(pattern)
                    .map_err(|e| format!("invalid name pattern '{}': {}", pattern, e))?,
            ),
            None => None,
        };

        let class = match spec.class.as_deref().filter(|c| !c.is_empty()) {
            Some(class) => Some(
                DNSClass::from_str(class).map_err(|e| format!("invalid class '{}': {}", class, e))?,
            ),
            None => None,
        };

        let mut type_names: Vec<&str> = spec.types.iter().map(String::as_str).collect();
        if let Some(single) = spec.query_type.as_deref().filter(|t| !t.is_empty()) {
            type_names.push(single);
        }
        let mut types = Vec::with_capacity(type_names.len());
        for type_name in type_names {
            let rt = RecordType::from_str(type_name)
                .map_err(|e| format!("invalid type '{}': {}", type_name, e))?;
            if !types.contains(&rt) {
                types.push(rt);
            }
        }

        let source = match spec.source.as_deref().filter(|s| !s.is_empty()) {
            Some(cidr) => Some(
                cidr.parse::<IpNetwork>()
                    .map_err(|e| format!("invalid source CIDR '{}': {}", cidr, e))?,
            ),
            None => None,
        };

        Ok(Self {
            name,
            class,
            types,
            source,
            invert: spec.invert,
            resolver,
        })
    }

    pub fn resolver(&self) -> &Arc<dyn DnsResolver> {
        &self.resolver
    }

    fn matches(&self, query: &Message, client: &ClientInfo) -> bool {
        let matched = self.matches_predicates(query, client);
        if self.invert {
            !matched
        } else {
            matched
        }
    }

    fn matches_predicates(&self, query: &Message, client: &ClientInfo) -> bool {
        let question = query.queries().first();

        if let Some(regex) = &self.name {
            let Some(question) = question else {
                return false;
            };
            let qname = {
                let mut name = question.name().to_lowercase().to_utf8();
                if !name.ends_with('.') {
                    name.push('.');
                }
                name
            };
            match regex.is_match(&qname) {
                Ok(true) => {}
                Ok(false) => return false,
                Err(e) => {
                    warn!(pattern = %regex.as_str(), error = %e, "Name pattern failed to evaluate");
                    return false;
                }
            }
        }

        if let Some(class) = self.class {
            match question {
                Some(q) if q.query_class() == class => {}
                _ => return false,
            }
        }

        if !self.types.is_empty() {
            match question {
                Some(q) if self.types.contains(&q.query_type()) => {}
                _ => return false,
            }
        }

        if let Some(network) = &self.source {
            if !network.contains(client.source_ip()) {
                return false;
            }
        }

        true
    }
}

pub struct Router {
    id: Arc<str>,
    routes: Vec<Route>,
}

impl Router {
    pub fn new(id: impl Into<Arc<str>>, routes: Vec<Route>) -> Self {
        Self {
            id: id.into(),
            routes,
        }
    }
}

#[async_trait]
impl DnsResolver for Router {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        for route in &self.routes {
            if route.matches(query, client) {
                debug!(resolver = %self.id, target = %route.resolver.id(), "Route matched");
                return route.resolver.resolve(query, client).await;
            }
        }
        debug!(resolver = %self.id, "No route matched, refusing");
        Ok(message::reply_with_rcode(query, ResponseCode::Refused))
    }
}
