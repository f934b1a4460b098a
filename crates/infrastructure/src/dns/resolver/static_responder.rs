//! Leaf resolver answering every query from a fixed set of records,
//! typically the walled-garden target of a blocklist. Answer owner names
//! are rewritten to the query name so one responder serves any name
//! routed at it.

use super::super::message;
use async_trait::async_trait;
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA, CNAME, MX, NS, PTR, TXT};
use hickory_proto::rr::{Name, RData, Record};
use std::str::FromStr;
use std::sync::Arc;

const DEFAULT_TTL: u32 = 3600;

#[derive(Debug, Clone, Default)]
pub struct StaticResolverOptions {
    /// Zone-file style record strings, e.g. `"www.example.com. 300 IN A 192.0.2.1"`.
    pub answer: Vec<String>,
    pub ns: Vec<String>,
    pub extra: Vec<String>,
    /// Numeric RCODE; default NOERROR.
    pub rcode: Option<u16>,
}

pub struct StaticResolver {
    id: Arc<str>,
    answers: Vec<Record>,
    name_servers: Vec<Record>,
    additionals: Vec<Record>,
    rcode: ResponseCode,
}

impl StaticResolver {
    pub fn new(id: impl Into<Arc<str>>, options: StaticResolverOptions) -> Result<Self, String> {
        let parse_all = |strings: &[String]| -> Result<Vec<Record>, String> {
            strings.iter().map(|s| parse_record(s)).collect()
        };
        let rcode = match options.rcode {
            Some(value) => message::rcode_from_u16(value)
                .ok_or_else(|| format!("unsupported rcode {}", value))?,
            None => ResponseCode::NoError,
        };
        Ok(Self {
            id: id.into(),
            answers: parse_all(&options.answer)?,
            name_servers: parse_all(&options.ns)?,
            additionals: parse_all(&options.extra)?,
            rcode,
        })
    }
}

#[async_trait]
impl DnsResolver for StaticResolver {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(
        &self,
        query: &Message,
        _client: &ClientInfo,
    ) -> Result<Message, ResolveError> {
        let question = message::question(query)?;
        let qname = question.name().clone();

        let mut response = message::reply_with_rcode(query, self.rcode);
        response.set_authoritative(true);
        // Echo the client's OPT pseudo-record so EDNS0 queries get an
        // EDNS0 response.
        if let Some(edns) = query.extensions().as_ref() {
            *response.extensions_mut() = Some(edns.clone());
        }

        for record in &self.answers {
            let mut record = record.clone();
            record.set_name(qname.clone());
            response.add_answer(record);
        }
        for record in &self.name_servers {
            response.add_name_server(record.clone());
        }
        for record in &self.additionals {
            response.add_additional(record.clone());
        }
        Ok(response)
    }
}

/// Parse a zone-file style record string: `name [ttl] [class] type data`.
/// TTL defaults to one hour, the only supported class is IN.
fn parse_record(s: &str) -> Result<Record, String> {
    let mut tokens = s.split_whitespace().peekable();

    let name_str = tokens
        .next()
        .ok_or_else(|| format!("empty record string '{}'", s))?;
    let name =
        Name::from_str(name_str).map_err(|e| format!("invalid name '{}': {}", name_str, e))?;

    let mut ttl = DEFAULT_TTL;
    if let Some(tok) = tokens.peek() {
        if let Ok(parsed) = tok.parse::<u32>() {
            ttl = parsed;
            tokens.next();
        }
    }
    if let Some(tok) = tokens.peek() {
        if tok.eq_ignore_ascii_case("IN") {
            tokens.next();
        }
    }

    let type_str = tokens
        .next()
        .ok_or_else(|| format!("missing record type in '{}'", s))?;
    let data: Vec<&str> = tokens.collect();
    let first = || {
        data.first()
            .copied()
            .ok_or_else(|| format!("missing record data in '{}'", s))
    };

    let rdata = match type_str.to_ascii_uppercase().as_str() {
        "A" => RData::A(A(first()?
            .parse()
            .map_err(|e| format!("invalid A data in '{}': {}", s, e))?)),
        "AAAA" => RData::AAAA(AAAA(first()?
            .parse()
            .map_err(|e| format!("invalid AAAA data in '{}': {}", s, e))?)),
        "CNAME" => RData::CNAME(CNAME(
            Name::from_str(first()?).map_err(|e| format!("invalid CNAME data in '{}': {}", s, e))?,
        )),
        "NS" => RData::NS(NS(Name::from_str(first()?)
            .map_err(|e| format!("invalid NS data in '{}': {}", s, e))?)),
        "PTR" => RData::PTR(PTR(Name::from_str(first()?)
            .map_err(|e| format!("invalid PTR data in '{}': {}", s, e))?)),
        "TXT" => RData::TXT(TXT::new(
            data.iter().map(|t| t.trim_matches('"').to_string()).collect(),
        )),
        "MX" => {
            let preference: u16 = first()?
                .parse()
                .map_err(|e| format!("invalid MX preference in '{}': {}", s, e))?;
            let exchange = data
                .get(1)
                .ok_or_else(|| format!("missing MX exchange in '{}'", s))?;
            RData::MX(MX::new(
                preference,
                Name::from_str(exchange)
                    .map_err(|e| format!("invalid MX exchange in '{}': {}", s, e))?,
            ))
        }
        other => return Err(format!("unsupported record type '{}' in '{}'", other, s)),
    };

    Ok(Record::from_rdata(name, ttl, rdata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_dns_domain::ClientInfo;
    use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query};
    use hickory_proto::rr::RecordType;
    use std::net::SocketAddr;

    #[tokio::test]
    async fn echoes_the_query_edns() {
        let stage = StaticResolver::new(
            "static",
            StaticResolverOptions {
                answer: vec!["garden.example. 300 IN A 192.0.2.254".into()],
                ..Default::default()
            },
        )
        .unwrap();

        let mut query = Message::new(77, MessageType::Query, OpCode::Query);
        query.add_query(Query::query(
            Name::from_str("www.example.com.").unwrap(),
            RecordType::A,
        ));
        let mut edns = Edns::new();
        edns.set_max_payload(1232);
        edns.set_version(0);
        *query.extensions_mut() = Some(edns);

        let client = ClientInfo::new(
            "127.0.0.1:40000".parse::<SocketAddr>().unwrap(),
            "test-listener",
        );
        let response = stage.resolve(&query, &client).await.unwrap();

        let echoed = response
            .extensions()
            .as_ref()
            .expect("OPT record echoed on the response");
        assert_eq!(echoed.max_payload(), 1232);

        // A plain query still gets a plain response.
        let mut plain = Message::new(78, MessageType::Query, OpCode::Query);
        plain.add_query(Query::query(
            Name::from_str("www.example.com.").unwrap(),
            RecordType::A,
        ));
        let response = stage.resolve(&plain, &client).await.unwrap();
        assert!(response.extensions().is_none());
    }

    #[test]
    fn parses_full_record_string() {
        let record = parse_record("www.example.com. 300 IN A 192.0.2.1").unwrap();
        assert_eq!(record.record_type(), RecordType::A);
        assert_eq!(record.ttl(), 300);
    }

    #[test]
    fn ttl_and_class_are_optional() {
        let record = parse_record("gateway.example. A 192.0.2.53").unwrap();
        assert_eq!(record.ttl(), DEFAULT_TTL);

        let record = parse_record("gateway.example. IN AAAA 2001:db8::1").unwrap();
        assert_eq!(record.record_type(), RecordType::AAAA);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_record("").is_err());
        assert!(parse_record("name. IN A not-an-ip").is_err());
        assert!(parse_record("name. IN WKS 1.2.3.4").is_err());
    }
}
