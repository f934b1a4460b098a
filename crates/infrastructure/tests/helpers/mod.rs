//! Shared test fixtures: canned resolvers with call counters and query
//! builders.

#![allow(dead_code)]

pub mod dns_server_mock;

use async_trait::async_trait;
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA, CNAME};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn make_query(name: &str, record_type: RecordType) -> Message {
    let mut query = Message::new();
    query.set_id(fastrand::u16(..));
    query.set_message_type(MessageType::Query);
    query.set_op_code(OpCode::Query);
    query.set_recursion_desired(true);
    query.add_query(Query::query(Name::from_str(name).unwrap(), record_type));
    query
}

pub fn make_client(addr: &str) -> ClientInfo {
    let source: SocketAddr = addr.parse().unwrap();
    ClientInfo::new(source, "test-listener")
}

pub fn a_record(name: &str, ttl: u32, addr: &str) -> Record {
    Record::from_rdata(
        Name::from_str(name).unwrap(),
        ttl,
        RData::A(A(addr.parse().unwrap())),
    )
}

pub fn aaaa_record(name: &str, ttl: u32, addr: &str) -> Record {
    Record::from_rdata(
        Name::from_str(name).unwrap(),
        ttl,
        RData::AAAA(AAAA(addr.parse().unwrap())),
    )
}

pub fn cname_record(name: &str, ttl: u32, target: &str) -> Record {
    Record::from_rdata(
        Name::from_str(name).unwrap(),
        ttl,
        RData::CNAME(CNAME(Name::from_str(target).unwrap())),
    )
}

/// What a [`MockResolver`] does with a query.
#[derive(Clone)]
pub enum MockBehavior {
    /// Echo a response with the given answer records (owner names are
    /// rewritten to the query name).
    Answer(Vec<Record>),
    /// Echo a response with these records verbatim.
    AnswerVerbatim(Vec<Record>),
    /// Respond with the given RCODE and no records.
    Rcode(ResponseCode),
    /// Fail with a transient error.
    TransientError,
    /// Fail with a permanent error.
    PermanentError,
}

pub struct MockResolver {
    id: String,
    behavior: MockBehavior,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockResolver {
    pub fn new(id: &str, behavior: MockBehavior) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            behavior,
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn with_delay(id: &str, behavior: MockBehavior, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            behavior,
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn answering(id: &str, addr: &str) -> Arc<Self> {
        Self::new(id, MockBehavior::Answer(vec![a_record("ignored.", 60, addr)]))
    }

    pub fn failing(id: &str) -> Arc<Self> {
        Self::new(id, MockBehavior::TransientError)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsResolver for MockResolver {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(
        &self,
        query: &Message,
        _client: &ClientInfo,
    ) -> Result<Message, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            MockBehavior::Answer(records) => {
                let mut response = reply_skeleton(query, ResponseCode::NoError);
                let qname = query.queries().first().unwrap().name().clone();
                for record in records {
                    let mut record = record.clone();
                    record.set_name(qname.clone());
                    response.add_answer(record);
                }
                Ok(response)
            }
            MockBehavior::AnswerVerbatim(records) => {
                let mut response = reply_skeleton(query, ResponseCode::NoError);
                for record in records {
                    response.add_answer(record.clone());
                }
                Ok(response)
            }
            MockBehavior::Rcode(rcode) => Ok(reply_skeleton(query, *rcode)),
            MockBehavior::TransientError => Err(ResolveError::UpstreamTimeout {
                server: format!("{}:53", self.id),
            }),
            MockBehavior::PermanentError => Err(ResolveError::MalformedQuery(
                "rejected by mock".to_string(),
            )),
        }
    }
}

fn reply_skeleton(query: &Message, rcode: ResponseCode) -> Message {
    let mut response = Message::new();
    response.set_id(query.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(query.op_code());
    response.set_recursion_desired(query.recursion_desired());
    response.set_recursion_available(true);
    response.set_response_code(rcode);
    for q in query.queries() {
        response.add_query(q.clone());
    }
    response
}

/// Addresses of all A/AAAA records in the answer section.
pub fn answer_addrs(response: &Message) -> Vec<String> {
    response
        .answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(a.0.to_string()),
            RData::AAAA(aaaa) => Some(aaaa.0.to_string()),
            _ => None,
        })
        .collect()
}
