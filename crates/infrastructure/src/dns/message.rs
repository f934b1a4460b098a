//! Shared helpers for working with parsed DNS messages: wire codec,
//! response skeletons, qname normalization and TTL arithmetic.

use conduit_dns_domain::ResolveError;
use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};

pub fn parse_message(bytes: &[u8]) -> Result<Message, ResolveError> {
    Message::from_vec(bytes).map_err(|e| ResolveError::MalformedResponse(e.to_string()))
}

pub fn parse_query(bytes: &[u8]) -> Result<Message, ResolveError> {
    Message::from_vec(bytes).map_err(|e| ResolveError::MalformedQuery(e.to_string()))
}

pub fn serialize_message(message: &Message) -> Result<Vec<u8>, ResolveError> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message
        .emit(&mut encoder)
        .map_err(|e| ResolveError::MalformedResponse(e.to_string()))?;
    Ok(buf)
}

/// The single question of a well-formed query.
pub fn question(query: &Message) -> Result<&Query, ResolveError> {
    query
        .queries()
        .first()
        .ok_or_else(|| ResolveError::MalformedQuery("missing question section".to_string()))
}

/// Query name in lowercased presentation form without the trailing dot;
/// the normalization used for blocklist matching and cache keys.
pub fn qname(query: &Message) -> Option<String> {
    let q = query.queries().first()?;
    let name = q.name().to_lowercase().to_utf8();
    Some(name.trim_end_matches('.').to_string())
}

/// Query name as a lowercased FQDN (with trailing dot); the form name
/// regexes are matched against.
pub fn qname_fqdn(query: &Message) -> Option<String> {
    let q = query.queries().first()?;
    let mut name = q.name().to_lowercase().to_utf8();
    if !name.ends_with('.') {
        name.push('.');
    }
    Some(name)
}

/// Response skeleton for `query`: id, opcode, question and RD copied,
/// RA set, the given RCODE, no records.
pub fn reply_with_rcode(query: &Message, rcode: ResponseCode) -> Message {
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

/// Smallest TTL across all answer records.
pub fn min_answer_ttl(message: &Message) -> Option<u32> {
    message.answers().iter().map(|r| r.ttl()).min()
}

/// NXDOMAIN, or NOERROR with an empty answer section (NODATA).
pub fn is_negative(message: &Message) -> bool {
    match message.response_code() {
        ResponseCode::NXDomain => true,
        ResponseCode::NoError => message.answers().is_empty(),
        _ => false,
    }
}

/// Rewrite every RR TTL in the answer, authority and additional sections.
pub fn map_ttls(message: &mut Message, f: impl Fn(u32) -> u32) {
    let answers = message
        .take_answers()
        .into_iter()
        .map(|mut r| {
            let ttl = f(r.ttl());
            r.set_ttl(ttl);
            r
        })
        .collect::<Vec<_>>();
    message.insert_answers(answers);

    let authority = message
        .take_name_servers()
        .into_iter()
        .map(|mut r| {
            let ttl = f(r.ttl());
            r.set_ttl(ttl);
            r
        })
        .collect::<Vec<_>>();
    message.insert_name_servers(authority);

    let additionals = message
        .take_additionals()
        .into_iter()
        .map(|mut r| {
            let ttl = f(r.ttl());
            r.set_ttl(ttl);
            r
        })
        .collect::<Vec<_>>();
    message.insert_additionals(additionals);
}

/// Numeric RCODE from config to the wire enum. Only the codes a response
/// can reasonably carry are accepted.
pub fn rcode_from_u16(value: u16) -> Option<ResponseCode> {
    Some(match value {
        0 => ResponseCode::NoError,
        1 => ResponseCode::FormErr,
        2 => ResponseCode::ServFail,
        3 => ResponseCode::NXDomain,
        4 => ResponseCode::NotImp,
        5 => ResponseCode::Refused,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::OpCode;
    use hickory_proto::rr::{Name, RecordType};
    use std::str::FromStr;

    fn make_query(name: &str, rt: RecordType) -> Message {
        let mut query = Message::new();
        query.set_id(4242);
        query.set_message_type(MessageType::Query);
        query.set_op_code(OpCode::Query);
        query.set_recursion_desired(true);
        query.add_query(Query::query(Name::from_str(name).unwrap(), rt));
        query
    }

    #[test]
    fn qname_is_lowercased_and_undotted() {
        let query = make_query("WWW.Example.COM.", RecordType::A);
        assert_eq!(qname(&query).as_deref(), Some("www.example.com"));
        assert_eq!(qname_fqdn(&query).as_deref(), Some("www.example.com."));
    }

    #[test]
    fn reply_echoes_id_and_question() {
        let query = make_query("example.com.", RecordType::A);
        let reply = reply_with_rcode(&query, ResponseCode::Refused);
        assert_eq!(reply.id(), 4242);
        assert_eq!(reply.response_code(), ResponseCode::Refused);
        assert_eq!(reply.queries(), query.queries());
        assert!(reply.recursion_desired());
    }

    #[test]
    fn negative_detection() {
        let query = make_query("example.com.", RecordType::A);
        assert!(is_negative(&reply_with_rcode(&query, ResponseCode::NXDomain)));
        assert!(is_negative(&reply_with_rcode(&query, ResponseCode::NoError)));
        assert!(!is_negative(&reply_with_rcode(
            &query,
            ResponseCode::ServFail
        )));
    }

    #[test]
    fn wire_round_trip() {
        let query = make_query("example.com.", RecordType::AAAA);
        let bytes = serialize_message(&query).unwrap();
        let parsed = parse_query(&bytes).unwrap();
        assert_eq!(parsed.id(), query.id());
        assert_eq!(qname(&parsed), qname(&query));
    }
}
