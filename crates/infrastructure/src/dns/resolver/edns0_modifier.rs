//! Adds or removes an arbitrary EDNS0 option by numeric code on outgoing
//! queries.

use super::super::edns;
use async_trait::async_trait;
use conduit_dns_application::ports::DnsResolver;
use conduit_dns_domain::{ClientInfo, ResolveError};
use hickory_proto::op::Message;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Edns0Op {
    Add { code: u16, data: Vec<u8> },
    Delete { code: u16 },
}

pub struct Edns0Modifier {
    id: Arc<str>,
    inner: Arc<dyn DnsResolver>,
    op: Edns0Op,
}

impl Edns0Modifier {
    pub fn new(id: impl Into<Arc<str>>, inner: Arc<dyn DnsResolver>, op: Edns0Op) -> Self {
        Self {
            id: id.into(),
            inner,
            op,
        }
    }
}

/// Decode the option payload from its config form, a hex string.
pub fn parse_hex_data(hex: &str) -> Result<Vec<u8>, String> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return Err(format!("hex data '{}' has odd length", hex));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| format!("invalid hex data '{}': {}", hex, e))
        })
        .collect()
}

#[async_trait]
impl DnsResolver for Edns0Modifier {
    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, query: &Message, client: &ClientInfo) -> Result<Message, ResolveError> {
        let mut derived = query.clone();
        match &self.op {
            Edns0Op::Add { code, data } => edns::add_option(&mut derived, *code, data.clone()),
            Edns0Op::Delete { code } => edns::remove_option(&mut derived, *code),
        }
        self.inner.resolve(&derived, client).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_decoding() {
        assert_eq!(parse_hex_data("0001ff").unwrap(), vec![0x00, 0x01, 0xff]);
        assert!(parse_hex_data("abc").is_err());
        assert!(parse_hex_data("zz").is_err());
        assert_eq!(parse_hex_data("").unwrap(), Vec::<u8>::new());
    }
}
