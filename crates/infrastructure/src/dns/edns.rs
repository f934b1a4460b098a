//! EDNS0 option plumbing: generic add/remove by numeric code and the
//! CLIENT-SUBNET option (RFC 7871) encoded by hand, since the wire codec
//! exposes unknown option payloads as raw bytes.

use hickory_proto::op::{Edns, Message};
use hickory_proto::rr::rdata::opt::{EdnsCode, EdnsOption};
use std::net::IpAddr;

pub const ECS_CODE: u16 = 8;

const FAMILY_IPV4: u16 = 1;
const FAMILY_IPV6: u16 = 2;

/// Parsed CLIENT-SUBNET option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcsOption {
    pub address: IpAddr,
    pub source_prefix: u8,
    pub scope_prefix: u8,
}

impl EcsOption {
    pub fn new(address: IpAddr, source_prefix: u8) -> Self {
        Self {
            address,
            source_prefix,
            scope_prefix: 0,
        }
    }

    /// Zero out the host bits beyond the prefix; the address carried on
    /// the wire must not leak more than `source_prefix` bits.
    pub fn truncated(&self, prefix: u8) -> Self {
        let source_prefix = self.source_prefix.min(prefix);
        Self {
            address: mask_address(self.address, source_prefix),
            source_prefix,
            scope_prefix: self.scope_prefix,
        }
    }

    pub fn from_wire(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }
        let family = u16::from_be_bytes([data[0], data[1]]);
        let source_prefix = data[2];
        let scope_prefix = data[3];
        let addr_bytes = &data[4..];
        let address = match family {
            FAMILY_IPV4 => {
                let mut octets = [0u8; 4];
                if addr_bytes.len() > 4 {
                    return None;
                }
                octets[..addr_bytes.len()].copy_from_slice(addr_bytes);
                IpAddr::from(octets)
            }
            FAMILY_IPV6 => {
                let mut octets = [0u8; 16];
                if addr_bytes.len() > 16 {
                    return None;
                }
                octets[..addr_bytes.len()].copy_from_slice(addr_bytes);
                IpAddr::from(octets)
            }
            _ => return None,
        };
        Some(Self {
            address,
            source_prefix,
            scope_prefix,
        })
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let (family, octets): (u16, Vec<u8>) = match self.address {
            IpAddr::V4(v4) => (FAMILY_IPV4, v4.octets().to_vec()),
            IpAddr::V6(v6) => (FAMILY_IPV6, v6.octets().to_vec()),
        };
        // Only the octets covered by the source prefix go on the wire.
        let addr_len = usize::from(self.source_prefix).div_ceil(8);
        let mut data = Vec::with_capacity(4 + addr_len);
        data.extend_from_slice(&family.to_be_bytes());
        data.push(self.source_prefix);
        data.push(self.scope_prefix);
        data.extend_from_slice(&octets[..addr_len]);
        data
    }

    pub fn from_message(message: &Message) -> Option<Self> {
        let edns = message.extensions().as_ref()?;
        match edns.options().get(EdnsCode::Subnet)? {
            EdnsOption::Unknown(_, data) => Self::from_wire(data),
            _ => None,
        }
    }
}

/// Zero the bits of `address` beyond `prefix`.
pub fn mask_address(address: IpAddr, prefix: u8) -> IpAddr {
    match address {
        IpAddr::V4(v4) => {
            let prefix = prefix.min(32);
            let mask = if prefix == 0 {
                0
            } else {
                u32::MAX << (32 - u32::from(prefix))
            };
            IpAddr::from((u32::from(v4) & mask).to_be_bytes())
        }
        IpAddr::V6(v6) => {
            let prefix = prefix.min(128);
            let mask = if prefix == 0 {
                0
            } else {
                u128::MAX << (128 - u32::from(prefix))
            };
            IpAddr::from((u128::from(v6) & mask).to_be_bytes())
        }
    }
}

fn edns_mut(message: &mut Message) -> &mut Edns {
    if message.extensions().is_none() {
        let mut edns = Edns::new();
        edns.set_max_payload(4096);
        edns.set_version(0);
        *message.extensions_mut() = Some(edns);
    }
    message
        .extensions_mut()
        .as_mut()
        .expect("edns was just installed")
}

pub fn set_ecs(message: &mut Message, ecs: &EcsOption) {
    let edns = edns_mut(message);
    edns.options_mut()
        .insert(EdnsOption::Unknown(ECS_CODE, ecs.to_wire()));
}

pub fn remove_ecs(message: &mut Message) {
    if let Some(edns) = message.extensions_mut().as_mut() {
        edns.options_mut().remove(EdnsCode::Subnet);
    }
}

pub fn add_option(message: &mut Message, code: u16, data: Vec<u8>) {
    let edns = edns_mut(message);
    edns.options_mut().insert(EdnsOption::Unknown(code, data));
}

pub fn remove_option(message: &mut Message, code: u16) {
    if let Some(edns) = message.extensions_mut().as_mut() {
        edns.options_mut().remove(EdnsCode::from(code));
    }
}
