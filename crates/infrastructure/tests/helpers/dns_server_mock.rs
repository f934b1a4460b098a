//! Minimal in-process DNS servers for exercising the upstream client
//! against real sockets.

#![allow(dead_code)]

use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{RData, Record};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

fn encode(message: &Message) -> Vec<u8> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message.emit(&mut encoder).unwrap();
    buf
}

fn answer_for(query: &Message, answer: Ipv4Addr, truncated: bool) -> Message {
    let mut response = Message::new();
    response.set_id(query.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.set_recursion_available(true);
    response.set_response_code(ResponseCode::NoError);
    for q in query.queries() {
        response.add_query(q.clone());
    }
    if truncated {
        response.set_truncated(true);
    } else if let Some(q) = query.queries().first() {
        response.add_answer(Record::from_rdata(q.name().clone(), 60, RData::A(A(answer))));
    }
    response
}

/// UDP server answering every query with one A record, optionally with
/// the TC bit set instead (to provoke the TCP fallback). Returns its
/// bound address.
pub async fn spawn_udp(answer: Ipv4Addr, truncated: bool) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            let Ok((n, from)) = socket.recv_from(&mut buf).await else {
                return;
            };
            let Ok(query) = Message::from_vec(&buf[..n]) else {
                continue;
            };
            let response = answer_for(&query, answer, truncated);
            let _ = socket.send_to(&encode(&response), from).await;
        }
    });

    addr
}

/// TCP server (length-prefixed framing) answering every query with one A
/// record, bound to `addr`. Pass the UDP mock's address to simulate one
/// server speaking both transports.
pub async fn spawn_tcp(addr: SocketAddr, answer: Ipv4Addr) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                loop {
                    let mut len_buf = [0u8; 2];
                    if stream.read_exact(&mut len_buf).await.is_err() {
                        return;
                    }
                    let len = u16::from_be_bytes(len_buf) as usize;
                    let mut msg_buf = vec![0u8; len];
                    if stream.read_exact(&mut msg_buf).await.is_err() {
                        return;
                    }
                    let Ok(query) = Message::from_vec(&msg_buf) else {
                        return;
                    };
                    let response = encode(&answer_for(&query, answer, false));
                    let len = (response.len() as u16).to_be_bytes();
                    if stream.write_all(&len).await.is_err()
                        || stream.write_all(&response).await.is_err()
                    {
                        return;
                    }
                    let _ = stream.flush().await;
                }
            });
        }
    });
}

/// UDP socket that swallows every query, for timeout tests.
pub async fn spawn_blackhole() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            if socket.recv_from(&mut buf).await.is_err() {
                return;
            }
        }
    });
    addr
}
