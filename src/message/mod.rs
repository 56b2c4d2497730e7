#[cfg(test)]
mod message_test;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::*;

/// CLNT_UCAST_EX asks the browser for every instance on the server.
pub const CLNT_UCAST_EX: u8 = 0x02;
/// CLNT_UCAST_INST asks the browser for a single named instance.
pub const CLNT_UCAST_INST: u8 = 0x04;
/// SVR_RESP leads every browser reply.
pub const SVR_RESP: u8 = 0x05;

// SVR_RESP followed by the little-endian length of the text that follows
pub const RESPONSE_HEADER_LEN: usize = 3;

const MAX_INSTANCE_NAME_LEN: usize = 32;

/// A request understood by the SQL Server Browser service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserRequest {
    UnicastEx,
    UnicastInstance(String),
}

impl BrowserRequest {
    pub fn marshal(&self) -> Result<Bytes> {
        match self {
            BrowserRequest::UnicastEx => Ok(Bytes::from_static(&[CLNT_UCAST_EX])),
            BrowserRequest::UnicastInstance(name) => {
                if name.len() > MAX_INSTANCE_NAME_LEN {
                    return Err(Error::ErrInstanceNameTooLong);
                }
                let mut buf = BytesMut::with_capacity(1 + name.len());
                buf.put_u8(CLNT_UCAST_INST);
                buf.put_slice(name.as_bytes());
                Ok(buf.freeze())
            }
        }
    }
}

/// Returns the text of a browser reply with its header stripped. Bytes are
/// read as 7-bit ASCII.
pub fn response_text(reply: &[u8]) -> String {
    reply
        .get(RESPONSE_HEADER_LEN..)
        .unwrap_or_default()
        .iter()
        .map(|b| char::from(b & 0x7f))
        .collect()
}

/// Finds the TCP port of `instance_name` in the text of a browser reply.
///
/// The reply is a run of `key;value;` pairs with `;;` ending each instance
/// record. The name is compared case-insensitively and the first matching
/// record decides the outcome.
pub fn parse_browser_response(response: &str, instance_name: &str) -> Option<u16> {
    let mut matched = false;

    for record in response.split(";;") {
        let parts: Vec<&str> = record.split(';').collect();
        for pair in parts.chunks(2) {
            let name = pair[0];
            let value = pair.get(1).copied().unwrap_or_default();

            if name == "tcp" && matched {
                return parse_port(value);
            }
            if name == "InstanceName" {
                matched = value.eq_ignore_ascii_case(instance_name);
            }
        }
    }

    None
}

// leading decimal digits only, trailing garbage is ignored
fn parse_port(value: &str) -> Option<u16> {
    let value = value.trim_start();
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..end].parse().ok()
}
