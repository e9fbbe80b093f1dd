use rlp::{Encodable, RlpStream};
use sha3::{Digest, Keccak256};
use thiserror::Error;

use crate::types::H256;

/// Compute Keccak256 hash
pub fn keccak256(data: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Structural failures while decoding RLP.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RlpError {
    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("length prefix overruns buffer: need {needed} bytes, have {available}")]
    Overrun { needed: usize, available: usize },

    #[error("{0} trailing bytes after item")]
    TrailingBytes(usize),

    #[error("non-canonical encoding")]
    NonCanonical,

    #[error("expected a byte string, found a list")]
    ExpectedBytes,

    #[error("expected a list, found a byte string")]
    ExpectedList,

    #[error("more than {} nested lists", MAX_DEPTH)]
    TooDeep,
}

/// Most lists one decoded item may nest. Trie nodes use a few levels.
pub const MAX_DEPTH: usize = 32;

/// A decoded RLP item: a byte string or a list of items.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Item {
    Bytes(Vec<u8>),
    List(Vec<Item>),
}

impl Item {
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Item::Bytes(data.into())
    }

    /// The empty byte string, used for unset trie slots.
    pub fn empty() -> Self {
        Item::Bytes(Vec::new())
    }

    pub fn as_bytes(&self) -> Result<&[u8], RlpError> {
        match self {
            Item::Bytes(data) => Ok(data),
            Item::List(_) => Err(RlpError::ExpectedBytes),
        }
    }

    pub fn as_list(&self) -> Result<&[Item], RlpError> {
        match self {
            Item::List(items) => Ok(items),
            Item::Bytes(_) => Err(RlpError::ExpectedList),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        rlp::encode(self).to_vec()
    }
}

impl Encodable for Item {
    fn rlp_append(&self, s: &mut RlpStream) {
        match self {
            // Counted by the enclosing `append`.
            Item::Bytes(data) => s.encoder().encode_value(data),
            Item::List(items) => {
                s.begin_list(items.len());
                for item in items {
                    s.append(item);
                }
            }
        }
    }
}

/// Encode an item using RLP
pub fn encode(item: &Item) -> Vec<u8> {
    item.encode()
}

/// Decode exactly one RLP item spanning the whole buffer.
pub fn decode(data: &[u8]) -> Result<Item, RlpError> {
    let (item, consumed) = decode_item(data, 0)?;
    if consumed != data.len() {
        return Err(RlpError::TrailingBytes(data.len() - consumed));
    }
    Ok(item)
}

struct Header {
    list: bool,
    header_len: usize,
    payload_len: usize,
}

impl Header {
    fn parse(data: &[u8]) -> Result<Self, RlpError> {
        let prefix = *data.first().ok_or(RlpError::UnexpectedEnd)?;

        match prefix {
            // Single byte, encoded as itself
            0x00..=0x7f => Ok(Header { list: false, header_len: 0, payload_len: 1 }),
            0x80..=0xb7 => {
                let payload_len = (prefix - 0x80) as usize;
                if payload_len == 1 && data.get(1).is_some_and(|b| *b < 0x80) {
                    return Err(RlpError::NonCanonical);
                }
                Ok(Header { list: false, header_len: 1, payload_len })
            }
            0xb8..=0xbf => Self::long(data, (prefix - 0xb7) as usize, false),
            0xc0..=0xf7 => Ok(Header {
                list: true,
                header_len: 1,
                payload_len: (prefix - 0xc0) as usize,
            }),
            0xf8..=0xff => Self::long(data, (prefix - 0xf7) as usize, true),
        }
    }

    fn long(data: &[u8], len_of_len: usize, list: bool) -> Result<Self, RlpError> {
        let len_bytes = data.get(1..1 + len_of_len).ok_or(RlpError::Overrun {
            needed: 1 + len_of_len,
            available: data.len(),
        })?;
        if len_bytes[0] == 0 {
            return Err(RlpError::NonCanonical);
        }
        let payload_len = bytes_to_length(len_bytes)?;
        if payload_len < 56 {
            return Err(RlpError::NonCanonical);
        }
        Ok(Header { list, header_len: 1 + len_of_len, payload_len })
    }
}

fn decode_item(data: &[u8], depth: usize) -> Result<(Item, usize), RlpError> {
    let header = Header::parse(data)?;
    let end = header
        .header_len
        .checked_add(header.payload_len)
        .ok_or(RlpError::Overrun { needed: usize::MAX, available: data.len() })?;
    if data.len() < end {
        return Err(RlpError::Overrun { needed: end, available: data.len() });
    }

    let payload = &data[header.header_len..end];
    if !header.list {
        return Ok((Item::Bytes(payload.to_vec()), end));
    }

    if depth == MAX_DEPTH {
        return Err(RlpError::TooDeep);
    }
    let mut items = Vec::new();
    let mut pos = 0;
    while pos < payload.len() {
        let (item, used) = decode_item(&payload[pos..], depth + 1)?;
        items.push(item);
        pos += used;
    }
    Ok((Item::List(items), end))
}

/// Convert big-endian bytes to length
fn bytes_to_length(bytes: &[u8]) -> Result<usize, RlpError> {
    let mut len: u64 = 0;
    for &byte in bytes {
        len = (len << 8) | byte as u64;
    }
    usize::try_from(len).map_err(|_| RlpError::Overrun { needed: usize::MAX, available: 0 })
}
