//! Decoded trie nodes and child references.

use rlp::{Encodable, RlpStream};
use thiserror::Error;

use crate::path::{decode_path, encode_path, PathError};
use crate::rlp_encoding::{decode, keccak256, Item, RlpError};
use crate::types::H256;

/// Reasons a proof node fails to decode into a trie node.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("malformed rlp: {0}")]
    Rlp(#[from] RlpError),

    #[error("malformed path: {0}")]
    Path(#[from] PathError),

    #[error("node has {0} items, expected 2 or 17")]
    ItemCount(usize),

    #[error("child reference of {0} bytes is neither a hash nor an inline node")]
    InvalidReference(usize),

    #[error("extension node without a child")]
    EmptyExtension,
}

/// How a parent points at a child node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeRef {
    /// Keccak-256 of the child's encoding.
    Hash(H256),
    /// The child's full RLP encoding, embedded because it is shorter than a hash.
    Inline(Vec<u8>),
}

impl NodeRef {
    /// Reference for an encoded node: inline below 32 bytes, hashed otherwise.
    pub fn from_encoded(node_rlp: &[u8]) -> Self {
        if node_rlp.len() < 32 {
            NodeRef::Inline(node_rlp.to_vec())
        } else {
            NodeRef::Hash(keccak256(node_rlp))
        }
    }

    /// Reads a child slot. The empty string means no child.
    fn from_item(item: &Item) -> Result<Option<Self>, NodeError> {
        match item {
            Item::Bytes(data) if data.is_empty() => Ok(None),
            Item::Bytes(data) if data.len() == 32 => {
                let mut hash = [0u8; 32];
                hash.copy_from_slice(data);
                Ok(Some(NodeRef::Hash(hash)))
            }
            Item::Bytes(data) => Err(NodeError::InvalidReference(data.len())),
            Item::List(_) => {
                let raw = item.encode();
                if raw.len() >= 32 {
                    return Err(NodeError::InvalidReference(raw.len()));
                }
                Ok(Some(NodeRef::Inline(raw)))
            }
        }
    }
}

impl NodeRef {
    /// Writes the reference as one item of the list open on `s`.
    fn append_to(&self, s: &mut RlpStream) {
        match self {
            NodeRef::Hash(hash) => {
                s.append(&hash.to_vec());
            }
            NodeRef::Inline(raw) => {
                s.append_raw(raw, 1);
            }
        }
    }
}

/// MPT Node types
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrieNode {
    /// The empty trie, encoded as the empty string.
    Empty,

    /// Leaf node: (path nibbles, value)
    Leaf(Vec<u8>, Vec<u8>),

    /// Extension node: (path nibbles, child)
    Extension(Vec<u8>, NodeRef),

    /// Branch node: 16 children + optional value
    Branch(Box<[Option<NodeRef>; 16]>, Option<Vec<u8>>),
}

impl TrieNode {
    pub fn decode(node_rlp: &[u8]) -> Result<Self, NodeError> {
        let item = decode(node_rlp)?;
        let items = match &item {
            Item::Bytes(data) if data.is_empty() => return Ok(TrieNode::Empty),
            _ => item.as_list()?,
        };

        match items.len() {
            2 => {
                let (path, is_leaf) = decode_path(items[0].as_bytes()?)?;
                if is_leaf {
                    Ok(TrieNode::Leaf(path, items[1].as_bytes()?.to_vec()))
                } else {
                    let child = NodeRef::from_item(&items[1])?.ok_or(NodeError::EmptyExtension)?;
                    Ok(TrieNode::Extension(path, child))
                }
            }
            17 => {
                let mut children: [Option<NodeRef>; 16] = Default::default();
                for (slot, item) in children.iter_mut().zip(&items[..16]) {
                    *slot = NodeRef::from_item(item)?;
                }
                let value = items[16].as_bytes()?;
                let value = (!value.is_empty()).then(|| value.to_vec());
                Ok(TrieNode::Branch(Box::new(children), value))
            }
            n => Err(NodeError::ItemCount(n)),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        rlp::encode(self).to_vec()
    }
}

impl Encodable for TrieNode {
    fn rlp_append(&self, s: &mut RlpStream) {
        match self {
            TrieNode::Empty => {
                s.append_empty_data();
            }
            TrieNode::Leaf(path, value) => {
                s.begin_list(2);
                s.append(&encode_path(path, true));
                s.append(value);
            }
            TrieNode::Extension(path, child) => {
                s.begin_list(2);
                s.append(&encode_path(path, false));
                child.append_to(s);
            }
            TrieNode::Branch(children, value) => {
                s.begin_list(17);
                for child in children.iter() {
                    match child {
                        Some(child) => child.append_to(s),
                        None => {
                            s.append_empty_data();
                        }
                    }
                }
                s.append(&value.clone().unwrap_or_default());
            }
        }
    }
}
