//! In-memory trie used to produce roots and proofs for tests.
//!
//! Nodes are rebuilt from the sorted key set on demand, with children shorter
//! than a hash embedded inline. Proofs follow the `eth_getProof` layout: every
//! hash-referenced node on the path, root first, inline nodes omitted.

use std::collections::BTreeMap;

use crate::node::{NodeRef, TrieNode};
use crate::path::{common_prefix_len, from_nibbles, to_nibbles};
use crate::rlp_encoding::keccak256;
use crate::types::{EMPTY_ROOT, H256};

type Entry = (Vec<u8>, Vec<u8>);

#[derive(Debug, Default, Clone)]
pub struct MPTBuilder {
    // Keyed by nibble path, so iteration order is trie order.
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MPTBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key-value pair. Empty values are not stored, as in Ethereum tries.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) {
        let path = to_nibbles(key);
        if value.is_empty() {
            self.entries.remove(&path);
        } else {
            self.entries.insert(path, value.to_vec());
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(&to_nibbles(key)).cloned()
    }

    pub fn keys(&self) -> impl Iterator<Item = Vec<u8>> + '_ {
        self.entries.keys().map(|path| from_nibbles(path))
    }

    pub fn root(&self) -> H256 {
        match self.root_node() {
            Some(node) => keccak256(&node.encode()),
            None => EMPTY_ROOT,
        }
    }

    /// Collect the nodes along `key`'s path, whether or not the key is present.
    pub fn get_proof(&self, key: &[u8]) -> Vec<Vec<u8>> {
        let entries: Vec<Entry> = self.entries.clone().into_iter().collect();
        let Some(root) = self.root_node() else {
            return vec![TrieNode::Empty.encode()];
        };

        let path = to_nibbles(key);
        let mut proof = vec![root.encode()];
        let mut node = root;
        let mut group = &entries[..];
        let mut depth = 0;

        loop {
            let (next_group, next_depth) = match &node {
                TrieNode::Extension(ext, _) if path[depth..].starts_with(ext) => {
                    (group, depth + ext.len())
                }
                TrieNode::Branch(children, _) if depth < path.len() => {
                    let nibble = path[depth];
                    if children[nibble as usize].is_none() {
                        break;
                    }
                    (child_group(below_branch(group, depth), depth, nibble), depth + 1)
                }
                _ => break,
            };

            group = next_group;
            depth = next_depth;
            node = build_node(group, depth);
            let encoded = node.encode();
            if encoded.len() >= 32 {
                proof.push(encoded);
            }
        }

        proof
    }

    fn root_node(&self) -> Option<TrieNode> {
        if self.entries.is_empty() {
            return None;
        }
        let entries: Vec<Entry> = self.entries.clone().into_iter().collect();
        Some(build_node(&entries, 0))
    }
}

/// Build the node for `entries`, all of which share their first `depth` nibbles.
fn build_node(entries: &[Entry], depth: usize) -> TrieNode {
    if let [(path, value)] = entries {
        return TrieNode::Leaf(path[depth..].to_vec(), value.clone());
    }

    // Sorted, so the first and last paths bound the shared prefix.
    let first = &entries[0].0;
    let last = &entries[entries.len() - 1].0;
    let shared = common_prefix_len(&first[depth..], &last[depth..]);
    if shared > 0 {
        let child = build_node(entries, depth + shared);
        return TrieNode::Extension(first[depth..depth + shared].to_vec(), child_ref(&child));
    }

    let value = (first.len() == depth).then(|| entries[0].1.clone());
    let rest = below_branch(entries, depth);

    let mut children: [Option<NodeRef>; 16] = Default::default();
    for (nibble, slot) in (0u8..16).zip(children.iter_mut()) {
        let group = child_group(rest, depth, nibble);
        if !group.is_empty() {
            *slot = Some(child_ref(&build_node(group, depth + 1)));
        }
    }
    TrieNode::Branch(Box::new(children), value)
}

/// Drops the entry stored in the branch's own value slot, if any.
fn below_branch(entries: &[Entry], depth: usize) -> &[Entry] {
    match entries.first() {
        Some((path, _)) if path.len() == depth => &entries[1..],
        _ => entries,
    }
}

/// Entries whose nibble at `depth` is `nibble`. Paths must be longer than `depth`.
fn child_group(entries: &[Entry], depth: usize, nibble: u8) -> &[Entry] {
    let start = entries.partition_point(|(path, _)| path[depth] < nibble);
    let end = entries.partition_point(|(path, _)| path[depth] <= nibble);
    &entries[start..end]
}

fn child_ref(node: &TrieNode) -> NodeRef {
    NodeRef::from_encoded(&node.encode())
}
