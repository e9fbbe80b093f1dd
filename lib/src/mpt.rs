use std::borrow::Cow;

use thiserror::Error;
use tracing::{debug, trace};

use crate::node::{NodeError, NodeRef, TrieNode};
use crate::path::to_nibbles;
use crate::rlp_encoding::keccak256;
use crate::types::{
    MPTBatchProofInput, MPTBatchVerificationResult, MPTProofInput, MPTVerificationResult, H256,
};

/// Why a proof was rejected. The `Display` form is the reason string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidProof {
    #[error("empty proof")]
    EmptyProof,

    #[error("hash mismatch at node {0}")]
    HashMismatch(usize),

    #[error("malformed node at {index}: {source}")]
    MalformedNode {
        index: usize,
        #[source]
        source: NodeError,
    },

    #[error("proof truncated")]
    ProofTruncated,

    #[error("value mismatch")]
    ValueMismatch,
}

/// Result of walking a proof against a root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The key is in the trie with this value.
    Present(Vec<u8>),
    /// The proof shows the key is not in the trie.
    Absent,
    Invalid(InvalidProof),
}

impl VerificationOutcome {
    pub fn is_present(&self) -> bool {
        matches!(self, VerificationOutcome::Present(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, VerificationOutcome::Invalid(_))
    }

    pub fn value(&self) -> Option<&[u8]> {
        match self {
            VerificationOutcome::Present(value) => Some(value),
            _ => None,
        }
    }
}

impl From<InvalidProof> for VerificationOutcome {
    fn from(reason: InvalidProof) -> Self {
        VerificationOutcome::Invalid(reason)
    }
}

/// Walk `proof` from `root` along `key` and classify the result.
///
/// # Arguments
/// * `root` - Hash the first proof node must have
/// * `key` - The key to look up, already hashed where the trie hashes keys
/// * `proof` - RLP-encoded nodes from the root along the key's path
/// * `claimed_value` - When set, a terminal value that differs is rejected
///
/// A key the proof shows to be missing yields [`VerificationOutcome::Absent`];
/// [`VerificationOutcome::Invalid`] is reserved for inconsistent proofs.
pub fn verify(
    root: &H256,
    key: &[u8],
    proof: &[Vec<u8>],
    claimed_value: Option<&[u8]>,
) -> VerificationOutcome {
    let outcome = match walk(root, key, proof, claimed_value) {
        Ok(outcome) => outcome,
        Err(reason) => reason.into(),
    };
    debug!(target: "mpt::verify", key = %hex::encode(key), nodes = proof.len(), ?outcome, "proof verified");
    outcome
}

fn walk(
    root: &H256,
    key: &[u8],
    proof: &[Vec<u8>],
    claimed_value: Option<&[u8]>,
) -> Result<VerificationOutcome, InvalidProof> {
    if proof.is_empty() {
        return Err(InvalidProof::EmptyProof);
    }

    let nibbles = to_nibbles(key);
    let mut remaining = &nibbles[..];
    let mut expected = NodeRef::Hash(*root);
    let mut index = 0;

    loop {
        let (node_rlp, position) = match &expected {
            NodeRef::Hash(hash) => {
                let node_rlp = proof.get(index).ok_or(InvalidProof::ProofTruncated)?;
                if keccak256(node_rlp) != *hash {
                    return Err(InvalidProof::HashMismatch(index));
                }
                index += 1;
                (Cow::Borrowed(node_rlp.as_slice()), index - 1)
            }
            NodeRef::Inline(raw) => {
                // Embedded in the parent, which was already hash-checked. Some
                // producers also list the inline node as its own proof entry.
                let position = index;
                if proof.get(index) == Some(raw) {
                    index += 1;
                }
                (Cow::Owned(raw.clone()), position)
            }
        };

        let node = TrieNode::decode(&node_rlp)
            .map_err(|source| InvalidProof::MalformedNode { index: position, source })?;
        trace!(target: "mpt::verify", position, remaining = remaining.len(), ?node, "walking node");

        match node {
            TrieNode::Empty => return Ok(VerificationOutcome::Absent),
            TrieNode::Branch(mut children, value) => {
                let Some((&nibble, rest)) = remaining.split_first() else {
                    return match value {
                        Some(value) => terminal(value, claimed_value),
                        None => Ok(VerificationOutcome::Absent),
                    };
                };
                match children[nibble as usize].take() {
                    Some(child) => {
                        expected = child;
                        remaining = rest;
                    }
                    None => return Ok(VerificationOutcome::Absent),
                }
            }
            TrieNode::Extension(path, child) => {
                if !remaining.starts_with(&path) {
                    return Ok(VerificationOutcome::Absent);
                }
                remaining = &remaining[path.len()..];
                expected = child;
            }
            TrieNode::Leaf(path, value) => {
                if path != remaining {
                    return Ok(VerificationOutcome::Absent);
                }
                return terminal(value, claimed_value);
            }
        }
    }
}

fn terminal(
    value: Vec<u8>,
    claimed_value: Option<&[u8]>,
) -> Result<VerificationOutcome, InvalidProof> {
    match claimed_value {
        Some(claimed) if claimed != value.as_slice() => Err(InvalidProof::ValueMismatch),
        _ => Ok(VerificationOutcome::Present(value)),
    }
}

/// Returns `true` only when the proof shows `key` holding `expected_value`.
pub fn verify_proof(root: &H256, key: &[u8], expected_value: &[u8], proof: &[Vec<u8>]) -> bool {
    verify(root, key, proof, Some(expected_value)).is_present()
}

impl MPTProofInput {
    pub fn verify(&self) -> VerificationOutcome {
        verify(&self.root, &self.key, &self.proof, self.value.as_deref())
    }

    /// Verified means consistent, and present when a value was claimed.
    pub fn accepts(&self, outcome: &VerificationOutcome) -> bool {
        match (&self.value, outcome) {
            (_, VerificationOutcome::Invalid(_)) => false,
            (Some(_), VerificationOutcome::Absent) => false,
            _ => true,
        }
    }

    pub fn result(&self, outcome: &VerificationOutcome) -> MPTVerificationResult {
        MPTVerificationResult {
            verified: self.accepts(outcome),
            key: self.key.clone(),
            value: outcome.value().map(<[u8]>::to_vec).unwrap_or_default(),
            root: self.root,
        }
    }

    pub fn verify_result(&self) -> MPTVerificationResult {
        self.result(&self.verify())
    }
}

/// Verify every proof of the batch against the batch root.
pub fn verify_batch(input: &MPTBatchProofInput) -> MPTBatchVerificationResult {
    let individual_results: Vec<bool> = input
        .proofs
        .iter()
        .map(|proof| MPTProofInput { root: input.root, ..proof.clone() }.verify_result().verified)
        .collect();

    MPTBatchVerificationResult {
        all_verified: individual_results.iter().all(|ok| *ok),
        count: individual_results.len(),
        individual_results,
        root: input.root,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MPTBuilder;
    use crate::path::encode_path;
    use crate::rlp_encoding::Item;
    use proptest::prelude::*;

    fn single_leaf(key: &[u8], value: &[u8]) -> (H256, Vec<u8>) {
        let leaf = Item::List(vec![
            Item::bytes(encode_path(&to_nibbles(key), true)),
            Item::bytes(value.to_vec()),
        ])
        .encode();
        (keccak256(&leaf), leaf)
    }

    #[test]
    fn test_single_leaf_present() {
        let (root, leaf) = single_leaf(&[0x00, 0x00], &[0xde, 0xad, 0xbe, 0xef]);
        let outcome = verify(&root, &[0x00, 0x00], &[leaf], Some(&[0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(outcome, VerificationOutcome::Present(vec![0xde, 0xad, 0xbe, 0xef]));
    }

    #[test]
    fn test_single_leaf_value_mismatch() {
        let (root, leaf) = single_leaf(&[0x00, 0x00], &[0xde, 0xad, 0xbe, 0xef]);
        let outcome = verify(&root, &[0x00, 0x00], &[leaf], Some(&[0xbe, 0xef, 0xde, 0xad]));
        assert_eq!(outcome, VerificationOutcome::Invalid(InvalidProof::ValueMismatch));
        assert_eq!(InvalidProof::ValueMismatch.to_string(), "value mismatch");
    }

    #[test]
    fn test_empty_proof() {
        let outcome = verify(&[0u8; 32], b"test", &[], Some(b"value"));
        assert_eq!(outcome, VerificationOutcome::Invalid(InvalidProof::EmptyProof));
        assert_eq!(InvalidProof::EmptyProof.to_string(), "empty proof");
        assert!(!verify_proof(&[0u8; 32], b"test", b"value", &[]));
    }

    #[test]
    fn test_leaf_without_claimed_value() {
        let (root, leaf) = single_leaf(b"test", b"value");
        assert_eq!(verify(&root, b"test", &[leaf], None), VerificationOutcome::Present(b"value".to_vec()));
    }

    #[test]
    fn test_leaf_diverging_key_is_absent() {
        let (root, leaf) = single_leaf(b"test", b"value");
        assert_eq!(verify(&root, b"tesT", &[leaf.clone()], None), VerificationOutcome::Absent);
        assert_eq!(verify(&root, b"tes", &[leaf], Some(b"value")), VerificationOutcome::Absent);
    }

    #[test]
    fn test_wrong_root_is_hash_mismatch() {
        let (_, leaf) = single_leaf(b"test", b"value");
        let outcome = verify(&[1u8; 32], b"test", &[leaf], None);
        assert_eq!(outcome, VerificationOutcome::Invalid(InvalidProof::HashMismatch(0)));
        assert_eq!(InvalidProof::HashMismatch(0).to_string(), "hash mismatch at node 0");
    }

    #[test]
    fn test_empty_trie_node_is_absent() {
        let root = keccak256(&[0x80]);
        assert_eq!(verify(&root, b"any", &[vec![0x80]], None), VerificationOutcome::Absent);
    }

    #[test]
    fn test_malformed_root_node() {
        let node = vec![0xc1, 0x80, 0x80];
        let outcome = verify(&keccak256(&node), b"k", &[node], None);
        assert!(matches!(
            outcome,
            VerificationOutcome::Invalid(InvalidProof::MalformedNode { index: 0, .. })
        ));
    }

    fn hashed_trie(count: u8) -> MPTBuilder {
        let mut builder = MPTBuilder::new();
        for i in 0..count {
            let key = keccak256(&[i]);
            builder.insert(&key, &[0xf0, i, i, i, i, i, i, i, i, i, i, i, i, i, i, i, i, i, i, i, i, i]);
        }
        builder
    }

    #[test]
    fn test_hashed_keys_present() {
        let builder = hashed_trie(64);
        let root = builder.root();
        for i in 0..64u8 {
            let key = keccak256(&[i]);
            let value = builder.get(&key).unwrap();
            let proof = builder.get_proof(&key);
            assert!(proof.len() > 1);
            assert_eq!(verify(&root, &key, &proof, Some(&value)), VerificationOutcome::Present(value));
        }
    }

    #[test]
    fn test_hashed_keys_absent() {
        let builder = hashed_trie(64);
        let root = builder.root();
        for i in 64..96u8 {
            let key = keccak256(&[i]);
            let proof = builder.get_proof(&key);
            assert_eq!(verify(&root, &key, &proof, None), VerificationOutcome::Absent);
        }
    }

    #[test]
    fn test_truncated_proof() {
        let builder = hashed_trie(64);
        let key = keccak256(&[7]);
        let mut proof = builder.get_proof(&key);
        proof.pop();
        let outcome = verify(&builder.root(), &key, &proof, None);
        assert_eq!(outcome, VerificationOutcome::Invalid(InvalidProof::ProofTruncated));
    }

    #[test]
    fn test_swapped_node_is_hash_mismatch() {
        let builder = hashed_trie(64);
        let key = keccak256(&[7]);
        let other = builder.get_proof(&keccak256(&[8]));
        let mut proof = builder.get_proof(&key);
        let last = proof.len() - 1;
        proof[last] = other[other.len() - 1].clone();
        let outcome = verify(&builder.root(), &key, &proof, None);
        assert_eq!(outcome, VerificationOutcome::Invalid(InvalidProof::HashMismatch(last)));
    }

    #[test]
    fn test_branch_value_and_extension() {
        let mut builder = MPTBuilder::new();
        builder.insert(b"do", b"verb");
        builder.insert(b"dog", b"puppy");
        builder.insert(b"doge", b"coin");
        builder.insert(b"horse", b"stallion");
        let root = builder.root();

        let present = [
            (&b"do"[..], &b"verb"[..]),
            (&b"dog"[..], &b"puppy"[..]),
            (&b"doge"[..], &b"coin"[..]),
            (&b"horse"[..], &b"stallion"[..]),
        ];
        for (key, value) in present {
            let proof = builder.get_proof(key);
            assert_eq!(verify(&root, key, &proof, Some(value)), VerificationOutcome::Present(value.to_vec()));
        }

        for key in [&b"d"[..], &b"dot"[..], &b"dogecoin"[..], &b"horses"[..], &b"cat"[..]] {
            let proof = builder.get_proof(key);
            assert_eq!(verify(&root, key, &proof, None), VerificationOutcome::Absent, "{key:?}");
        }
    }

    #[test]
    fn test_inline_children() {
        let mut builder = MPTBuilder::new();
        builder.insert(&[0x10], &[0x01]);
        builder.insert(&[0x11], &[0x02]);
        builder.insert(&[0x20], &[0x03]);
        let root = builder.root();

        // Every child here is smaller than a hash, so the root carries them all.
        assert_eq!(builder.get_proof(&[0x10]).len(), 1);
        assert_eq!(verify(&root, &[0x10], &builder.get_proof(&[0x10]), Some(&[0x01])), VerificationOutcome::Present(vec![0x01]));
        assert_eq!(verify(&root, &[0x11], &builder.get_proof(&[0x11]), None), VerificationOutcome::Present(vec![0x02]));
        assert_eq!(verify(&root, &[0x12], &builder.get_proof(&[0x12]), None), VerificationOutcome::Absent);
    }

    #[test]
    fn test_inline_child_listed_in_proof() {
        let mut builder = MPTBuilder::new();
        builder.insert(&[0x10], &[0x01]);
        builder.insert(&[0x20], &[0x03]);
        let root = builder.root();

        let mut proof = builder.get_proof(&[0x10]);
        let TrieNode::Branch(children, _) = TrieNode::decode(&proof[0]).unwrap() else {
            panic!("expected branch root");
        };
        let Some(NodeRef::Inline(raw)) = &children[1] else {
            panic!("expected inline child");
        };
        proof.push(raw.clone());
        assert_eq!(verify(&root, &[0x10], &proof, Some(&[0x01])), VerificationOutcome::Present(vec![0x01]));
    }

    #[test]
    fn test_wire_branch_with_inline_leaf() {
        // [ "", [0x30, 0x01], "" x 15 ]: key 0x10 ends in the leaf embedded in slot 1.
        let mut branch = vec![0xd3, 0x80, 0xc2, 0x30, 0x01];
        branch.extend([0x80; 15]);
        let root = keccak256(&branch);
        let proof = [branch];

        assert_eq!(verify(&root, &[0x10], &proof, Some(&[0x01])), VerificationOutcome::Present(vec![0x01]));
        assert_eq!(verify(&root, &[0x11], &proof, None), VerificationOutcome::Absent);
        assert_eq!(verify(&root, &[0x20], &proof, None), VerificationOutcome::Absent);
        assert_eq!(
            verify(&root, &[0x10], &proof, Some(&[0x02])),
            VerificationOutcome::Invalid(InvalidProof::ValueMismatch)
        );
    }

    #[test]
    fn test_verify_batch() {
        let builder = hashed_trie(16);
        let root = builder.root();
        let mut proofs: Vec<MPTProofInput> = (0..4u8)
            .map(|i| {
                let key = keccak256(&[i]).to_vec();
                MPTProofInput {
                    value: builder.get(&key),
                    proof: builder.get_proof(&key),
                    key,
                    root: [0u8; 32],
                }
            })
            .collect();

        let result = verify_batch(&MPTBatchProofInput { proofs: proofs.clone(), root });
        assert!(result.all_verified);
        assert_eq!(result.count, 4);

        proofs[2].value = Some(b"forged".to_vec());
        let result = verify_batch(&MPTBatchProofInput { proofs, root });
        assert!(!result.all_verified);
        assert_eq!(result.individual_results, vec![true, true, false, true]);
    }

    #[test]
    fn test_verify_result_for_claimed_but_absent() {
        let builder = hashed_trie(8);
        let key = keccak256(&[200]).to_vec();
        let input = MPTProofInput {
            proof: builder.get_proof(&key),
            key,
            value: Some(vec![1]),
            root: builder.root(),
        };
        let result = input.verify_result();
        assert!(!result.verified);
        assert!(result.value.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn soundness_and_exclusion(
            entries in proptest::collection::btree_map(
                proptest::collection::vec(any::<u8>(), 1..6),
                proptest::collection::vec(any::<u8>(), 1..40),
                1..24,
            ),
            probe in proptest::collection::vec(any::<u8>(), 1..6),
        ) {
            let mut builder = MPTBuilder::new();
            for (key, value) in &entries {
                builder.insert(key, value);
            }
            let root = builder.root();

            for (key, value) in &entries {
                let proof = builder.get_proof(key);
                prop_assert_eq!(
                    verify(&root, key, &proof, Some(value)),
                    VerificationOutcome::Present(value.clone())
                );
            }

            let expected = match entries.get(&probe) {
                Some(value) => VerificationOutcome::Present(value.clone()),
                None => VerificationOutcome::Absent,
            };
            prop_assert_eq!(verify(&root, &probe, &builder.get_proof(&probe), None), expected);
        }

        #[test]
        fn tampering_never_yields_a_wrong_value(
            seed in 0u8..32,
            node_pick in any::<prop::sample::Index>(),
            byte_pick in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let builder = hashed_trie(32);
            let root = builder.root();
            let key = keccak256(&[seed]);
            let value = builder.get(&key).unwrap();
            let mut proof = builder.get_proof(&key);

            let node = node_pick.index(proof.len());
            let byte = byte_pick.index(proof[node].len());
            proof[node][byte] ^= flip;

            prop_assert!(verify(&root, &key, &proof, None).is_invalid());
            prop_assert!(!verify_proof(&root, &key, &value, &proof));
        }
    }
}
