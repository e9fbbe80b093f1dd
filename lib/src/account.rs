//! Verification requests shaped from `eth_getProof` (EIP-1186) responses.
//!
//! Account proofs are keyed by `keccak256(address)` under the block's state
//! root; storage proofs by `keccak256(slot)` under the account's storage root.

use rlp::RlpStream;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hex_serde::{self, trim_leading_zeros};
use crate::mpt::{verify, VerificationOutcome};
use crate::rlp_encoding::keccak256;
use crate::types::{MPTProofInput, EMPTY_CODE_HASH, EMPTY_ROOT, H256};

/// One storage slot of an `eth_getProof` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProofResponse {
    #[serde(with = "hex_serde::hash")]
    pub key: H256,
    #[serde(with = "hex_serde::quantity")]
    pub value: Vec<u8>,
    #[serde(with = "hex_serde::bytes_list")]
    pub proof: Vec<Vec<u8>>,
}

/// The `eth_getProof` result for one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProofResponse {
    #[serde(with = "hex_serde::bytes")]
    pub address: Vec<u8>,
    #[serde(with = "hex_serde::quantity")]
    pub balance: Vec<u8>,
    #[serde(with = "hex_serde::quantity")]
    pub nonce: Vec<u8>,
    #[serde(with = "hex_serde::hash")]
    pub code_hash: H256,
    #[serde(with = "hex_serde::hash")]
    pub storage_hash: H256,
    #[serde(with = "hex_serde::bytes_list")]
    pub account_proof: Vec<Vec<u8>>,
    #[serde(default)]
    pub storage_proof: Vec<StorageProofResponse>,
}

/// A root, a trie key, the proof nodes and the value the proof should show.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRequest {
    #[serde(with = "hex_serde::hash")]
    pub expected_root: H256,
    #[serde(with = "hex_serde::bytes")]
    pub key: Vec<u8>,
    #[serde(with = "hex_serde::bytes_list")]
    pub proof: Vec<Vec<u8>>,
    /// `None` when the key should be absent.
    #[serde(with = "hex_serde::option_bytes")]
    pub expected_value: Option<Vec<u8>>,
}

impl ProofRequest {
    pub fn verify(&self) -> VerificationOutcome {
        verify(&self.expected_root, &self.key, &self.proof, self.expected_value.as_deref())
    }

    /// Whether `outcome` agrees with the expectation: present when a value is
    /// expected, absent when none is.
    pub fn accepts(&self, outcome: &VerificationOutcome) -> bool {
        match (&self.expected_value, outcome) {
            (Some(_), VerificationOutcome::Present(_)) => true,
            (None, VerificationOutcome::Absent) => true,
            _ => false,
        }
    }

    pub fn into_input(self) -> MPTProofInput {
        MPTProofInput {
            key: self.key,
            value: self.expected_value,
            proof: self.proof,
            root: self.expected_root,
        }
    }
}

impl AccountProofResponse {
    pub fn is_empty_account(&self) -> bool {
        self.nonce.is_empty()
            && self.balance.is_empty()
            && (self.storage_hash == EMPTY_ROOT || self.storage_hash == [0u8; 32])
            && (self.code_hash == EMPTY_CODE_HASH || self.code_hash == [0u8; 32])
    }

    /// The state-trie leaf value: `rlp([nonce, balance, storageHash, codeHash])`.
    pub fn account_rlp(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(4);
        s.append(&self.nonce);
        s.append(&self.balance);
        s.append(&self.storage_hash.to_vec());
        s.append(&self.code_hash.to_vec());
        s.out().to_vec()
    }

    pub fn account_request(&self, state_root: H256) -> ProofRequest {
        ProofRequest {
            expected_root: state_root,
            key: keccak256(&self.address).to_vec(),
            proof: self.account_proof.clone(),
            expected_value: (!self.is_empty_account()).then(|| self.account_rlp()),
        }
    }

    pub fn storage_requests(&self) -> Vec<ProofRequest> {
        self.storage_proof
            .iter()
            .map(|slot| slot.request(self.storage_hash))
            .collect()
    }

    /// The account request followed by one request per storage slot.
    pub fn requests(&self, state_root: H256) -> Vec<ProofRequest> {
        let mut requests = vec![self.account_request(state_root)];
        requests.extend(self.storage_requests());
        debug!(
            address = %hex::encode(&self.address),
            slots = self.storage_proof.len(),
            "shaped proof requests"
        );
        requests
    }
}

impl StorageProofResponse {
    /// Zero slots are not stored, so a zero value is expected to be absent.
    pub fn request(&self, storage_root: H256) -> ProofRequest {
        let value = trim_leading_zeros(&self.value).to_vec();
        ProofRequest {
            expected_root: storage_root,
            key: keccak256(&self.key).to_vec(),
            proof: self.proof.clone(),
            expected_value: (!value.is_empty()).then(|| rlp::encode(&value).to_vec()),
        }
    }
}
