use serde::{Deserialize, Serialize};

/// 32-byte hash type
pub type H256 = [u8; 32];

/// Root of the empty trie, `keccak256(rlp(""))`.
pub const EMPTY_ROOT: H256 = [
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
];

/// Hash of empty contract code, `keccak256("")`.
pub const EMPTY_CODE_HASH: H256 = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
];

/// Input for MPT proof verification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MPTProofInput {
    pub key: Vec<u8>,
    /// Claimed value; `None` verifies without comparing.
    pub value: Option<Vec<u8>>,
    /// RLP-encoded nodes, root first
    pub proof: Vec<Vec<u8>>,
    pub root: H256,
}

/// Output from MPT proof verification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MPTVerificationResult {
    pub verified: bool,
    pub key: Vec<u8>,
    /// Value proven present, empty when absent or invalid.
    pub value: Vec<u8>,
    pub root: H256,
}

/// Batch proof input for multiple key-value pairs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MPTBatchProofInput {
    pub proofs: Vec<MPTProofInput>,
    pub root: H256,
}

/// Batch verification result
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MPTBatchVerificationResult {
    pub all_verified: bool,
    pub individual_results: Vec<bool>,
    pub root: H256,
    pub count: usize,
}
