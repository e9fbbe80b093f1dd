use alloy_primitives::{Bytes, B256};
use alloy_sol_types::{sol, SolValue};

pub mod types;
pub mod rlp_encoding;
pub mod path;
pub mod node;
pub mod mpt;
pub mod hex_serde;
pub mod account;

#[cfg(any(test, feature = "test-utils"))]
pub mod builder;

pub use types::*;
pub use rlp_encoding::*;
pub use path::*;
pub use node::*;
pub use mpt::*;
pub use account::*;

#[cfg(any(test, feature = "test-utils"))]
pub use builder::*;

sol! {
    /// A verification result as seen by a Solidity verifier.
    struct MPTProofOutput {
        bool verified;
        bytes32 root;
        bytes key;
        bytes value;
    }
}

impl From<&MPTVerificationResult> for MPTProofOutput {
    fn from(result: &MPTVerificationResult) -> Self {
        MPTProofOutput {
            verified: result.verified,
            root: B256::from(result.root),
            key: Bytes::from(result.key.clone()),
            value: Bytes::from(result.value.clone()),
        }
    }
}

impl MPTVerificationResult {
    /// ABI encoding of [`MPTProofOutput`] for EVM consumers.
    pub fn abi_encode(&self) -> Vec<u8> {
        MPTProofOutput::from(self).abi_encode()
    }
}
