//! `0x`-prefixed hex forms used by JSON-RPC proof responses.

use serde::{Deserialize, Deserializer, Serializer};
use thiserror::Error;

use crate::types::H256;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HexError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("expected at most {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

/// Decode hex with or without `0x`. Odd-length input gets a leading zero nibble.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, HexError> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    if digits.len() % 2 == 1 {
        Ok(hex::decode(format!("0{digits}"))?)
    } else {
        Ok(hex::decode(digits)?)
    }
}

/// Decode a 32-byte word, left-padding shorter input (`0x0` is slot zero).
pub fn decode_hash(s: &str) -> Result<H256, HexError> {
    let bytes = decode_hex(s)?;
    if bytes.len() > 32 {
        return Err(HexError::Length { expected: 32, actual: bytes.len() });
    }
    let mut hash = [0u8; 32];
    hash[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(hash)
}

pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Big-endian bytes with leading zeros removed; zero is empty.
pub fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

pub mod bytes {
    use serde::de::Error as _;

    use super::*;

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_hex(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_hex(&s).map_err(D::Error::custom)
    }
}

pub mod option_bytes {
    use serde::de::Error as _;

    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_some(&encode_hex(value)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| decode_hex(&s).map_err(D::Error::custom))
            .transpose()
    }
}

pub mod bytes_list {
    use serde::de::Error as _;
    use serde::ser::SerializeSeq;

    use super::*;

    pub fn serialize<S: Serializer>(value: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(value.len()))?;
        for item in value {
            seq.serialize_element(&encode_hex(item))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| decode_hex(s).map_err(D::Error::custom))
            .collect()
    }
}

pub mod hash {
    use serde::de::Error as _;

    use super::*;

    pub fn serialize<S: Serializer>(value: &H256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_hex(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<H256, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_hash(&s).map_err(D::Error::custom)
    }
}

/// JSON-RPC quantities such as `"0x1"`, held as trimmed big-endian bytes.
pub mod quantity {
    use serde::de::Error as _;

    use super::*;

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let digits = hex::encode(trim_leading_zeros(value));
        let digits = digits.trim_start_matches('0');
        serializer.serialize_str(&format!("0x{}", if digits.is_empty() { "0" } else { digits }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = decode_hex(&s).map_err(D::Error::custom)?;
        Ok(trim_leading_zeros(&bytes).to_vec())
    }
}
