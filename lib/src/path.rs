use thiserror::Error;

/// Failures decoding a hex-prefix (compact) path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty compact path")]
    Empty,

    #[error("invalid hex-prefix flag {0:#x}")]
    InvalidFlag(u8),

    #[error("non-zero padding nibble {0:#x} in even-length path")]
    NonZeroPadding(u8),
}

/// Hex-prefix encodes `nibbles` for a leaf or extension node.
///
/// The high nibble of the first byte is the flag: bit 0 marks an odd length,
/// bit 1 a leaf. Odd paths carry their first nibble in the low half of that
/// byte; even paths pad it with zero.
pub fn encode_path(nibbles: &[u8], is_leaf: bool) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(nibbles.len() / 2 + 1);
    let odd_len = nibbles.len() % 2 == 1;

    let prefix = ((is_leaf as u8) << 1) | odd_len as u8;

    let rest = if odd_len {
        encoded.push((prefix << 4) | nibbles[0]);
        &nibbles[1..]
    } else {
        encoded.push(prefix << 4);
        nibbles
    };

    encoded.extend(rest.chunks_exact(2).map(|pair| (pair[0] << 4) | pair[1]));
    encoded
}

/// Inverse of [`encode_path`], returning the nibbles and the leaf flag.
pub fn decode_path(encoded: &[u8]) -> Result<(Vec<u8>, bool), PathError> {
    let (&first, rest) = encoded.split_first().ok_or(PathError::Empty)?;

    let prefix = first >> 4;
    if prefix > 0x3 {
        return Err(PathError::InvalidFlag(prefix));
    }
    let is_leaf = (prefix & 0x2) != 0;
    let odd_len = (prefix & 0x1) != 0;

    let mut nibbles = Vec::with_capacity(rest.len() * 2 + 1);
    if odd_len {
        nibbles.push(first & 0x0f);
    } else if first & 0x0f != 0 {
        return Err(PathError::NonZeroPadding(first & 0x0f));
    }
    nibbles.extend(to_nibbles(rest));

    Ok((nibbles, is_leaf))
}

/// Splits each byte into its high and low nibble.
pub fn to_nibbles(data: &[u8]) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(data.len() * 2);
    for &byte in data {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0f);
    }
    nibbles
}

/// Packs nibbles two per byte; an odd tail is padded with a zero low nibble.
pub fn from_nibbles(nibbles: &[u8]) -> Vec<u8> {
    nibbles
        .chunks(2)
        .map(|chunk| (chunk[0] << 4) | chunk.get(1).copied().unwrap_or(0))
        .collect()
}

/// Length of the shared prefix of two nibble paths.
pub fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}
