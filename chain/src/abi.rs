//! Minimal ABI encoding/decoding for the three contract reads we perform.
//!
//! Everything the governor returns is a sequence of 32-byte words, so a
//! full ABI library would be overkill: selectors are pinned constants and
//! values are decoded by word offset.

use crate::ChainError;

/// `proposalCount()`
pub(crate) const SELECTOR_PROPOSAL_COUNT: &str = "da35c664";
/// `state(uint256)`
pub(crate) const SELECTOR_STATE: &str = "3e4f49e6";
/// `proposals(uint256)`
pub(crate) const SELECTOR_PROPOSALS: &str = "013cf08b";

const WORD: usize = 32;

/// Build the `data` field for an `eth_call`: selector plus one uint256
/// argument, hex-encoded with a `0x` prefix.
pub(crate) fn encode_call_u64(selector: &str, arg: u64) -> String {
    format!("0x{selector}{arg:064x}")
}

/// Selector-only call data.
pub(crate) fn encode_call(selector: &str) -> String {
    format!("0x{selector}")
}

/// Decode the `0x`-prefixed hex result of an `eth_call` into raw bytes.
pub(crate) fn decode_result(result: &str) -> Result<Vec<u8>, ChainError> {
    let stripped = result.strip_prefix("0x").unwrap_or(result);
    hex::decode(stripped).map_err(|e| ChainError::Decode(format!("invalid hex in result: {e}")))
}

fn word(data: &[u8], index: usize) -> Result<&[u8], ChainError> {
    let start = index * WORD;
    let end = start + WORD;
    data.get(start..end).ok_or_else(|| {
        ChainError::Decode(format!(
            "return data too short: wanted word {index}, have {} bytes",
            data.len()
        ))
    })
}

/// A uint sized to fit u64; higher bytes must be zero.
pub(crate) fn word_u64(data: &[u8], index: usize) -> Result<u64, ChainError> {
    let w = word(data, index)?;
    if w[..WORD - 8].iter().any(|&b| b != 0) {
        return Err(ChainError::Decode(format!("word {index} overflows u64")));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&w[WORD - 8..]);
    Ok(u64::from_be_bytes(buf))
}

/// A vote weight; uint256 truncation above u128 is rejected, not wrapped.
pub(crate) fn word_u128(data: &[u8], index: usize) -> Result<u128, ChainError> {
    let w = word(data, index)?;
    if w[..WORD - 16].iter().any(|&b| b != 0) {
        return Err(ChainError::Decode(format!("word {index} overflows u128")));
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&w[WORD - 16..]);
    Ok(u128::from_be_bytes(buf))
}

pub(crate) fn word_bool(data: &[u8], index: usize) -> Result<bool, ChainError> {
    Ok(word_u64(data, index)? != 0)
}

/// The low 20 bytes of the word, rendered in canonical `0x` form.
pub(crate) fn word_address(data: &[u8], index: usize) -> Result<String, ChainError> {
    let w = word(data, index)?;
    Ok(format!("0x{}", hex::encode(&w[WORD - 20..])))
}
