use num_bigint::BigUint;
use tiny_keccak::{Hasher, Keccak};

use crate::error::DecodeError;

pub const NAME_SIGNATURE: &str = "name()";
pub const SYMBOL_SIGNATURE: &str = "symbol()";
pub const DECIMALS_SIGNATURE: &str = "decimals()";

/// Compute the 4-byte selector from a canonical function signature.
pub fn selector_from_signature(canonical: &str) -> [u8; 4] {
    let mut hasher = Keccak::v256();
    hasher.update(canonical.as_bytes());
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// `eth_call` data for a function without arguments: its `0x`-prefixed selector.
pub fn call_data(canonical: &str) -> String {
    format!("0x{}", hex::encode(selector_from_signature(canonical)))
}

/// Decode a `0x`-prefixed hex string into bytes.
pub fn decode_hex(value: &str) -> Result<Vec<u8>, DecodeError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|e| DecodeError::InvalidHex(format!("{value}: {e}")))
}

/// Decode the return data of a call returning a single `string`.
///
/// Layout: a 32-byte offset word, then at that offset a 32-byte length word
/// followed by the UTF-8 bytes.
pub fn extract_eth_call_str(data: &[u8]) -> Result<String, DecodeError> {
    let offset = read_u256_as_usize(data, 0)?;
    let len = read_u256_as_usize(data, offset)?;
    let start = offset
        .checked_add(32)
        .ok_or_else(|| DecodeError::InvalidEncoding("string offset overflows".to_string()))?;
    ensure_bytes(data, start, len)?;
    let s = std::str::from_utf8(&data[start..start + len])
        .map_err(|e| DecodeError::InvalidEncoding(format!("invalid UTF-8: {e}")))?;
    Ok(s.to_string())
}

/// Decode `eth_call` hex output of a `string` function.
pub fn decode_string_result(result: &str) -> Result<String, DecodeError> {
    extract_eth_call_str(&decode_hex(result)?)
}

/// Decode `eth_call` hex output of `decimals()` as a big-endian integer.
pub fn decode_decimals_result(result: &str) -> Result<u8, DecodeError> {
    let digits = result.strip_prefix("0x").unwrap_or(result);
    let value = BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| DecodeError::InvalidHex(result.to_string()))?;
    u8::try_from(&value)
        .map_err(|_| DecodeError::InvalidEncoding(format!("decimals out of range: {value}")))
}

fn read_u256_as_usize(data: &[u8], offset: usize) -> Result<usize, DecodeError> {
    ensure_bytes(data, offset, 32)?;
    let word = &data[offset..offset + 32];
    for &b in &word[..24] {
        if b != 0 {
            return Err(DecodeError::InvalidEncoding(
                "offset too large for usize".to_string(),
            ));
        }
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..32]);
    usize::try_from(u64::from_be_bytes(bytes))
        .map_err(|_| DecodeError::InvalidEncoding("offset too large for usize".to_string()))
}

fn ensure_bytes(data: &[u8], offset: usize, len: usize) -> Result<(), DecodeError> {
    match offset.checked_add(len) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(DecodeError::DataTooShort {
            expected: offset.saturating_add(len),
            actual: data.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(n: usize) -> [u8; 32] {
        let mut w = [0u8; 32];
        w[24..].copy_from_slice(&(n as u64).to_be_bytes());
        w
    }

    fn encode_string(s: &str) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&word(32));
        data.extend_from_slice(&word(s.len()));
        let mut payload = s.as_bytes().to_vec();
        payload.resize(s.len().div_ceil(32).max(1) * 32, 0);
        data.extend_from_slice(&payload);
        data
    }

    #[test]
    fn test_call_data_of_erc20_getters() {
        assert_eq!(call_data(NAME_SIGNATURE), "0x06fdde03");
        assert_eq!(call_data(SYMBOL_SIGNATURE), "0x95d89b41");
        assert_eq!(call_data(DECIMALS_SIGNATURE), "0x313ce567");
        assert_eq!(selector_from_signature("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn test_extract_string() {
        let data = encode_string("FOO");
        assert_eq!(data.len(), 96);
        assert_eq!(extract_eth_call_str(&data).unwrap(), "FOO");
    }

    #[test]
    fn test_decode_string_result_from_hex() {
        let hex_result = format!("0x{}", hex::encode(encode_string("Wrapped Ether")));
        assert_eq!(decode_string_result(&hex_result).unwrap(), "Wrapped Ether");
    }

    #[test]
    fn test_bytes32_name_is_rejected() {
        // Non-conforming tokens (e.g. MKR) return bytes32 instead of string.
        let mut data = [0u8; 32];
        data[..3].copy_from_slice(b"MKR");
        assert!(extract_eth_call_str(&data).is_err());
    }

    #[test]
    fn test_truncated_string_is_rejected() {
        let mut data = encode_string("FOO");
        data.truncate(64);
        let err = extract_eth_call_str(&data).unwrap_err();
        assert!(matches!(err, DecodeError::DataTooShort { .. }));
    }

    #[test]
    fn test_empty_result_is_rejected() {
        assert!(decode_string_result("0x").is_err());
        assert!(decode_decimals_result("0x").is_err());
    }

    #[test]
    fn test_decode_decimals() {
        let eighteen = format!("0x{}", hex::encode(word(18)));
        assert_eq!(decode_decimals_result(&eighteen).unwrap(), 18);
        assert_eq!(decode_decimals_result("0x0").unwrap(), 0);
        assert_eq!(decode_decimals_result("0x06").unwrap(), 6);
    }

    #[test]
    fn test_decimals_out_of_range() {
        assert!(decode_decimals_result("0x0100").is_err());
        assert!(decode_decimals_result("0xzz").is_err());
    }
}
