//! Argument validation
//!
//! Every option value destined for cryptographic use passes through here
//! before it is stored, so downstream code can rely on fixed-size buffers.

use thiserror::Error;

/// Hex character counts for each cryptographic option
pub const CHALLENGE_HEX_LEN: usize = 64;
pub const CHALLENGE_RESPONSE_HEX_LEN: usize = 64;
pub const META_DATA_HEX_LEN: usize = 26;
pub const SIGNATURE_HEX_LEN: usize = 128;
pub const PUBLIC_KEY_HEX_LEN: usize = 130;
pub const WRITE_DATA_HEX_LEN: usize = 64;

/// Reasons an option value is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    /// Wrong length or a non-hex character
    #[error("Invalid {what}: expected exactly {expected} hex characters")]
    InvalidHex { what: &'static str, expected: usize },

    /// Public key of the right length without the 0x04 tag
    #[error("Invalid P256 Public Key: must begin with the uncompressed point tag 04")]
    MissingUncompressedTag,

    /// Key slot that is not a number
    #[error("Invalid key slot '{0}': expected a number between 0 and 15")]
    InvalidKeySlot(String),

    /// Key slot outside [0, 15]
    #[error("Key slot {0} is out of range (0-15)")]
    KeySlotOutOfRange(i64),

    /// Address that is not a hex byte
    #[error("Invalid address '{0}': expected a hex value between 0x00 and 0xFF")]
    InvalidAddress(String),
}

/// Check that `value` is exactly `expected` hexadecimal characters.
///
/// Case-insensitive. Nothing is trimmed, so surrounding whitespace fails.
pub fn validate_hex(value: &str, expected: usize) -> bool {
    value.len() == expected && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Validate and decode a fixed-width hex value into `N` bytes
pub(crate) fn decode_fixed<const N: usize>(
    value: &str,
    what: &'static str,
) -> Result<[u8; N], ArgumentError> {
    let expected = N * 2;
    if !validate_hex(value, expected) {
        return Err(ArgumentError::InvalidHex { what, expected });
    }

    let mut bytes = [0u8; N];
    hex::decode_to_slice(value, &mut bytes)
        .map_err(|_| ArgumentError::InvalidHex { what, expected })?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_exact_length_hex() {
        assert!(validate_hex("00ff", 4));
        assert!(validate_hex("DEADbeef", 8));
        assert!(validate_hex(&"a".repeat(SIGNATURE_HEX_LEN), SIGNATURE_HEX_LEN));
    }

    #[test]
    fn test_rejects_wrong_length() {
        let value = "0123456789abcdef";
        assert!(validate_hex(value, value.len()));
        assert!(!validate_hex(value, value.len() - 1));
        assert!(!validate_hex(value, value.len() + 1));
    }

    #[test]
    fn test_rejects_empty_string() {
        for n in [2, 26, 64, 128, 130] {
            assert!(!validate_hex("", n));
        }
    }

    #[test]
    fn test_rejects_non_hex_characters() {
        assert!(!validate_hex("0g", 2));
        assert!(!validate_hex("0x", 2));
        assert!(!validate_hex(" 0ff", 4));
        assert!(!validate_hex("0ff ", 4));
        assert!(!validate_hex("00\n0", 4));
    }

    #[test]
    fn test_formatted_bytes_validate() {
        let raw: Vec<u8> = (0u8..=255).collect();
        for n in [13usize, 32, 64, 65] {
            let encoded = hex::encode(&raw[..n]);
            assert!(validate_hex(&encoded, 2 * n));
            assert!(validate_hex(&encoded.to_uppercase(), 2 * n));
        }
    }

    #[test]
    fn test_decode_fixed_reports_role_and_length() {
        let err = decode_fixed::<13>("abc", "Meta Data").unwrap_err();
        assert_eq!(
            err,
            ArgumentError::InvalidHex {
                what: "Meta Data",
                expected: META_DATA_HEX_LEN
            }
        );
        assert!(err.to_string().contains("26 hex characters"));

        let bytes = decode_fixed::<2>("0aFF", "Data").unwrap();
        assert_eq!(bytes, [0x0a, 0xff]);
    }
}
