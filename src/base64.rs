//! The base64 codec.
//!
//! A thin wrapper over the `base64` crate's standard alphabet engine —
//! this crate's job is just the strict/lenient error policy the parser
//! and visitors need, not reimplementing base64 itself.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{Error, Result};

/// Decodes standard base64 `text`. In strict mode, any byte outside the
/// alphabet (or malformed padding) raises [`Error::InvalidBase64`]; in
/// lenient mode the same condition instead yields an empty buffer.
pub fn decode(text: &str, strict: bool) -> Result<Vec<u8>> {
    match STANDARD.decode(text.as_bytes()) {
        Ok(bytes) => Ok(bytes),
        Err(_) if strict => Err(Error::InvalidBase64 { position: 0 }),
        Err(_) => Ok(Vec::new()),
    }
}

/// Encodes `bytes` as standard base64 text.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_identity() {
        for sample in [&b""[..], b"a", b"ab", b"abc", b"Hello, world!", &[0u8, 1, 2, 255, 254]] {
            let encoded = encode(sample);
            assert_eq!(decode(&encoded, true).unwrap(), sample);
        }
    }

    #[test]
    fn strict_mode_rejects_bad_alphabet() {
        assert!(decode("not-base64!!", true).is_err());
    }

    #[test]
    fn lenient_mode_returns_empty_on_bad_input() {
        assert_eq!(decode("not-base64!!", false).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn padding_variants_decode_correctly() {
        assert_eq!(decode("SGVsbG8=", true).unwrap(), b"Hello");
        assert_eq!(decode("SGVsbG8h", true).unwrap(), b"Hello!");
    }
}
