//! Content-Transfer-Encoding decoding for part bodies and encoded-words.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use mail_parser::decoders::quoted_printable::quoted_printable_decode;
use tracing::warn;

/// Standard alphabet; padding optional and stray trailing bits tolerated,
/// as real mail is sloppy about both.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decode base64 text, ignoring line breaks and other whitespace.
pub fn decode_base64(input: &[u8]) -> Option<Vec<u8>> {
    let compact: Vec<u8> = input
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64.decode(compact).ok()
}

/// Undo a part's Content-Transfer-Encoding, nothing more: no charset
/// conversion, so the result is the exact bytes the sender encoded.
///
/// `7bit`, `8bit`, `binary` and unknown encodings pass through. A body that
/// does not decode under its declared encoding is kept as transmitted.
pub fn decode_body(transfer_encoding: Option<&str>, body: &[u8]) -> Vec<u8> {
    let encoding = transfer_encoding
        .and_then(|value| value.split_whitespace().next())
        .map(str::to_ascii_lowercase);

    let decoded = match encoding.as_deref() {
        Some("base64") => decode_base64(body),
        Some("quoted-printable") => quoted_printable_decode(body),
        _ => return body.to_vec(),
    };
    decoded.unwrap_or_else(|| {
        warn!(encoding = ?encoding, "Part body does not decode, keeping it as transmitted");
        body.to_vec()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_with_line_breaks() {
        assert_eq!(decode_base64(b"SGVs\r\nbG8=\r\n").unwrap(), b"Hello");
        assert_eq!(decode_base64(b"SGVsbG8").unwrap(), b"Hello");
        assert!(decode_base64(b"S*Vs").is_none());
    }

    #[test]
    fn test_decode_body_keeps_non_utf8_bytes() {
        assert_eq!(decode_body(Some("base64"), b"/wABAg==\r\n"), [0xFF, 0, 1, 2]);
        assert_eq!(decode_body(Some(" BASE64 "), b"Y2Fm6Q=="), b"caf\xe9");
        assert_eq!(decode_body(Some("quoted-printable"), b"caf=E9"), b"caf\xe9");
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        assert_eq!(
            decode_body(Some("Quoted-Printable"), b"a,b=\r\n,c\r\n1,2,3"),
            b"a,b,c\r\n1,2,3"
        );
    }

    #[test]
    fn test_identity_encodings() {
        assert_eq!(decode_body(None, b"caf\xe9"), b"caf\xe9");
        assert_eq!(decode_body(Some("8bit"), b"caf\xe9"), b"caf\xe9");
        assert_eq!(decode_body(Some("x-unknown"), b"=E9"), b"=E9");
    }

    #[test]
    fn test_undecodable_body_kept() {
        assert_eq!(decode_body(Some("base64"), b"not base64!"), b"not base64!");
    }
}
