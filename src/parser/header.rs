//! Header value decoding: raw bytes, folding, RFC 2047 encoded-words and
//! RFC 2231 extended parameter values.

use tracing::warn;

use super::transfer;

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold a raw header value: continuation lines are joined with a single
/// space and the result is trimmed.
pub fn unfold(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for line in value.lines() {
        let piece = line.trim();
        if piece.is_empty() {
            continue;
        }
        if !result.is_empty() {
            result.push(' ');
        }
        result.push_str(piece);
    }
    result
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Tokens that fail to decode are kept verbatim.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two adjacent encoded-words is dropped (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];
        match decode_one_word(after_start) {
            Some((text, consumed)) => {
                result.push_str(&text);
                remaining = &after_start[consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str("=?");
                remaining = after_start;
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    result
}

/// Decode `charset?encoding?text?=` (the part after `=?`).
///
/// Returns the decoded text and the number of bytes consumed.
fn decode_one_word(s: &str) -> Option<(String, usize)> {
    let (charset, rest) = s.split_once('?')?;
    let (encoding, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let encoded_text = &rest[..end];

    let consumed = charset.len() + 1 + encoding.len() + 1 + end + 2;

    let bytes = match encoding {
        "B" | "b" => transfer::decode_base64(encoded_text.as_bytes())?,
        "Q" | "q" => decode_q(encoded_text),
        _ => return None,
    };

    // RFC 2231 allows a language suffix: "UTF-8*en"
    let charset = charset.split('*').next().unwrap_or(charset);
    Some((decode_charset(charset, &bytes), consumed))
}

/// Decode an RFC 2231 extended value: `charset'language'percent-encoded`.
///
/// A value without the two `'` delimiters is percent-decoded as UTF-8.
pub fn decode_rfc2231(value: &str) -> String {
    let mut pieces = value.splitn(3, '\'');
    match (pieces.next(), pieces.next(), pieces.next()) {
        (Some(charset), Some(_language), Some(encoded)) => {
            let charset = if charset.is_empty() { "us-ascii" } else { charset };
            decode_charset(charset, &percent_decode(encoded))
        }
        _ => String::from_utf8_lossy(&percent_decode(value)).into_owned(),
    }
}

/// Decode `%XX` escapes. Invalid escapes are kept verbatim.
pub fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Some(byte) = hex_byte(bytes[i + 1], bytes[i + 2]) {
                result.push(byte);
                i += 3;
                continue;
            }
        }
        result.push(bytes[i]);
        i += 1;
    }
    result
}

fn hex_byte(hi: u8, lo: u8) -> Option<u8> {
    let digit = |c: u8| (c as char).to_digit(16);
    Some((digit(hi)? * 16 + digit(lo)?) as u8)
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match hex_byte(bytes[i + 1], bytes[i + 2]) {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    None => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    if charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("utf8") {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    match encoding_rs::Encoding::for_label(charset.trim().as_bytes()) {
        Some(encoding) => {
            let (decoded, _, _) = encoding.decode(bytes);
            decoded.into_owned()
        }
        None => {
            warn!(charset, "Unknown charset, falling back to UTF-8 lossy");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_unpadded_and_invalid_base64_words() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?w6kucGRm?="), "é.pdf");
        assert_eq!(decode_encoded_words("=?UTF-8?B?SG9sYQ?="), "Hola");
        // Not base64: left as written.
        assert_eq!(decode_encoded_words("=?UTF-8?B?S*?="), "=?UTF-8?B?S*?=");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode_encoded_words("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_decode_adjacent_encoded_words() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
    }

    #[test]
    fn test_decode_mixed_plain_and_encoded() {
        let input = "scan =?UTF-8?Q?r=C3=A9sum=C3=A9?=.pdf";
        assert_eq!(decode_encoded_words(input), "scan résumé.pdf");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(decode_encoded_words("invoice.pdf"), "invoice.pdf");
        assert_eq!(decode_encoded_words("a=?b"), "a=?b");
    }

    #[test]
    fn test_unfold() {
        assert_eq!(
            unfold(" attachment;\r\n\tfilename=\"long name.pdf\"\r\n"),
            "attachment; filename=\"long name.pdf\""
        );
    }

    #[test]
    fn test_decode_header_bytes_latin1_fallback() {
        assert_eq!(decode_header_bytes(b"caf\xe9"), "café");
        assert_eq!(decode_header_bytes(b"\xEF\xBB\xBFplain"), "plain");
    }

    #[test]
    fn test_decode_rfc2231() {
        assert_eq!(decode_rfc2231("UTF-8''r%C3%A9sum%C3%A9.pdf"), "résumé.pdf");
        assert_eq!(decode_rfc2231("iso-8859-1'en'caf%E9.txt"), "café.txt");
        assert_eq!(decode_rfc2231("plain%20name.txt"), "plain name.txt");
    }

    #[test]
    fn test_percent_decode_keeps_invalid_escapes() {
        assert_eq!(percent_decode("100%"), b"100%");
        assert_eq!(percent_decode("%zz%41"), b"%zzA");
    }
}
