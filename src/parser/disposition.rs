//! `Content-Disposition` parsing.
//!
//! The value is split on `;` without regard to quoting, the first token is
//! the disposition type and the rest are `key=value` parameters.

use std::collections::BTreeMap;

use thiserror::Error;

use super::header::{decode_encoded_words, decode_rfc2231};

/// Why a disposition's parameters could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispositionError {
    /// A parameter token with no `=` in it.
    #[error("parameter '{0}' has no '='")]
    MissingEquals(String),

    /// A parameter token starting with `=`.
    #[error("parameter '{0}' has an empty name")]
    EmptyName(String),
}

/// Whether a `Content-Disposition` value marks an attachment.
///
/// Only the first `;`-separated token is looked at, case-insensitively.
pub fn is_attachment(value: &str) -> bool {
    value
        .split(';')
        .next()
        .map(|kind| kind.trim().eq_ignore_ascii_case("attachment"))
        .unwrap_or(false)
}

/// Parse the parameters of a `Content-Disposition` value.
///
/// Keys are lower-cased, values have one matching pair of `"` or `'`
/// stripped. Empty tokens (e.g. from a trailing `;`) are ignored. Later
/// duplicates overwrite earlier ones.
pub fn parse_params(value: &str) -> Result<BTreeMap<String, String>, DispositionError> {
    let mut params = BTreeMap::new();

    for token in value.split(';').skip(1).map(str::trim) {
        if token.is_empty() {
            continue;
        }
        let (key, val) = token
            .split_once('=')
            .ok_or_else(|| DispositionError::MissingEquals(token.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(DispositionError::EmptyName(token.to_string()));
        }
        params.insert(key.to_ascii_lowercase(), strip_quotes(val.trim()).to_string());
    }

    Ok(params)
}

/// Strip a single matching pair of leading/trailing `"` or `'`.
pub fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Resolve the filename from parsed disposition parameters.
///
/// `filename` wins (with RFC 2047 encoded-words decoded); otherwise the
/// RFC 2231 form `filename*` is decoded. Blank names count as absent.
pub fn filename(params: &BTreeMap<String, String>) -> Option<String> {
    let name = match (params.get("filename"), params.get("filename*")) {
        (Some(plain), _) => decode_encoded_words(plain),
        (None, Some(extended)) => decode_rfc2231(extended),
        (None, None) => return None,
    };
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}
