//! Attachments found in a message.

use std::collections::BTreeMap;

/// An attachment extracted from a message.
///
/// Built from a part whose `Content-Disposition` starts with `attachment`.
/// The payload is already content-transfer-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Position of the originating part in the document-order walk (root = 0).
    pub part_index: usize,

    /// Disposition parameters, keys lower-cased, values with one matching
    /// pair of quotes stripped.
    pub params: BTreeMap<String, String>,

    /// Filename resolved from the parameters, if any.
    pub filename: Option<String>,

    /// MIME content type of the originating part (e.g. `"application/pdf"`).
    pub content_type: String,

    /// Decoded bytes.
    pub payload: Vec<u8>,
}

impl Attachment {
    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }
}
