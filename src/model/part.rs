//! The parsed MIME tree.
//!
//! A message is a tree of [`MessagePart`]s. Leaves carry their
//! transfer-decoded body, multiparts carry their children in document order,
//! and embedded `message/rfc822` parts carry both the raw enclosed message
//! and its parsed root.

/// Header fields of one part, in source order. Names are stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Build from `(name, value)` pairs. Names are lower-cased.
    pub fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
        )
    }

    /// First value for a header name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the header is present (case-insensitive).
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One node of a parsed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePart {
    /// A single body part with its content-transfer-decoded payload.
    Leaf { headers: Headers, body: Vec<u8> },

    /// A `multipart/*` container.
    Multipart {
        headers: Headers,
        children: Vec<MessagePart>,
    },

    /// A `message/rfc822` part: the enclosed message bytes and its parsed root.
    Embedded {
        headers: Headers,
        raw: Vec<u8>,
        message: Box<MessagePart>,
    },
}

impl MessagePart {
    pub fn headers(&self) -> &Headers {
        match self {
            Self::Leaf { headers, .. }
            | Self::Multipart { headers, .. }
            | Self::Embedded { headers, .. } => headers,
        }
    }

    /// The decoded payload of this part. Empty for multipart containers.
    pub fn payload(&self) -> &[u8] {
        match self {
            Self::Leaf { body, .. } => body,
            Self::Embedded { raw, .. } => raw,
            Self::Multipart { .. } => &[],
        }
    }

    /// Depth-first, document-order walk over this part and all descendants.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

/// Iterator returned by [`MessagePart::walk`].
///
/// The walk is lazy and consumes its worklist as it goes; call
/// [`MessagePart::walk`] again to start over.
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<&'a MessagePart>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a MessagePart;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        match part {
            MessagePart::Multipart { children, .. } => {
                // Reverse so the first child is popped next.
                self.stack.extend(children.iter().rev());
            }
            MessagePart::Embedded { message, .. } => self.stack.push(message),
            MessagePart::Leaf { .. } => {}
        }
        Some(part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> MessagePart {
        MessagePart::Leaf {
            headers: Headers::new([("X-Name".to_string(), name.to_string())]),
            body: name.as_bytes().to_vec(),
        }
    }

    fn names(part: &MessagePart) -> Vec<String> {
        part.walk()
            .filter_map(|p| p.headers().get("x-name").map(String::from))
            .collect()
    }

    #[test]
    fn test_headers_case_insensitive() {
        let headers = Headers::new([(
            "Content-Disposition".to_string(),
            "attachment".to_string(),
        )]);
        assert_eq!(headers.get("content-disposition"), Some("attachment"));
        assert_eq!(headers.get("CONTENT-DISPOSITION"), Some("attachment"));
        assert!(!headers.contains("content-type"));
    }

    #[test]
    fn test_walk_document_order() {
        let tree = MessagePart::Multipart {
            headers: Headers::default(),
            children: vec![
                leaf("a"),
                MessagePart::Multipart {
                    headers: Headers::default(),
                    children: vec![leaf("b"), leaf("c")],
                },
                leaf("d"),
            ],
        };
        assert_eq!(names(&tree), vec!["a", "b", "c", "d"]);
        assert_eq!(tree.walk().count(), 6);
    }

    #[test]
    fn test_walk_includes_root_leaf() {
        let root = leaf("only");
        assert_eq!(names(&root), vec!["only"]);
    }

    #[test]
    fn test_walk_descends_into_embedded() {
        let tree = MessagePart::Multipart {
            headers: Headers::default(),
            children: vec![
                MessagePart::Embedded {
                    headers: Headers::default(),
                    raw: b"raw".to_vec(),
                    message: Box::new(leaf("inner")),
                },
                leaf("after"),
            ],
        };
        assert_eq!(names(&tree), vec!["inner", "after"]);
    }

    #[test]
    fn test_payload() {
        assert_eq!(leaf("x").payload(), b"x");
        let multi = MessagePart::Multipart {
            headers: Headers::default(),
            children: vec![],
        };
        assert!(multi.payload().is_empty());
    }
}
