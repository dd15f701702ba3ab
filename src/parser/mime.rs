//! MIME message parsing: part tree construction and attachment extraction.

use mail_parser::{Message, MessageParser, PartType};
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::model::attachment::Attachment;
use crate::model::part::{Headers, MessagePart};
use crate::parser::{disposition, header, transfer};

/// Maximum nesting depth of multiparts and embedded messages (to bound
/// recursion on adversarial input). Deeper content is kept as an opaque leaf.
const MAX_DEPTH: usize = 10;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Parse a complete raw message (headers + body) into a [`MessagePart`] tree.
///
/// Uses `mail-parser` for the structure and transfer decoding. Header values
/// are taken verbatim from the raw bytes so that disposition parameters can
/// be parsed exactly as written.
pub fn parse_message(raw_message: &[u8]) -> Result<MessagePart> {
    parse_at_depth(skip_from_line(raw_message), 0)
}

/// Extract every part whose disposition is `attachment`.
///
/// The outer `Result` fails only when the message itself cannot be parsed.
/// Each inner `Result` is scoped to one attachment: a malformed disposition
/// on one part does not affect its siblings.
pub fn extract_attachments(raw_message: &[u8]) -> Result<Vec<Result<Attachment>>> {
    let root = parse_message(raw_message)?;
    Ok(attachments_in(&root))
}

/// Collect attachments from an already parsed tree, in document order.
pub fn attachments_in(root: &MessagePart) -> Vec<Result<Attachment>> {
    root.walk()
        .enumerate()
        .filter_map(|(index, part)| attachment_from_part(index, part))
        .collect()
}

/// `None` when the part is not an attachment at all.
fn attachment_from_part(index: usize, part: &MessagePart) -> Option<Result<Attachment>> {
    let value = part.headers().get("content-disposition")?;
    if !disposition::is_attachment(value) {
        return None;
    }

    let params = match disposition::parse_params(value) {
        Ok(params) => params,
        Err(e) => {
            return Some(Err(IngestError::Parse {
                part: index,
                reason: format!("Content-Disposition: {e}"),
            }))
        }
    };

    let content_type = part
        .headers()
        .get("content-type")
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    Some(Ok(Attachment {
        part_index: index,
        filename: disposition::filename(&params),
        params,
        content_type,
        payload: part.payload().to_vec(),
    }))
}

fn parse_at_depth(raw: &[u8], depth: usize) -> Result<MessagePart> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(IngestError::MalformedMessage("empty message".into()));
    }

    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| IngestError::MalformedMessage("not an RFC 5322 message".into()))?;
    if message.parts.is_empty() {
        return Err(IngestError::MalformedMessage("message has no parts".into()));
    }

    Ok(build_part(raw, &message, 0, depth))
}

/// Convert part `id` of a parsed message (and its children) into our tree.
fn build_part(raw: &[u8], message: &Message<'_>, id: usize, depth: usize) -> MessagePart {
    let Some(part) = message.parts.get(id) else {
        return MessagePart::Leaf {
            headers: Headers::default(),
            body: Vec::new(),
        };
    };
    let headers = raw_headers(raw, part);

    match &part.body {
        PartType::Multipart(children) if depth < MAX_DEPTH => MessagePart::Multipart {
            headers,
            children: children
                .iter()
                .map(|&child| build_part(raw, message, child as usize, depth + 1))
                .collect(),
        },
        PartType::Message(_) if depth < MAX_DEPTH => {
            let inner_raw = part.contents().to_vec();
            // Re-parse so header offsets are relative to the enclosed bytes.
            match parse_at_depth(&inner_raw, depth + 1) {
                Ok(inner) => MessagePart::Embedded {
                    headers,
                    raw: inner_raw,
                    message: Box::new(inner),
                },
                Err(e) => {
                    debug!(part = id, error = %e, "Embedded message not parseable, keeping raw");
                    MessagePart::Leaf {
                        headers,
                        body: inner_raw,
                    }
                }
            }
        }
        PartType::Text(_) | PartType::Html(_) => {
            let body = text_body(raw, part, &headers);
            MessagePart::Leaf { headers, body }
        }
        // Past the depth limit a container is kept whole, undecoded.
        PartType::Multipart(_) => MessagePart::Leaf {
            headers,
            body: raw
                .get(part.offset_body..part.offset_end)
                .unwrap_or_default()
                .to_vec(),
        },
        _ => MessagePart::Leaf {
            headers,
            body: part.contents().to_vec(),
        },
    }
}

/// `mail-parser` converts text parts to UTF-8 from their declared charset.
/// Attachments must keep their exact bytes, so decode the raw body instead.
fn text_body(raw: &[u8], part: &mail_parser::MessagePart<'_>, headers: &Headers) -> Vec<u8> {
    match raw.get(part.offset_body..part.offset_end) {
        Some(body) => transfer::decode_body(headers.get("content-transfer-encoding"), body),
        None => part.contents().to_vec(),
    }
}

/// Read a part's header fields straight from the raw bytes, unfolded.
fn raw_headers(raw: &[u8], part: &mail_parser::MessagePart<'_>) -> Headers {
    Headers::new(part.headers.iter().filter_map(|h| {
        let field = raw.get(h.offset_field as usize..h.offset_start as usize)?;
        let value = raw.get(h.offset_start as usize..h.offset_end as usize)?;

        let name = header::decode_header_bytes(field);
        let name = name.trim().trim_end_matches(':').trim();
        if name.is_empty() {
            return None;
        }
        let value = header::decode_header_bytes(value);
        let value = header::unfold(value.trim_start_matches(':'));
        Some((name.to_string(), value))
    }))
}

/// Skip an MBOX `From ` separator line (and a UTF-8 BOM) at the start of
/// the message, in case the stored object was cut from an mbox.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
