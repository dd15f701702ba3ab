//! Trigger events: the batches that invoke each stage.
//!
//! Storage-triggered stages receive
//! `{"Records":[{"s3":{"bucket":{"name":"..."},"object":{"key":"..."}}}]}`,
//! the notification-triggered stage receives
//! `{"Records":[{"Sns":{"Message":"{\"JobId\":\"...\",\"Status\":\"SUCCEEDED\"}"}}]}`.

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};
use crate::model::job::ObjectRef;
use crate::parser::header::percent_decode;

/// Status a completion message carries when the job produced results.
pub const STATUS_SUCCEEDED: &str = "SUCCEEDED";

/// A batch of object-created notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<StorageRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Object {
    /// URL-encoded object key, as delivered.
    pub key: String,
}

impl StorageEvent {
    /// Build an event for the given objects (keys are encoded as a real
    /// notification would carry them).
    pub fn for_objects<'a>(objects: impl IntoIterator<Item = &'a ObjectRef>) -> Self {
        Self {
            records: objects
                .into_iter()
                .map(|obj| StorageRecord {
                    s3: S3Entity {
                        bucket: S3Bucket {
                            name: obj.bucket.clone(),
                        },
                        object: S3Object {
                            key: encode_key(&obj.key),
                        },
                    },
                })
                .collect(),
        }
    }

    /// The objects this event refers to, keys decoded.
    pub fn objects(&self) -> Result<Vec<ObjectRef>> {
        self.records
            .iter()
            .map(|record| {
                let bucket = &record.s3.bucket.name;
                let key = decode_key(&record.s3.object.key)?;
                if bucket.is_empty() || key.is_empty() {
                    return Err(IngestError::InvalidEvent(
                        "storage record without bucket or key".into(),
                    ));
                }
                Ok(ObjectRef::new(bucket.clone(), key))
            })
            .collect()
    }
}

/// Decode an event object key: `+` is a space, `%XX` an escaped byte.
pub fn decode_key(raw: &str) -> Result<String> {
    let bytes = percent_decode(&raw.replace('+', " "));
    String::from_utf8(bytes)
        .map_err(|_| IngestError::InvalidEvent(format!("object key '{raw}' is not UTF-8")))
}

/// Inverse of [`decode_key`]: keeps unreserved characters and `/`.
pub fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// A batch of completion notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<NotificationRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    #[serde(rename = "Sns")]
    pub sns: SnsPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnsPayload {
    /// JSON-encoded [`CompletionMessage`].
    #[serde(rename = "Message")]
    pub message: String,
}

/// What the OCR service publishes when a job finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMessage {
    #[serde(rename = "JobId")]
    pub job_id: String,

    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl CompletionMessage {
    /// A missing status is taken as success.
    pub fn succeeded(&self) -> bool {
        self.status
            .as_deref()
            .map_or(true, |s| s.eq_ignore_ascii_case(STATUS_SUCCEEDED))
    }
}

impl NotificationEvent {
    /// Build an event carrying the given completion messages.
    pub fn for_messages<'a>(messages: impl IntoIterator<Item = &'a CompletionMessage>) -> Result<Self> {
        let records = messages
            .into_iter()
            .map(|m| {
                Ok(NotificationRecord {
                    sns: SnsPayload {
                        message: serde_json::to_string(m)?,
                    },
                })
            })
            .collect::<Result<_>>()?;
        Ok(Self { records })
    }

    /// Decode every record's message, in batch order.
    pub fn messages(&self) -> Result<Vec<CompletionMessage>> {
        self.records
            .iter()
            .map(|record| {
                let message: CompletionMessage = serde_json::from_str(&record.sns.message)
                    .map_err(|e| {
                        IngestError::InvalidEvent(format!("completion message: {e}"))
                    })?;
                if message.job_id.trim().is_empty() {
                    return Err(IngestError::InvalidEvent(
                        "completion message without JobId".into(),
                    ));
                }
                Ok(message)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_storage_event() {
        let raw = r#"{"Records":[{"eventName":"ObjectCreated:Put","s3":{"bucket":{"name":"emails"},"object":{"key":"in/My+Scan%281%29.eml","size":10}}}]}"#;
        let event: StorageEvent = serde_json::from_str(raw).unwrap();
        let objects = event.objects().unwrap();
        assert_eq!(objects, vec![ObjectRef::new("emails", "in/My Scan(1).eml")]);
    }

    #[test]
    fn test_storage_event_without_records() {
        let event: StorageEvent = serde_json::from_str("{}").unwrap();
        assert!(event.objects().unwrap().is_empty());
    }

    #[test]
    fn test_storage_event_rejects_empty_key() {
        let raw = r#"{"Records":[{"s3":{"bucket":{"name":"emails"},"object":{"key":""}}}]}"#;
        let event: StorageEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(event.objects(), Err(IngestError::InvalidEvent(_))));
    }

    #[test]
    fn test_key_encoding_roundtrip() {
        let key = "2024/Résumé final+v2.pdf";
        assert_eq!(decode_key(&encode_key(key)).unwrap(), key);
        assert_eq!(encode_key("a b/c.pdf"), "a+b/c.pdf");
    }

    #[test]
    fn test_for_objects() {
        let obj = ObjectRef::new("content", "my file.pdf");
        let event = StorageEvent::for_objects([&obj]);
        assert_eq!(event.records[0].s3.object.key, "my+file.pdf");
        assert_eq!(event.objects().unwrap(), vec![obj]);
    }

    #[test]
    fn test_parse_notification_event() {
        let raw = r#"{"Records":[
            {"Sns":{"Message":"{\"JobId\":\"j1\",\"Status\":\"SUCCEEDED\",\"API\":\"StartDocumentTextDetection\"}"}},
            {"Sns":{"Message":"{\"JobId\":\"j2\"}"}}
        ]}"#;
        let event: NotificationEvent = serde_json::from_str(raw).unwrap();
        let messages = event.messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].job_id, "j1");
        assert!(messages[0].succeeded());
        assert_eq!(messages[1].status, None);
        assert!(messages[1].succeeded());
    }

    #[test]
    fn test_failed_status() {
        let msg = CompletionMessage {
            job_id: "j".into(),
            status: Some("FAILED".into()),
        };
        assert!(!msg.succeeded());
    }

    #[test]
    fn test_notification_message_errors() {
        let bad_json = NotificationEvent {
            records: vec![NotificationRecord {
                sns: SnsPayload {
                    message: "not json".into(),
                },
            }],
        };
        assert!(matches!(bad_json.messages(), Err(IngestError::InvalidEvent(_))));

        let no_id = NotificationEvent {
            records: vec![NotificationRecord {
                sns: SnsPayload {
                    message: r#"{"JobId":" "}"#.into(),
                },
            }],
        };
        assert!(matches!(no_id.messages(), Err(IngestError::InvalidEvent(_))));
    }

    #[test]
    fn test_for_messages_roundtrip() {
        let msg = CompletionMessage {
            job_id: "j1".into(),
            status: Some(STATUS_SUCCEEDED.into()),
        };
        let event = NotificationEvent::for_messages([&msg]).unwrap();
        assert_eq!(event.messages().unwrap(), vec![msg]);
    }
}
