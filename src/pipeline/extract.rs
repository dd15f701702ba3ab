//! Attachment Extractor stage: raw email in, one stored object per attachment out.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::error::{IngestError, Result};
use crate::event::StorageEvent;
use crate::model::attachment::Attachment;
use crate::model::job::ObjectRef;
use crate::parser::mime;
use crate::store::ObjectStore;

use super::StageResponse;

/// Longest file name kept from a disposition, in characters.
const MAX_FILENAME_CHARS: usize = 200;

/// An attachment written to the content bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAttachment {
    pub key: String,
    pub size: u64,
    pub part_index: usize,
    pub content_type: String,
}

/// A part that looked like an attachment but could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPart {
    pub part_index: Option<usize>,
    pub reason: String,
}

/// Outcome of extracting one email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    pub source: ObjectRef,
    pub stored: Vec<StoredAttachment>,
    pub skipped: Vec<SkippedPart>,
}

/// Reads emails from the store and writes their attachments to the
/// content bucket.
#[derive(Debug, Clone)]
pub struct ExtractStage<S> {
    store: S,
    content_bucket: String,
    key_prefix: String,
}

impl<S: ObjectStore> ExtractStage<S> {
    pub fn new(store: S, content_bucket: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            content_bucket: content_bucket.into(),
            key_prefix: key_prefix.into(),
        }
    }

    pub fn from_config(store: S, config: &StorageConfig) -> Self {
        Self::new(store, &config.content_bucket, &config.key_prefix)
    }

    /// Run the stage over a batch. A store or whole-message failure aborts
    /// the batch; bad attachments are only reported.
    pub fn handle(&self, event: &StorageEvent) -> Result<StageResponse> {
        let reports = event
            .objects()?
            .iter()
            .map(|source| self.extract_object(source))
            .collect::<Result<Vec<_>>>()?;
        Ok(StageResponse::ok(serde_json::to_value(reports)?))
    }

    /// Extract one stored email.
    pub fn extract_object(&self, source: &ObjectRef) -> Result<ExtractReport> {
        let raw = self.store.get(&source.bucket, &source.key)?;
        let found = mime::extract_attachments(&raw)?;

        let mut report = ExtractReport {
            source: source.clone(),
            stored: Vec::new(),
            skipped: Vec::new(),
        };
        let mut used_keys = HashSet::new();

        for attachment in found {
            let attachment = match attachment {
                Ok(attachment) => attachment,
                Err(e) => {
                    warn!(source = %source, error = %e, "Skipping malformed attachment");
                    report.skipped.push(SkippedPart {
                        part_index: part_index_of(&e),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let key = unique_key(&attachment_key(&self.key_prefix, &attachment), &mut used_keys);
            self.store
                .put(&self.content_bucket, &key, &attachment.payload)?;
            info!(
                source = %source,
                bucket = %self.content_bucket,
                key = %key,
                size = attachment.size(),
                "Stored attachment"
            );
            report.stored.push(StoredAttachment {
                key,
                size: attachment.size(),
                part_index: attachment.part_index,
                content_type: attachment.content_type,
            });
        }

        if report.stored.is_empty() && report.skipped.is_empty() {
            info!(source = %source, "No attachments found");
        }
        Ok(report)
    }
}

fn part_index_of(error: &IngestError) -> Option<usize> {
    match error {
        IngestError::Parse { part, .. } => Some(*part),
        _ => None,
    }
}

/// Key for an attachment: the prefix plus its cleaned filename, or
/// `attachment_<part>` when it declares none.
pub fn attachment_key(prefix: &str, attachment: &Attachment) -> String {
    let name = attachment
        .filename
        .as_deref()
        .and_then(clean_filename)
        .unwrap_or_else(|| format!("attachment_{}", attachment.part_index));
    format!("{prefix}{name}")
}

/// Make a declared filename usable as the last segment of a key.
///
/// Path separators and control characters become `_`; names that are
/// empty or pure dots are rejected.
pub fn clean_filename(name: &str) -> Option<String> {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .take(MAX_FILENAME_CHARS)
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// If `key` was already used for this message, append a counter before the
/// extension. Deterministic for a given message, so re-running the stage
/// rewrites the same keys.
fn unique_key(key: &str, used: &mut HashSet<String>) -> String {
    if used.insert(key.to_string()) {
        return key.to_string();
    }

    let (stem, ext) = match key.rfind('.') {
        Some(dot) if dot > key.rfind('/').map_or(0, |s| s + 1) => (&key[..dot], &key[dot..]),
        _ => (key, ""),
    };
    for i in 1.. {
        let candidate = format!("{stem}_{i}{ext}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
    }
    unreachable!("unbounded counter")
}
