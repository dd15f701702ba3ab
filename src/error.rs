//! Centralized error types for mailocr.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailocr library.
#[derive(Error, Debug)]
pub enum IngestError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A single message part could not be interpreted. Never fatal to the
    /// rest of the message.
    #[error("Parse error in part {part}: {reason}")]
    Parse { part: usize, reason: String },

    /// The message as a whole is not parseable MIME.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// The requested object does not exist.
    #[error("Object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    /// A bucket or key that cannot be mapped onto the store.
    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// The OCR service rejected a job submission.
    #[error("OCR job submission failed for {bucket}/{key}: {source}")]
    Submission {
        bucket: String,
        key: String,
        #[source]
        source: Box<IngestError>,
    },

    /// A page fetch failed mid-aggregation. `page_offset` is the number of
    /// pages fetched successfully before the failure.
    #[error("Fetching results for job {job_id} failed after {page_offset} page(s): {source}")]
    FetchFailed {
        job_id: String,
        page_offset: usize,
        #[source]
        source: Box<IngestError>,
    },

    /// The aggregation hit its configured safety limit.
    #[error("Result set for job {job_id} exceeded {limit} after {page_offset} page(s)")]
    PageLimitExceeded {
        job_id: String,
        page_offset: usize,
        limit: PageLimit,
    },

    /// The completion notification reports a job that did not succeed.
    #[error("OCR job {job_id} finished with status {status}")]
    JobNotSucceeded { job_id: String, status: String },

    /// The OCR service has no record of the job.
    #[error("Unknown OCR job: {0}")]
    JobNotFound(String),

    /// A continuation token the service does not recognise.
    #[error("Invalid continuation token '{0}'")]
    InvalidToken(String),

    /// The trigger event does not have the expected shape.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Missing or unusable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The limit that stopped an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLimit {
    /// Maximum number of pages.
    Pages(usize),
    /// Maximum total serialized size of the responses, in bytes.
    Bytes(u64),
}

impl std::fmt::Display for PageLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pages(n) => write!(f, "the page limit of {n}"),
            Self::Bytes(n) => write!(f, "the size limit of {n} bytes"),
        }
    }
}

/// Convenience alias for `Result<T, IngestError>`.
pub type Result<T> = std::result::Result<T, IngestError>;

impl IngestError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error only affects a single message part.
    pub fn is_part_scoped(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}
