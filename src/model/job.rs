//! OCR job and result-page types.

use serde::{Deserialize, Serialize};

/// Location of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// A submitted OCR job.
///
/// The job id is the only thing that links a submission to its later
/// completion notification; nothing else is kept between the two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrJob {
    pub job_id: String,
    pub source: ObjectRef,
    pub notification_channel: String,
    pub authorization_role: String,
}

/// One page of an OCR result stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPage {
    /// Raw service response.
    pub response: serde_json::Value,

    /// Continuation token. `None` marks the terminal page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl ResultPage {
    pub fn new(response: serde_json::Value, next_token: Option<String>) -> Self {
        Self {
            response,
            next_token,
        }
    }

    /// The continuation token, treating an empty token as absent.
    pub fn continuation(&self) -> Option<&str> {
        self.next_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn is_terminal(&self) -> bool {
        self.continuation().is_none()
    }
}

/// All result pages of one job, in fetch order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    job_id: String,
    pages: Vec<ResultPage>,
}

impl ResultSet {
    /// Only the aggregator builds result sets; it hands them out complete.
    pub(crate) fn new(job_id: String, pages: Vec<ResultPage>) -> Self {
        Self { job_id, pages }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn pages(&self) -> &[ResultPage] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn into_pages(self) -> Vec<ResultPage> {
        self.pages
    }
}
