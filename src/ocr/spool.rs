//! File-spool stand-in for a hosted OCR service.
//!
//! Layout under the spool directory:
//!
//! ```text
//! jobs/<job_id>.json              submitted job record
//! results/<job_id>/first.json     first result page
//! results/<job_id>/<token>.json   page reached through continuation token
//! ```
//!
//! Page files hold a serialized [`ResultPage`]. Something outside this
//! crate (an OCR worker, a test) produces them; the spool only serves them.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{IngestError, Result};
use crate::model::job::{ObjectRef, OcrJob, ResultPage};
use crate::store::fs::write_atomic;
use crate::store::ObjectStore;

use super::OcrService;

const FIRST_PAGE: &str = "first";

/// What `jobs/<job_id>.json` contains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(flatten)]
    pub job: OcrJob,
    pub submitted_at: DateTime<Utc>,
}

/// OCR service backed by a spool directory. Source documents are checked
/// against `sources` at submission time, as a hosted service would when it
/// assumes the authorization role.
#[derive(Debug, Clone)]
pub struct SpoolOcrService<S> {
    spool_dir: PathBuf,
    sources: S,
}

impl<S: ObjectStore> SpoolOcrService<S> {
    pub fn new(spool_dir: impl AsRef<Path>, sources: S) -> Self {
        Self {
            spool_dir: spool_dir.as_ref().to_path_buf(),
            sources,
        }
    }

    pub fn spool_dir(&self) -> &Path {
        &self.spool_dir
    }

    /// Deterministic job id: the same source always maps to the same job,
    /// so a redelivered storage event does not fan out into new jobs.
    pub fn job_id_for(source: &ObjectRef) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.bucket.as_bytes());
        hasher.update([0u8]);
        hasher.update(source.key.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Read a submitted job record.
    pub fn job(&self, job_id: &str) -> Result<JobRecord> {
        if !is_safe_name(job_id) {
            return Err(IngestError::JobNotFound(job_id.to_string()));
        }
        let path = self.job_path(job_id);
        let data = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IngestError::JobNotFound(job_id.to_string())
            } else {
                IngestError::io(&path, e)
            }
        })?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Publish a chain of result pages for a job, linking them with
    /// generated continuation tokens (`p0001`, `p0002`, ...).
    pub fn write_results(&self, job_id: &str, responses: &[serde_json::Value]) -> Result<()> {
        if !is_safe_name(job_id) {
            return Err(IngestError::JobNotFound(job_id.to_string()));
        }
        let dir = self.spool_dir.join("results").join(job_id);

        let token = |i: usize| format!("p{i:04}");
        for (i, response) in responses.iter().enumerate() {
            let name = if i == 0 { FIRST_PAGE.to_string() } else { token(i) };
            let next_token = (i + 1 < responses.len()).then(|| token(i + 1));
            let page = ResultPage::new(response.clone(), next_token);
            let path = dir.join(format!("{name}.json"));
            write_atomic(&path, &serde_json::to_vec_pretty(&page)?)?;
        }
        Ok(())
    }

    fn job_path(&self, job_id: &str) -> PathBuf {
        self.spool_dir.join("jobs").join(format!("{job_id}.json"))
    }
}

/// Job ids and tokens become file names; only allow a safe alphabet.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != FIRST_PAGE
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl<S: ObjectStore> OcrService for SpoolOcrService<S> {
    fn submit_async_job(
        &self,
        source: &ObjectRef,
        notification_channel: &str,
        authorization_role: &str,
    ) -> Result<String> {
        // The document must be readable before a job is accepted.
        self.sources.get(&source.bucket, &source.key)?;

        let job_id = Self::job_id_for(source);
        let record = JobRecord {
            job: OcrJob {
                job_id: job_id.clone(),
                source: source.clone(),
                notification_channel: notification_channel.to_string(),
                authorization_role: authorization_role.to_string(),
            },
            submitted_at: Utc::now(),
        };

        let path = self.job_path(&job_id);
        write_atomic(&path, &serde_json::to_vec_pretty(&record)?)?;

        info!(job_id = %job_id, source = %source, "Spooled OCR job");
        Ok(job_id)
    }

    fn fetch_result_page(
        &self,
        job_id: &str,
        continuation_token: Option<&str>,
    ) -> Result<ResultPage> {
        self.job(job_id)?;

        let name = match continuation_token {
            None => FIRST_PAGE,
            Some(token) => {
                if !is_safe_name(token) {
                    return Err(IngestError::InvalidToken(token.to_string()));
                }
                token
            }
        };
        let path = self
            .spool_dir
            .join("results")
            .join(job_id)
            .join(format!("{name}.json"));
        debug!(job_id, path = %path.display(), "Reading result page");

        let data = std::fs::read(&path).map_err(|e| match continuation_token {
            Some(token) if e.kind() == std::io::ErrorKind::NotFound => {
                IngestError::InvalidToken(token.to_string())
            }
            _ => IngestError::io(&path, e),
        })?;
        Ok(serde_json::from_slice(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;
    use serde_json::json;

    fn service(dir: &Path) -> SpoolOcrService<MemoryObjectStore> {
        let store = MemoryObjectStore::new();
        store.put("content", "a.pdf", b"%PDF").unwrap();
        SpoolOcrService::new(dir, store)
    }

    #[test]
    fn test_submit_records_job() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = service(dir.path());
        let source = ObjectRef::new("content", "a.pdf");
        let job_id = ocr.submit_async_job(&source, "topic", "role").unwrap();

        assert_eq!(job_id.len(), 64);
        let record = ocr.job(&job_id).unwrap();
        assert_eq!(record.job.source, source);
        assert_eq!(record.job.notification_channel, "topic");
        assert_eq!(record.job.authorization_role, "role");
    }

    #[test]
    fn test_job_id_is_deterministic_per_source() {
        let a = ObjectRef::new("b", "k1");
        let b = ObjectRef::new("b", "k2");
        type Spool = SpoolOcrService<MemoryObjectStore>;
        assert_eq!(Spool::job_id_for(&a), Spool::job_id_for(&a));
        assert_ne!(Spool::job_id_for(&a), Spool::job_id_for(&b));
        // The separator keeps ("ab","c") and ("a","bc") apart.
        assert_ne!(
            Spool::job_id_for(&ObjectRef::new("ab", "c")),
            Spool::job_id_for(&ObjectRef::new("a", "bc"))
        );
    }

    #[test]
    fn test_submit_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = service(dir.path());
        let err = ocr
            .submit_async_job(&ObjectRef::new("content", "missing.pdf"), "t", "r")
            .unwrap_err();
        assert!(matches!(err, IngestError::ObjectNotFound { .. }));
    }

    #[test]
    fn test_fetch_page_chain() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = service(dir.path());
        let job_id = ocr
            .submit_async_job(&ObjectRef::new("content", "a.pdf"), "t", "r")
            .unwrap();
        ocr.write_results(&job_id, &[json!({"n": 1}), json!({"n": 2})])
            .unwrap();

        let first = ocr.fetch_result_page(&job_id, None).unwrap();
        assert_eq!(first.response, json!({"n": 1}));
        let token = first.next_token.clone().unwrap();
        let second = ocr.fetch_result_page(&job_id, Some(&token)).unwrap();
        assert_eq!(second.response, json!({"n": 2}));
        assert!(second.is_terminal());
    }

    #[test]
    fn test_rewriting_results_replaces_pages_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = service(dir.path());
        let job_id = ocr
            .submit_async_job(&ObjectRef::new("content", "a.pdf"), "t", "r")
            .unwrap();
        ocr.write_results(&job_id, &[json!({"v": 1}), json!({"v": 1})])
            .unwrap();
        ocr.write_results(&job_id, &[json!({"v": 2}), json!({"v": 2})])
            .unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path().join("results").join(&job_id))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["first.json", "p0001.json"]);
        let first = ocr.fetch_result_page(&job_id, None).unwrap();
        assert_eq!(first.response, json!({"v": 2}));
    }

    #[test]
    fn test_fetch_unknown_job_and_bad_token() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = service(dir.path());
        let err = ocr.fetch_result_page("nope", None).unwrap_err();
        assert!(matches!(err, IngestError::JobNotFound(_)));
        let err = ocr.fetch_result_page("../etc", None).unwrap_err();
        assert!(matches!(err, IngestError::JobNotFound(_)));

        let job_id = ocr
            .submit_async_job(&ObjectRef::new("content", "a.pdf"), "t", "r")
            .unwrap();
        ocr.write_results(&job_id, &[json!({})]).unwrap();
        for token in ["../x", "p9999", "first"] {
            let err = ocr.fetch_result_page(&job_id, Some(token)).unwrap_err();
            assert!(matches!(err, IngestError::InvalidToken(_)), "{token}");
        }
    }
}
