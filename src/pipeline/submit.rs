//! Job Submitter stage: one OCR job per stored document.

use tracing::info;

use crate::config::OcrConfig;
use crate::error::{IngestError, Result};
use crate::event::StorageEvent;
use crate::model::job::{ObjectRef, OcrJob};
use crate::ocr::OcrService;

use super::StageResponse;

/// Submit `bucket/key` as an OCR job and return it without waiting for
/// completion.
///
/// Every failure, including a blank channel or role, comes back as
/// [`IngestError::Submission`] naming the object. Nothing is retried here.
pub fn submit_job<O: OcrService + ?Sized>(
    ocr: &O,
    bucket: &str,
    key: &str,
    notification_channel: &str,
    authorization_role: &str,
) -> Result<OcrJob> {
    let wrap = |source: IngestError| IngestError::Submission {
        bucket: bucket.to_string(),
        key: key.to_string(),
        source: Box::new(source),
    };

    if notification_channel.trim().is_empty() {
        return Err(wrap(IngestError::Config("notification channel is empty".into())));
    }
    if authorization_role.trim().is_empty() {
        return Err(wrap(IngestError::Config("authorization role is empty".into())));
    }

    let source = ObjectRef::new(bucket, key);
    let job_id = ocr
        .submit_async_job(&source, notification_channel, authorization_role)
        .map_err(wrap)?;

    info!(job_id = %job_id, source = %source, "Submitted OCR job");
    Ok(OcrJob {
        job_id,
        source,
        notification_channel: notification_channel.to_string(),
        authorization_role: authorization_role.to_string(),
    })
}

/// Submits every object of a storage event.
#[derive(Debug, Clone)]
pub struct SubmitStage<O> {
    ocr: O,
    notification_channel: String,
    authorization_role: String,
}

impl<O: OcrService> SubmitStage<O> {
    pub fn new(
        ocr: O,
        notification_channel: impl Into<String>,
        authorization_role: impl Into<String>,
    ) -> Self {
        Self {
            ocr,
            notification_channel: notification_channel.into(),
            authorization_role: authorization_role.into(),
        }
    }

    pub fn from_config(ocr: O, config: &OcrConfig) -> Self {
        Self::new(ocr, &config.notification_channel, &config.authorization_role)
    }

    /// Submit one job per record. The first rejection fails the batch;
    /// redelivery re-submits from the start.
    pub fn handle(&self, event: &StorageEvent) -> Result<StageResponse> {
        let jobs = self.submit_all(event)?;
        Ok(StageResponse::ok(serde_json::to_value(jobs)?))
    }

    pub fn submit_all(&self, event: &StorageEvent) -> Result<Vec<OcrJob>> {
        event
            .objects()?
            .iter()
            .map(|source| {
                submit_job(
                    &self.ocr,
                    &source.bucket,
                    &source.key,
                    &self.notification_channel,
                    &self.authorization_role,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::job::ResultPage;
    use std::cell::RefCell;

    /// Records submissions; rejects keys ending in `.bad`.
    #[derive(Default)]
    struct RecordingOcr {
        submitted: RefCell<Vec<(ObjectRef, String, String)>>,
    }

    impl OcrService for RecordingOcr {
        fn submit_async_job(
            &self,
            source: &ObjectRef,
            notification_channel: &str,
            authorization_role: &str,
        ) -> Result<String> {
            if source.key.ends_with(".bad") {
                return Err(IngestError::ObjectNotFound {
                    bucket: source.bucket.clone(),
                    key: source.key.clone(),
                });
            }
            let mut submitted = self.submitted.borrow_mut();
            submitted.push((
                source.clone(),
                notification_channel.to_string(),
                authorization_role.to_string(),
            ));
            Ok(format!("job-{}", submitted.len()))
        }

        fn fetch_result_page(&self, job_id: &str, _: Option<&str>) -> Result<ResultPage> {
            Err(IngestError::JobNotFound(job_id.to_string()))
        }
    }

    #[test]
    fn test_submit_job_passes_channel_and_role() {
        let ocr = RecordingOcr::default();
        let job = submit_job(&ocr, "content", "a.pdf", "topic", "role").unwrap();
        assert_eq!(job.job_id, "job-1");
        assert_eq!(job.source, ObjectRef::new("content", "a.pdf"));
        let submitted = ocr.submitted.borrow();
        assert_eq!(submitted[0].1, "topic");
        assert_eq!(submitted[0].2, "role");
    }

    #[test]
    fn test_submission_error_names_object() {
        let ocr = RecordingOcr::default();
        let err = submit_job(&ocr, "content", "x.bad", "topic", "role").unwrap_err();
        match err {
            IngestError::Submission { bucket, key, source } => {
                assert_eq!(bucket, "content");
                assert_eq!(key, "x.bad");
                assert!(matches!(*source, IngestError::ObjectNotFound { .. }));
            }
            other => panic!("expected Submission, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_channel_rejected_before_calling_service() {
        let ocr = RecordingOcr::default();
        let err = submit_job(&ocr, "content", "a.pdf", " ", "role").unwrap_err();
        assert!(matches!(err, IngestError::Submission { .. }));
        let err = submit_job(&ocr, "content", "a.pdf", "topic", "").unwrap_err();
        assert!(matches!(err, IngestError::Submission { .. }));
        assert!(ocr.submitted.borrow().is_empty());
    }

    #[test]
    fn test_stage_submits_each_record() {
        let ocr = RecordingOcr::default();
        let stage = SubmitStage::new(&ocr, "topic", "role");
        let event = StorageEvent::for_objects(&[
            ObjectRef::new("content", "a.pdf"),
            ObjectRef::new("content", "b c.pdf"),
        ]);
        let response = stage.handle(&event).unwrap();
        assert!(response.is_success());
        assert_eq!(response.body[1]["job_id"], "job-2");
        assert_eq!(ocr.submitted.borrow()[1].0.key, "b c.pdf");
    }

    #[test]
    fn test_stage_fails_on_rejection() {
        let ocr = RecordingOcr::default();
        let stage = SubmitStage::new(&ocr, "topic", "role");
        let event = StorageEvent::for_objects(&[ObjectRef::new("content", "x.bad")]);
        assert!(matches!(
            stage.handle(&event),
            Err(IngestError::Submission { .. })
        ));
    }
}
