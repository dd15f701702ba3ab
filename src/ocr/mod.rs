//! The OCR service interface: asynchronous job submission and paginated
//! result retrieval.

pub mod spool;

pub use spool::SpoolOcrService;

use crate::error::Result;
use crate::model::job::{ObjectRef, ResultPage};

/// An asynchronous text-detection service.
pub trait OcrService {
    /// Start a job over a stored document. Returns the service-assigned job
    /// id without waiting for the job to finish. The service publishes a
    /// completion message to `notification_channel`, acting as
    /// `authorization_role`.
    fn submit_async_job(
        &self,
        source: &ObjectRef,
        notification_channel: &str,
        authorization_role: &str,
    ) -> Result<String>;

    /// Fetch one page of a finished job's results. `None` asks for the first page.
    fn fetch_result_page(&self, job_id: &str, continuation_token: Option<&str>)
        -> Result<ResultPage>;
}

impl<T: OcrService + ?Sized> OcrService for &T {
    fn submit_async_job(
        &self,
        source: &ObjectRef,
        notification_channel: &str,
        authorization_role: &str,
    ) -> Result<String> {
        (**self).submit_async_job(source, notification_channel, authorization_role)
    }

    fn fetch_result_page(
        &self,
        job_id: &str,
        continuation_token: Option<&str>,
    ) -> Result<ResultPage> {
        (**self).fetch_result_page(job_id, continuation_token)
    }
}
