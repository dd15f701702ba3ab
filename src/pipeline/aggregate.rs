//! Result Aggregator stage: drains a finished job's paginated results.
//!
//! ```text
//! START ──fetch(job)──▶ FETCHING ──next_token──▶ fetch(job, token) ──▶ FETCHING
//!                           │
//!                           └──no token──▶ DONE
//! ```
//!
//! Pages are requested strictly one after another, since each request needs
//! the previous page's token. Any failure discards everything fetched so far.

use tracing::{debug, info, warn};

use crate::config::AggregateConfig;
use crate::error::{IngestError, PageLimit, Result};
use crate::event::NotificationEvent;
use crate::model::job::ResultSet;
use crate::ocr::OcrService;

use super::StageResponse;

/// Safety limits for one aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Maximum pages in a result set (at least 1).
    pub max_pages: usize,
    /// Maximum total serialized size of the page responses.
    pub max_bytes: u64,
}

impl PageLimits {
    pub fn new(max_pages: usize, max_bytes: u64) -> Self {
        Self {
            max_pages: max_pages.max(1),
            max_bytes,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(usize::MAX, u64::MAX)
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self::from(&AggregateConfig::default())
    }
}

impl From<&AggregateConfig> for PageLimits {
    fn from(config: &AggregateConfig) -> Self {
        Self::new(config.max_pages, config.max_bytes)
    }
}

/// Fetch every result page of `job_id`, in service order.
///
/// Fails with [`IngestError::FetchFailed`] if any request fails and with
/// [`IngestError::PageLimitExceeded`] if the stream outgrows `limits`; in
/// both cases `page_offset` is the number of pages fetched successfully.
pub fn fetch_all_pages<O: OcrService + ?Sized>(
    ocr: &O,
    job_id: &str,
    limits: PageLimits,
) -> Result<ResultSet> {
    let mut pages = Vec::new();
    let mut total_bytes: u64 = 0;
    let mut token: Option<String> = None;

    loop {
        let page = ocr
            .fetch_result_page(job_id, token.as_deref())
            .map_err(|e| IngestError::FetchFailed {
                job_id: job_id.to_string(),
                page_offset: pages.len(),
                source: Box::new(e),
            })?;

        total_bytes = total_bytes.saturating_add(serialized_len(&page.response)?);
        let next = page.continuation().map(str::to_string);
        pages.push(page);
        debug!(job_id, pages = pages.len(), total_bytes, "Result page received");

        if total_bytes > limits.max_bytes {
            return Err(limit_exceeded(job_id, pages.len(), PageLimit::Bytes(limits.max_bytes)));
        }

        match next {
            None => break,
            Some(_) if pages.len() >= limits.max_pages => {
                return Err(limit_exceeded(job_id, pages.len(), PageLimit::Pages(limits.max_pages)));
            }
            Some(next) => token = Some(next),
        }
    }

    info!(job_id, pages = pages.len(), total_bytes, "Result set complete");
    Ok(ResultSet::new(job_id.to_string(), pages))
}

fn limit_exceeded(job_id: &str, page_offset: usize, limit: PageLimit) -> IngestError {
    warn!(job_id, page_offset, %limit, "Result set too large, giving up");
    IngestError::PageLimitExceeded {
        job_id: job_id.to_string(),
        page_offset,
        limit,
    }
}

/// Size of a response as compact JSON, without building the string.
fn serialized_len(value: &serde_json::Value) -> Result<u64> {
    struct Counter(u64);

    impl std::io::Write for Counter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0 += buf.len() as u64;
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let mut counter = Counter(0);
    serde_json::to_writer(&mut counter, value)?;
    Ok(counter.0)
}

/// Aggregates the results of every job named in a notification batch.
#[derive(Debug, Clone)]
pub struct AggregateStage<O> {
    ocr: O,
    limits: PageLimits,
}

impl<O: OcrService> AggregateStage<O> {
    pub fn new(ocr: O, limits: PageLimits) -> Self {
        Self { ocr, limits }
    }

    /// One result set per notification, in batch order; never merged.
    pub fn aggregate(&self, event: &NotificationEvent) -> Result<Vec<ResultSet>> {
        event
            .messages()?
            .into_iter()
            .map(|message| {
                if !message.succeeded() {
                    return Err(IngestError::JobNotSucceeded {
                        status: message.status.unwrap_or_default(),
                        job_id: message.job_id,
                    });
                }
                fetch_all_pages(&self.ocr, &message.job_id, self.limits)
            })
            .collect()
    }

    pub fn handle(&self, event: &NotificationEvent) -> Result<StageResponse> {
        let result_sets = self.aggregate(event)?;
        Ok(StageResponse::ok(serde_json::to_value(result_sets)?))
    }
}
