//! The three pipeline stages and the response they hand back to the
//! trigger substrate.
//!
//! Each stage is invoked once per event batch, runs synchronously and keeps
//! no state between invocations, so a redelivered batch can simply be run
//! again.

pub mod aggregate;
pub mod extract;
pub mod submit;

pub use aggregate::{fetch_all_pages, AggregateStage, PageLimits};
pub use extract::{ExtractReport, ExtractStage};
pub use submit::{submit_job, SubmitStage};

use serde::Serialize;

use crate::error::IngestError;

/// Status code of a successful invocation.
pub const STATUS_OK: u16 = 200;
/// Status code reported for a failed invocation.
pub const STATUS_FAILED: u16 = 500;

/// What a stage returns to its invoker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,

    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub body: serde_json::Value,
}

impl StageResponse {
    pub fn ok(body: serde_json::Value) -> Self {
        Self {
            status_code: STATUS_OK,
            body,
        }
    }

    /// The response a host reports for a stage that returned an error.
    pub fn failure(error: &IngestError) -> Self {
        Self {
            status_code: STATUS_FAILED,
            body: serde_json::json!({ "error": error.to_string() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }
}
