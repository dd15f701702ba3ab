//! `mailocr`: email attachment ingestion into an asynchronous OCR pipeline.
//!
//! Three stateless stages, each driven by an event batch:
//!
//! 1. [`pipeline::ExtractStage`] parses a stored email and writes every
//!    attachment to the content bucket.
//! 2. [`pipeline::SubmitStage`] submits each stored document as an OCR job.
//! 3. [`pipeline::AggregateStage`] drains a finished job's paginated results
//!    into one result set.
//!
//! The object store and the OCR service are passed in explicitly through the
//! [`store::ObjectStore`] and [`ocr::OcrService`] traits.

pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod ocr;
pub mod parser;
pub mod pipeline;
pub mod store;
