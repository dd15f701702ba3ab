//! Core data model types: message parts, attachments, OCR jobs and result pages.

pub mod attachment;
pub mod job;
pub mod part;
