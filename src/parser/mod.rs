//! Email parsing: MIME tree construction, header decoding, and
//! `Content-Disposition` handling.

pub mod disposition;
pub mod header;
pub mod mime;
pub mod transfer;
