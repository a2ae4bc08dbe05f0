//! Email parsing: MIME structure, signed parts and attachments.

pub mod mime;
