//! Core data model types: messages, part trees, attachments, and embeds.

pub mod address;
pub mod attachment;
pub mod embed;
pub mod message;
