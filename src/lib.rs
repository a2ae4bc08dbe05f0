//! `mailpost` — publish an email as a Jekyll blog post.
//!
//! This crate provides the import pipeline: MIME parsing, PGP signature
//! checks against an allow-list, body and embed extraction, image attachment
//! export, and front matter generation.

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod importer;
pub mod model;
pub mod parser;
pub mod signature;
pub mod slug;
