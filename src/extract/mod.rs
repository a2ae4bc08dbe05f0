//! Content extraction: post body and embeddable links.

pub mod body;
pub mod embed;
pub mod oembed;
