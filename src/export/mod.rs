//! Writing to the site: post files with front matter, and image attachments.

pub mod attachment;
pub mod post;
