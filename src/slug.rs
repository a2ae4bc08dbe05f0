//! Post identity: URL-safe slugs derived from subject lines.

use chrono::{DateTime, FixedOffset};
use rand::{Rng, RngCore};

/// Length of the random token used when a message has no usable subject.
pub const RANDOM_TOKEN_LEN: usize = 8;

/// Post identifier of the form `<YYYY-MM-DD>-<title-slug>`.
///
/// Used both as the post filename stem and as the attachment directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostSlug(String);

impl PostSlug {
    /// Combine the message date (in the sender's own offset) with a title slug.
    pub fn new(date: &DateTime<FixedOffset>, title_slug: &str) -> Self {
        Self(format!("{}-{title_slug}", date.format("%Y-%m-%d")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PostSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-case, trim, hyphenate whitespace runs, and drop everything outside `[a-z0-9_-]`.
///
/// ```
/// assert_eq!(mailpost::slug::title_slug("  Hello,  World! "), "hello-world");
/// ```
pub fn title_slug(subject: &str) -> String {
    subject
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Eight random lowercase ASCII letters.
pub fn random_token(rng: &mut dyn RngCore) -> String {
    (0..RANDOM_TOKEN_LEN)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}

/// Slug for an optional title.
///
/// Falls back to [`random_token`] when the title is absent or slugs down to
/// nothing (a subject made only of punctuation, say). An empty slug would
/// leave the post named `<date>-.md`, shared by every such subject that day.
pub fn derive_title_slug(title: Option<&str>, rng: &mut dyn RngCore) -> String {
    match title.map(title_slug) {
        Some(slug) if !slug.is_empty() => slug,
        _ => random_token(rng),
    }
}
