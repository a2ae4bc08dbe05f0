//! Find an embeddable link in a post body and resolve it.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{MailpostError, Result};
use crate::model::embed::EmbedResource;

/// Optional scheme, optional `www.`, a 2-256 char host, a 2-6 letter TLD,
/// then an optional path, query and fragment.
pub const URL_PATTERN: &str = r"(?i)(?:https?://)?(?:www\.)?[-a-z0-9@:%._+~#=]{2,256}\.[a-z]{2,6}\b[-a-z0-9@:%_+.~#?&/=]*";

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(URL_PATTERN).expect("URL_PATTERN is a valid regex"));

// user@host.tld with no path before the `@` and no host delimiter after it
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^/]*@[^/@]+\.[^/@]+$").expect("valid email regex"));

/// Finds the first link-shaped substring in a text.
pub trait UrlMatcher {
    fn find_url(&self, text: &str) -> Option<String>;
}

/// Resolves a URL into an embeddable resource.
pub trait EmbedLookup {
    /// `Ok(None)` when nobody knows how to embed the URL.
    fn lookup(&self, url: &str) -> Result<Option<EmbedResource>>;
}

/// [`UrlMatcher`] backed by a regular expression, [`URL_PATTERN`] by default.
#[derive(Debug, Clone)]
pub struct RegexUrlMatcher {
    re: Regex,
}

impl RegexUrlMatcher {
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(|re| Self { re })
            .map_err(|e| MailpostError::Config(format!("invalid URL pattern: {e}")))
    }
}

impl Default for RegexUrlMatcher {
    fn default() -> Self {
        Self {
            re: URL_RE.clone(),
        }
    }
}

impl UrlMatcher for RegexUrlMatcher {
    fn find_url(&self, text: &str) -> Option<String> {
        self.re.find(text).map(|m| m.as_str().to_string())
    }
}

/// A lookup that never finds anything. Used when embeds are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEmbeds;

impl EmbedLookup for NoEmbeds {
    fn lookup(&self, _url: &str) -> Result<Option<EmbedResource>> {
        Ok(None)
    }
}

pub fn looks_like_email(candidate: &str) -> bool {
    EMAIL_RE.is_match(candidate)
}

/// Resolve the first link in `body`, if any.
///
/// Only the first match is considered; if it is an email address there is no
/// embed. Lookup failures are logged and swallowed.
pub fn detect_embed(
    body: &str,
    matcher: &dyn UrlMatcher,
    lookup: &dyn EmbedLookup,
) -> Option<EmbedResource> {
    let url = matcher.find_url(body)?;
    if looks_like_email(&url) {
        tracing::debug!(candidate = %url, "First link is an email address, no embed");
        return None;
    }

    match lookup.lookup(&url) {
        Ok(Some(resource)) => {
            tracing::info!(url = %url, title = ?resource.title, "Resolved embed");
            Some(resource)
        }
        Ok(None) => {
            tracing::debug!(url = %url, "No embed available");
            None
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Embed lookup failed");
            None
        }
    }
}
