//! Embeddable web resources (oEmbed).

use serde::Serialize;

/// A resolved external resource referenced from a message body.
///
/// Field names follow the oEmbed response format so the descriptor can be
/// deserialized straight from a provider's JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmbedResource {
    pub title: Option<String>,

    /// Canonical URL of the resource.
    pub url: String,

    pub provider_name: Option<String>,
    pub provider_url: Option<String>,
    pub author_name: Option<String>,
    pub author_url: Option<String>,

    /// Rendering markup (usually an `<iframe>`).
    pub html: Option<String>,
}
