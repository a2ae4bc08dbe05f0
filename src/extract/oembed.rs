//! oEmbed lookups over HTTP.
//!
//! Providers are matched by host against a small built-in table. URLs no
//! provider claims can be sent to a catch-all endpoint (such as
//! `https://noembed.com/embed`) when one is configured.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{MailpostError, Result};
use crate::model::embed::EmbedResource;

use super::embed::EmbedLookup;

/// A known oEmbed provider.
#[derive(Debug, Clone, Copy)]
pub struct Provider {
    pub name: &'static str,
    /// Host suffixes this provider serves (`youtube.com` also matches `m.youtube.com`).
    pub hosts: &'static [&'static str],
    pub endpoint: &'static str,
}

pub const PROVIDERS: &[Provider] = &[
    Provider {
        name: "YouTube",
        hosts: &["youtube.com", "youtu.be"],
        endpoint: "https://www.youtube.com/oembed",
    },
    Provider {
        name: "Vimeo",
        hosts: &["vimeo.com"],
        endpoint: "https://vimeo.com/api/oembed.json",
    },
    Provider {
        name: "Flickr",
        hosts: &["flickr.com", "flic.kr"],
        endpoint: "https://www.flickr.com/services/oembed/",
    },
    Provider {
        name: "SoundCloud",
        hosts: &["soundcloud.com"],
        endpoint: "https://soundcloud.com/oembed",
    },
    Provider {
        name: "Spotify",
        hosts: &["open.spotify.com"],
        endpoint: "https://open.spotify.com/oembed",
    },
    Provider {
        name: "Twitter",
        hosts: &["twitter.com", "x.com"],
        endpoint: "https://publish.twitter.com/oembed",
    },
];

/// Raw oEmbed JSON response.
#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    url: Option<String>,
    provider_name: Option<String>,
    provider_url: Option<String>,
    author_name: Option<String>,
    author_url: Option<String>,
    html: Option<String>,
    /// noembed reports unsupported URLs with HTTP 200 and this field.
    error: Option<String>,
}

/// Blocking oEmbed client.
#[derive(Debug, Clone)]
pub struct OEmbedClient {
    http: reqwest::blocking::Client,
    fallback_endpoint: Option<String>,
}

impl OEmbedClient {
    pub fn new(timeout: Duration, fallback_endpoint: Option<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mailpost/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            fallback_endpoint,
        })
    }

    /// Endpoint responsible for `url`, if any.
    pub fn endpoint_for(&self, url: &str) -> Option<&str> {
        find_provider(url)
            .map(|p| p.endpoint)
            .or(self.fallback_endpoint.as_deref())
    }
}

impl EmbedLookup for OEmbedClient {
    fn lookup(&self, url: &str) -> Result<Option<EmbedResource>> {
        let url = normalize_url(url);
        let Some(endpoint) = self.endpoint_for(&url) else {
            tracing::debug!(url = %url, "No oEmbed provider for URL");
            return Ok(None);
        };

        tracing::debug!(url = %url, endpoint, "Requesting oEmbed data");
        let response = self
            .http
            .get(endpoint)
            .query(&[("url", url.as_str()), ("format", "json")])
            .send()?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(MailpostError::Lookup(format!(
                "{endpoint} answered {status} for {url}"
            )));
        }

        let body: OEmbedResponse = response.json()?;
        Ok(into_resource(body, &url))
    }
}

/// Prefix `https://` when the matched link carries no scheme.
pub fn normalize_url(url: &str) -> String {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// Host part of an absolute URL, lowercased and without a trailing root dot.
fn host_of(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let host = parsed.host_str()?.trim_end_matches('.');
    (!host.is_empty()).then(|| host.to_ascii_lowercase())
}

pub fn find_provider(url: &str) -> Option<&'static Provider> {
    let host = host_of(url)?;
    PROVIDERS.iter().find(|p| {
        p.hosts
            .iter()
            .any(|h| host == *h || host.ends_with(&format!(".{h}")))
    })
}

fn into_resource(body: OEmbedResponse, requested: &str) -> Option<EmbedResource> {
    if let Some(error) = body.error {
        tracing::debug!(url = requested, error = %error, "Provider cannot embed URL");
        return None;
    }

    // photo responses carry the image URL instead of markup
    let html = body.html.or_else(|| match (body.kind.as_deref(), &body.url) {
        (Some("photo"), Some(src)) => Some(format!(
            "<img src=\"{}\" alt=\"{}\">",
            escape_attr(src),
            escape_attr(body.title.as_deref().unwrap_or_default())
        )),
        _ => None,
    });

    Some(EmbedResource {
        title: body.title,
        url: requested.to_string(),
        provider_name: body.provider_name,
        provider_url: body.provider_url,
        author_name: body.author_name,
        author_url: body.author_url,
        html,
    })
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
