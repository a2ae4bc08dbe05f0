//! Parsed message and its content tree.

use chrono::{DateTime, FixedOffset};

use super::address::EmailAddress;
use super::attachment::Attachment;

/// A parsed inbound email, ready to be turned into a post.
///
/// Built once by [`crate::parser::mime::parse_message`] and never mutated
/// afterwards; the importer owns it for the duration of one import.
#[derive(Debug, Clone)]
pub struct Message {
    /// First `From:` address.
    pub sender: EmailAddress,

    /// Decoded subject line. `None` when the header is missing or blank.
    pub subject: Option<String>,

    /// `Date:` header, keeping the sender's UTC offset.
    pub date: DateTime<FixedOffset>,

    /// Root of the MIME part tree.
    pub body: Part,

    /// Attachment parts in message order.
    pub attachments: Vec<Attachment>,

    /// Signature metadata found while parsing.
    pub signature: SignatureInfo,
}

/// A node of the MIME content tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// A part with decoded content.
    Leaf { kind: ContentKind, content: Vec<u8> },
    /// A `multipart/*` part. Never carries body text itself.
    Container { subtype: String, children: Vec<Part> },
}

impl Part {
    /// Shorthand for a leaf built from text.
    pub fn text(kind: ContentKind, content: impl Into<String>) -> Self {
        Part::Leaf {
            kind,
            content: content.into().into_bytes(),
        }
    }

    /// Shorthand for a container.
    pub fn container(subtype: impl Into<String>, children: Vec<Part>) -> Self {
        Part::Container {
            subtype: subtype.into(),
            children,
        }
    }
}

/// Content classification of a leaf part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    /// `text/plain`
    PlainText,
    /// `text/html`
    Html,
    /// `text/markdown` (or the older `text/x-markdown`)
    Markdown,
    /// Anything else, carrying the lowercased MIME type.
    Other(String),
}

impl ContentKind {
    /// Classify a `type/subtype` string.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        match mime.as_str() {
            "text/plain" => ContentKind::PlainText,
            "text/html" => ContentKind::Html,
            "text/markdown" | "text/x-markdown" => ContentKind::Markdown,
            _ => ContentKind::Other(mime),
        }
    }

    /// Whether this kind can serve as the post body.
    pub fn is_textual(&self) -> bool {
        !matches!(self, ContentKind::Other(_))
    }
}

/// What the parser learned about the message's signature.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SignatureInfo {
    /// No signature found.
    #[default]
    Unsigned,
    /// `multipart/encrypted` or S/MIME enveloped data. Never decrypted.
    Encrypted,
    /// A detached signature over part of the message.
    Signed(SignedPayload),
}

/// The exact bytes covered by a detached signature, plus the signature blob.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedPayload {
    /// Signed MIME entity (headers and body) with CRLF line endings.
    pub content: Vec<u8>,
    /// Detached signature, usually ASCII-armored.
    pub signature: Vec<u8>,
}
