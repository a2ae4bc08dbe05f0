//! MIME message parsing: part tree, attachments, and signature location.

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MessagePart, MimeHeaders, PartType};

use crate::error::{MailpostError, Result};
use crate::model::address::EmailAddress;
use crate::model::attachment::Attachment;
use crate::model::message::{ContentKind, Message, Part, SignatureInfo, SignedPayload};

/// Maximum depth for recursive multipart descent (to prevent stack overflow on adversarial input).
const MAX_DEPTH: usize = 10;

/// Parse a complete raw message (headers + body) into a [`Message`].
///
/// Accepts an optional leading mbox `From ` line and UTF-8 BOM, as delivered
/// by some MDAs.
pub fn parse_message(raw_message: &[u8]) -> Result<Message> {
    let message_bytes = skip_from_line(raw_message);
    if message_bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(MailpostError::MalformedMessage("empty input".into()));
    }

    let parsed = MessageParser::default()
        .parse(message_bytes)
        .ok_or_else(|| MailpostError::MalformedMessage("not a MIME message".into()))?;

    if parsed.headers().is_empty() {
        return Err(MailpostError::MalformedMessage("no headers found".into()));
    }

    let sender = parsed
        .from()
        .and_then(|from| from.first())
        .map(|addr| EmailAddress::from_parts(addr.name.as_deref(), addr.address.as_deref()))
        .unwrap_or_default();

    let subject = parsed
        .subject()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    let date = parsed
        .date()
        .and_then(|d| DateTime::parse_from_rfc3339(&d.to_rfc3339()).ok())
        .unwrap_or_else(|| {
            tracing::debug!("Message has no usable Date header, using current time");
            Utc::now().fixed_offset()
        });

    let root = parsed.root_part();
    let body = build_part(&parsed, root, 0);
    let attachments = list_attachments(&parsed);
    let signature = if is_encrypted(root) {
        SignatureInfo::Encrypted
    } else {
        find_signed_part(&parsed, root, 0)
            .map(SignatureInfo::Signed)
            .unwrap_or_default()
    };

    Ok(Message {
        sender,
        subject,
        date,
        body,
        attachments,
        signature,
    })
}

/// Convert a mail-parser part (and its descendants) into a [`Part`].
fn build_part(msg: &mail_parser::Message<'_>, part: &MessagePart<'_>, depth: usize) -> Part {
    match &part.body {
        PartType::Multipart(ids) => {
            let children = if depth < MAX_DEPTH {
                ids.iter()
                    .filter_map(|id| msg.part(*id))
                    .map(|child| build_part(msg, child, depth + 1))
                    .collect()
            } else {
                tracing::warn!(depth, "Multipart nesting too deep, ignoring children");
                Vec::new()
            };
            Part::Container {
                subtype: mime_subtype(part),
                children,
            }
        }
        _ => {
            let mime = mime_type(part);
            let kind = if is_attachment(part) {
                ContentKind::Other(mime)
            } else {
                ContentKind::from_mime(&mime)
            };
            Part::Leaf {
                kind,
                content: part.contents().to_vec(),
            }
        }
    }
}

/// Build the attachment list from a parsed `mail_parser::Message`.
fn list_attachments(msg: &mail_parser::Message<'_>) -> Vec<Attachment> {
    msg.attachments()
        .enumerate()
        .map(|(idx, part)| Attachment {
            filename: part
                .attachment_name()
                .map(String::from)
                .unwrap_or_else(|| format!("attachment_{idx}")),
            content_type: mime_type(part),
            content: part.contents().to_vec(),
        })
        .collect()
}

/// Depth-first search for the first `multipart/signed` entity.
///
/// Mailing lists commonly wrap the signed entity in a `multipart/mixed`
/// carrying a footer, so the signed part is not always the root.
fn find_signed_part(
    msg: &mail_parser::Message<'_>,
    part: &MessagePart<'_>,
    depth: usize,
) -> Option<SignedPayload> {
    let PartType::Multipart(ids) = &part.body else {
        return None;
    };

    if mime_type(part) == "multipart/signed" {
        let content = ids
            .first()
            .and_then(|id| msg.part(*id))
            .map(|signed| raw_entity(msg.raw_message(), signed))
            .unwrap_or_default();
        let signature = ids
            .get(1)
            .and_then(|id| msg.part(*id))
            .map(|sig| sig.contents().to_vec())
            .unwrap_or_default();
        return Some(SignedPayload { content, signature });
    }

    if depth >= MAX_DEPTH {
        return None;
    }
    ids.iter()
        .filter_map(|id| msg.part(*id))
        .find_map(|child| find_signed_part(msg, child, depth + 1))
}

/// Raw bytes of a MIME entity (headers and body), canonicalized to CRLF.
fn raw_entity(raw: &[u8], part: &MessagePart<'_>) -> Vec<u8> {
    let start = part.offset_header as usize;
    let end = (part.offset_end as usize).min(raw.len());
    raw.get(start..end).map(canonicalize_line_endings).unwrap_or_default()
}

/// Convert bare `\n` into `\r\n`, leaving existing `\r\n` untouched.
fn canonicalize_line_endings(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 32);
    let mut prev = 0u8;
    for &b in data {
        if b == b'\n' && prev != b'\r' {
            out.push(b'\r');
        }
        out.push(b);
        prev = b;
    }
    out
}

/// `multipart/encrypted` (PGP/MIME) or S/MIME enveloped data at the top level.
fn is_encrypted(root: &MessagePart<'_>) -> bool {
    let mime = mime_type(root);
    mime == "multipart/encrypted"
        || (mime == "application/pkcs7-mime"
            && root
                .content_type()
                .and_then(|ct| ct.attribute("smime-type"))
                .is_none_or(|t| t.eq_ignore_ascii_case("enveloped-data")))
}

/// Lowercased `type/subtype` of a part, with sensible defaults when the header is missing.
fn mime_type(part: &MessagePart<'_>) -> String {
    match part.content_type() {
        Some(ct) => {
            let main = ct.ctype();
            match ct.subtype() {
                Some(sub) => format!("{main}/{sub}"),
                None => main.to_string(),
            }
            .to_ascii_lowercase()
        }
        None => match part.body {
            PartType::Text(_) => "text/plain".to_string(),
            PartType::Html(_) => "text/html".to_string(),
            PartType::Multipart(_) => "multipart/mixed".to_string(),
            PartType::Message(_) => "message/rfc822".to_string(),
            _ => "application/octet-stream".to_string(),
        },
    }
}

fn mime_subtype(part: &MessagePart<'_>) -> String {
    let mime = mime_type(part);
    mime.split_once('/')
        .map(|(_, sub)| sub.to_string())
        .unwrap_or(mime)
}

fn is_attachment(part: &MessagePart<'_>) -> bool {
    part.content_disposition()
        .is_some_and(|d| d.ctype().eq_ignore_ascii_case("attachment"))
}

/// Skip the `From ` separator line at the start of MBOX-framed messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    // Handle BOM
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
