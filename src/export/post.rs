//! Jekyll post files: YAML front matter followed by the body.
//!
//! Only the small YAML subset the writer emits is read back by
//! [`parse_post`]: plain or double-quoted scalars, one block list (`images`)
//! and one nested mapping (`embed`).

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::error::{MailpostError, Result};
use crate::model::embed::EmbedResource;
use crate::slug::PostSlug;

/// Date format used in the front matter, e.g. `2018-01-01 10:30:00 +0000`.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

const DELIMITER: &str = "---";

/// Metadata block of a post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrontMatter {
    pub layout: String,
    pub date: DateTime<FixedOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<EmbedResource>,
}

/// Render front matter and body into the final file contents.
///
/// Fields are written in a fixed order (layout, date, title, images, embed)
/// and absent or empty optional fields are left out entirely.
pub fn render_post(front: &FrontMatter, body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 256);
    out.push_str(DELIMITER);
    out.push('\n');

    let _ = writeln!(out, "layout: {}", yaml_scalar(&front.layout));
    let _ = writeln!(out, "date: {}", front.date.format(DATE_FORMAT));

    if let Some(title) = &front.title {
        let _ = writeln!(out, "title: {}", yaml_scalar(title));
    }

    if !front.images.is_empty() {
        out.push_str("images:\n");
        for image in &front.images {
            let _ = writeln!(out, "- {}", yaml_scalar(image));
        }
    }

    if let Some(embed) = &front.embed {
        out.push_str("embed:\n");
        for (key, value) in embed_fields(embed) {
            if let Some(value) = value {
                let _ = writeln!(out, "  {key}: {}", yaml_scalar(value));
            }
        }
    }

    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(body);
    out.push('\n');
    out
}

fn embed_fields(embed: &EmbedResource) -> [(&'static str, Option<&str>); 7] {
    [
        ("title", embed.title.as_deref()),
        ("url", Some(embed.url.as_str())),
        ("provider_name", embed.provider_name.as_deref()),
        ("provider_url", embed.provider_url.as_deref()),
        ("author_name", embed.author_name.as_deref()),
        ("author_url", embed.author_url.as_deref()),
        ("html", embed.html.as_deref()),
    ]
}

/// Write `<site>/<posts_dir>/<slug>.md` and restrict its permissions.
///
/// The posts directory and its ancestors are created as needed. The write is
/// not atomic.
pub fn write_post(
    site_root: &Path,
    posts_dir: &str,
    slug: &PostSlug,
    front: &FrontMatter,
    body: &str,
    file_mode: u32,
) -> Result<PathBuf> {
    let dir = site_root.join(posts_dir);
    std::fs::create_dir_all(&dir).map_err(|e| MailpostError::io(&dir, e))?;

    let path = dir.join(format!("{slug}.md"));
    std::fs::write(&path, render_post(front, body)).map_err(|e| MailpostError::io(&path, e))?;
    set_mode(&path, file_mode)?;

    tracing::info!(path = %path.display(), "Wrote post");
    Ok(path)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| MailpostError::io(path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Read a post file back into its front matter and body.
pub fn read_post(path: &Path) -> Result<(FrontMatter, String)> {
    let text = std::fs::read_to_string(path).map_err(|e| MailpostError::io(path, e))?;
    parse_post(&text)
}

/// Parse the output of [`render_post`].
pub fn parse_post(text: &str) -> Result<(FrontMatter, String)> {
    let text = text.replace("\r\n", "\n");
    let rest = text
        .strip_prefix("---\n")
        .ok_or_else(|| MailpostError::FrontMatter("missing opening '---'".into()))?;

    let (header, body) = if let Some(body) = rest.strip_prefix("---\n") {
        ("", body)
    } else {
        rest.split_once("\n---\n")
            .ok_or_else(|| MailpostError::FrontMatter("missing closing '---'".into()))?
    };
    let body = body.strip_suffix('\n').unwrap_or(body).to_string();

    let mut layout = None;
    let mut date = None;
    let mut title = None;
    let mut images = Vec::new();
    let mut embed: Option<EmbedResource> = None;
    let mut section = "";

    for (lineno, line) in header.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let bad = |what: &str| MailpostError::FrontMatter(format!("line {}: {what}", lineno + 2));

        if let Some(item) = line.strip_prefix("- ") {
            if section != "images" {
                return Err(bad("list item outside 'images'"));
            }
            images.push(parse_scalar(item).map_err(|e| bad(&e))?);
        } else if let Some(nested) = line.strip_prefix("  ") {
            let Some(resource) = embed.as_mut().filter(|_| section == "embed") else {
                return Err(bad("indented key outside 'embed'"));
            };
            let (key, value) = split_key(nested).ok_or_else(|| bad("expected 'key: value'"))?;
            let value = parse_scalar(value).map_err(|e| bad(&e))?;
            match key {
                "title" => resource.title = Some(value),
                "url" => resource.url = value,
                "provider_name" => resource.provider_name = Some(value),
                "provider_url" => resource.provider_url = Some(value),
                "author_name" => resource.author_name = Some(value),
                "author_url" => resource.author_url = Some(value),
                "html" => resource.html = Some(value),
                other => tracing::debug!(key = other, "Ignoring unknown embed key"),
            }
        } else {
            let (key, value) = split_key(line).ok_or_else(|| bad("expected 'key: value'"))?;
            section = "";
            match key {
                "layout" => layout = Some(parse_scalar(value).map_err(|e| bad(&e))?),
                "date" => {
                    let raw = parse_scalar(value).map_err(|e| bad(&e))?;
                    date = Some(
                        DateTime::parse_from_str(&raw, DATE_FORMAT)
                            .map_err(|e| bad(&format!("invalid date '{raw}': {e}")))?,
                    );
                }
                "title" => title = Some(parse_scalar(value).map_err(|e| bad(&e))?),
                "images" if value.is_empty() => section = "images",
                "embed" if value.is_empty() => {
                    section = "embed";
                    embed = Some(EmbedResource::default());
                }
                other => tracing::debug!(key = other, "Ignoring unknown front matter key"),
            }
        }
    }

    let front = FrontMatter {
        layout: layout.ok_or_else(|| MailpostError::FrontMatter("missing 'layout'".into()))?,
        date: date.ok_or_else(|| MailpostError::FrontMatter("missing 'date'".into()))?,
        title,
        images,
        embed,
    };
    Ok((front, body))
}

/// Split `key: value` (or a bare `key:`) into its parts.
fn split_key(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    if key.is_empty() || key.contains(' ') {
        return None;
    }
    Some((key, value.trim()))
}

fn parse_scalar(raw: &str) -> std::result::Result<String, String> {
    let raw = raw.trim();
    if raw.starts_with('"') {
        serde_json::from_str::<String>(raw).map_err(|e| format!("bad quoted string: {e}"))
    } else {
        Ok(raw.to_string())
    }
}

/// Emit a string as a plain YAML scalar when that is unambiguous, else double-quoted.
pub fn yaml_scalar(s: &str) -> String {
    if is_plain_safe(s) {
        s.to_string()
    } else {
        // JSON string escapes are valid YAML double-quoted escapes
        serde_json::Value::String(s.to_string()).to_string()
    }
}

fn is_plain_safe(s: &str) -> bool {
    const INDICATORS: &[char] = &[
        '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%',
        '@', '`',
    ];
    const RESERVED: &[&str] = &[
        "true", "false", "yes", "no", "on", "off", "null", "y", "n", "~",
    ];

    let Some(first) = s.chars().next() else {
        return false;
    };
    if INDICATORS.contains(&first) {
        return false;
    }
    if s.trim() != s || s.ends_with(':') {
        return false;
    }
    if s.contains(": ") || s.contains(" #") || s.chars().any(char::is_control) {
        return false;
    }
    if RESERVED.iter().any(|r| r.eq_ignore_ascii_case(s)) {
        return false;
    }
    // Numbers, dates, times and specials like `.inf` or `0o17` all start with one of these
    if first.is_ascii_digit() || matches!(first, '.' | '+') {
        return false;
    }
    true
}
