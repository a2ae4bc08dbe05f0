//! Save image attachments next to the post.

use std::collections::HashSet;
use std::path::Path;

use humansize::{format_size, BINARY};

use crate::error::{MailpostError, Result};
use crate::model::attachment::Attachment;
use crate::slug::PostSlug;

/// Write every `image/*` attachment to `<site>/<assets_dir>/<slug>/`.
///
/// Returns the public paths (`/<assets_dir>/<slug>/<file>`) of the files that
/// were written, in attachment order. A failing attachment is logged and
/// skipped; it never aborts the others.
pub fn save_images(
    attachments: &[Attachment],
    site_root: &Path,
    assets_dir: &str,
    slug: &PostSlug,
) -> Vec<String> {
    let images: Vec<&Attachment> = attachments.iter().filter(|a| a.is_image()).collect();
    if images.is_empty() {
        return Vec::new();
    }

    let assets_dir = assets_dir.trim_matches('/');
    let target = site_root.join(assets_dir).join(slug.as_str());
    if let Err(e) = std::fs::create_dir_all(&target) {
        tracing::warn!(
            dir = %target.display(),
            error = %e,
            "Failed to create attachment directory"
        );
        return Vec::new();
    }

    let mut used = HashSet::new();
    let mut public_paths = Vec::with_capacity(images.len());

    for (idx, att) in images.into_iter().enumerate() {
        let filename = unique_name(&base_filename(&att.filename, idx), &mut used);
        match write_attachment(&target, &filename, &att.content) {
            Ok(()) => {
                tracing::info!(
                    filename = %filename,
                    size = %format_size(att.content.len() as u64, BINARY),
                    "Saved image"
                );
                public_paths.push(format!("/{assets_dir}/{slug}/{filename}"));
            }
            Err(e) => {
                tracing::warn!(
                    filename = %att.filename,
                    error = %e,
                    "Failed to save attachment"
                );
            }
        }
    }

    public_paths
}

fn write_attachment(dir: &Path, filename: &str, content: &[u8]) -> Result<()> {
    let path = dir.join(filename);
    std::fs::write(&path, content).map_err(|e| MailpostError::io(&path, e))
}

/// Last path component of a sender-supplied filename.
///
/// Both `/` and `\` count as separators. Names that are empty or only dots
/// become `attachment_<idx>`.
pub fn base_filename(name: &str, idx: usize) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base.chars().all(|c| c == '.') {
        format!("attachment_{idx}")
    } else {
        base.to_string()
    }
}

/// Append `_1`, `_2`, ... to the stem until the name is unused in this batch.
fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    for i in 1.. {
        let candidate = match ext {
            Some(ext) => format!("{stem}_{i}.{ext}"),
            None => format!("{stem}_{i}"),
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
    }
    unreachable!("unbounded counter always finds a free name")
}
