//! Locate the human-readable body inside a MIME part tree.

use crate::model::message::Part;

/// Return the first usable textual body of a part tree.
///
/// A lone leaf is returned as-is. For containers, direct children are scanned
/// first in document order for a `text/plain`, `text/html` or `text/markdown`
/// leaf; the first one found wins regardless of which of those kinds it is.
/// Only when no direct child qualifies are nested containers searched,
/// depth-first, keeping the first non-empty result.
pub fn extract_body(root: &Part) -> Option<String> {
    match root {
        Part::Leaf { content, .. } => Some(decode(content)),
        Part::Container { children, .. } => extract_from_children(children),
    }
}

fn extract_from_children(children: &[Part]) -> Option<String> {
    let direct = children.iter().find_map(|child| match child {
        Part::Leaf { kind, content } if kind.is_textual() => Some(decode(content)),
        _ => None,
    });
    if direct.is_some() {
        return direct;
    }

    children
        .iter()
        .filter_map(|child| match child {
            Part::Container { children, .. } => extract_from_children(children),
            Part::Leaf { .. } => None,
        })
        .find(|body| !body.is_empty())
}

fn decode(content: &[u8]) -> String {
    String::from_utf8_lossy(content).into_owned()
}
