//! Attachment payloads.

/// A named binary attachment.
///
/// Content is already transfer-decoded by the MIME parser.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// Filename as declared by the sender. May contain path components;
    /// callers must sanitize before touching the filesystem.
    pub filename: String,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,

    /// Decoded bytes.
    pub content: Vec<u8>,
}

impl Attachment {
    /// `true` for `image/*` content types.
    pub fn is_image(&self) -> bool {
        self.content_type
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
    }
}
