//! Attachment path construction and parsing.
//!
//! Every uploaded file is stored under `wiki/<author_id>/<uuid>-<filename>`.
//! The same string is the object-store key, the entry in
//! `Article::attachments`, and the source of the display name.

use uuid::Uuid;

use crate::defaults::{ATTACHMENT_PREFIX, MAX_FILENAME_LEN};

/// Length of a hyphenated UUID.
const UUID_LEN: usize = 36;

/// Components of a well-formed attachment path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPathParts<'a> {
    pub author_id: &'a str,
    pub upload_id: Uuid,
    pub filename: &'a str,
}

/// Sanitize a filename for use inside a storage key.
pub fn sanitize_filename(filename: &str) -> String {
    // Remove path components
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '#' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        return "unnamed_file".to_string();
    }

    if sanitized.len() <= MAX_FILENAME_LEN {
        return sanitized.to_string();
    }

    // Truncate to the byte limit, preserving a short extension
    match sanitized.rfind('.') {
        Some(dot) if sanitized.len() - dot <= 16 => {
            let ext = &sanitized[dot..];
            let stem = truncate_bytes(&sanitized[..dot], MAX_FILENAME_LEN - ext.len());
            format!("{}{}", stem, ext)
        }
        _ => truncate_bytes(sanitized, MAX_FILENAME_LEN).to_string(),
    }
}

/// Longest prefix of `s` within `max` bytes that ends on a char boundary.
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Build the storage path for one upload.
pub fn attachment_path(author_id: &str, upload_id: Uuid, filename: &str) -> String {
    format!(
        "{}/{}/{}-{}",
        ATTACHMENT_PREFIX,
        author_id,
        upload_id.as_hyphenated(),
        sanitize_filename(filename)
    )
}

/// Build a storage path with a freshly generated upload id.
pub fn new_attachment_path(author_id: &str, filename: &str) -> String {
    attachment_path(author_id, Uuid::new_v4(), filename)
}

/// Split `wiki/<author_id>/<uuid>-<filename>` into its parts.
pub fn parse_attachment_path(path: &str) -> Option<AttachmentPathParts<'_>> {
    let rest = path.strip_prefix(ATTACHMENT_PREFIX)?.strip_prefix('/')?;
    let (author_id, object) = rest.split_once('/')?;
    if author_id.is_empty() {
        return None;
    }
    let (upload_id, filename) = split_upload_id(object)?;
    Some(AttachmentPathParts {
        author_id,
        upload_id,
        filename,
    })
}

/// Human-readable filename for an attachment path.
///
/// Strips the directory and the `<uuid>-` prefix. Paths without such a prefix
/// display their last segment unchanged.
pub fn attachment_display_name(path: &str) -> &str {
    let object = path.rsplit('/').next().unwrap_or(path);
    match split_upload_id(object) {
        Some((_, filename)) => filename,
        None => object,
    }
}

fn split_upload_id(object: &str) -> Option<(Uuid, &str)> {
    let id = object.get(..UUID_LEN)?;
    let filename = object.get(UUID_LEN..)?.strip_prefix('-')?;
    let upload_id = Uuid::try_parse(id).ok()?;
    if filename.is_empty() {
        return None;
    }
    Some((upload_id, filename))
}
