use super::FileInput;
use crate::models::ContentKind;

pub const ACCEPTED_IMAGE_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/webp",
    "image/gif",
    "image/bmp",
    "image/svg+xml",
];

pub const ACCEPTED_TEXT_TYPES: &[&str] = &[
    "text/plain",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/markdown",
    "text/html",
    "application/rtf",
    "text/csv",
];

/// Browser-reported MIME types for documents are unreliable, so the file
/// name is consulted as well.
pub const ACCEPTED_TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "pdf", "doc", "docx", "html", "htm", "rtf", "csv",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Image,
    Text,
    Unsupported,
}

impl Classification {
    pub fn kind(self) -> Option<ContentKind> {
        match self {
            Classification::Image => Some(ContentKind::Image),
            Classification::Text => Some(ContentKind::Text),
            Classification::Unsupported => None,
        }
    }
}

pub(crate) fn normalized_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

pub fn is_image_mime(mime_type: &str) -> bool {
    let mime = normalized_mime(mime_type);
    mime.starts_with("image/") || ACCEPTED_IMAGE_TYPES.contains(&mime.as_str())
}

fn is_text_file(mime_type: &str, name: &str) -> bool {
    let mime = normalized_mime(mime_type);
    ACCEPTED_TEXT_TYPES.contains(&mime.as_str())
        || extension(name).is_some_and(|ext| ACCEPTED_TEXT_EXTENSIONS.contains(&ext.as_str()))
}

/// Classify a selected file by declared MIME type, then by extension.
///
/// An image match wins over a text match.
pub fn classify_file(input: &FileInput) -> Classification {
    let classification = if is_image_mime(&input.mime_type) {
        Classification::Image
    } else if is_text_file(&input.mime_type, &input.name) {
        Classification::Text
    } else {
        Classification::Unsupported
    };

    tracing::debug!(
        "Classified '{}' (type '{}', {} bytes) as {:?}",
        input.name,
        input.mime_type,
        input.size,
        classification
    );

    classification
}

/// Pasted or typed text is always text.
pub fn classify_text(_text: &str) -> Classification {
    Classification::Text
}

/// Best guess at a MIME type from a file name, for inputs that carry none.
pub fn guess_mime_from_name(name: &str) -> Option<&'static str> {
    let mime = match extension(name)?.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "rtf" => "application/rtf",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => return None,
    };
    Some(mime)
}
