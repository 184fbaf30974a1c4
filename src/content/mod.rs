//! Content intake: classification and ingestion
//!
//! Turns a selected file, a pasted clipboard item, or typed text into the
//! canonical [`ContentPayload`](crate::models::ContentPayload) sent for
//! analysis.

pub mod classify;
pub mod ingest;
pub mod mime;

pub use classify::{classify_file, classify_text, Classification};
pub use ingest::{ingest, ProgressFn};

use crate::{Error, Result};
use std::path::{Path, PathBuf};

pub const PASTED_TEXT_NAME: &str = "pasted_text.txt";

/// Where the bytes of a selected file live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A selected file as reported by the host: name, declared type, size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInput {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub source: FileSource,
}

impl FileInput {
    pub fn from_bytes(name: &str, mime_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size: bytes.len() as u64,
            source: FileSource::Bytes(bytes),
        }
    }

    /// Describe a file on disk. When no MIME type is supplied one is guessed
    /// from the extension; an unknown extension leaves it empty.
    pub fn from_path(path: &Path, mime_type: Option<&str>) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(Error::ReadFailure(format!(
                "'{}' is not a regular file",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let mime_type = mime_type
            .map(str::to_string)
            .or_else(|| classify::guess_mime_from_name(&name).map(str::to_string))
            .unwrap_or_default();

        Ok(Self {
            name,
            mime_type,
            size: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Wrap typed or pasted text as a synthetic plain-text file.
    pub fn pasted_text(text: String) -> Self {
        Self::from_bytes(PASTED_TEXT_NAME, "text/plain", text.into_bytes())
    }
}

/// One item offered by a clipboard paste.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteItem {
    File(FileInput),
    Text(String),
}

/// Pick the first usable clipboard item: an image file or plain text.
pub fn resolve_paste(items: Vec<PasteItem>) -> Result<FileInput> {
    items
        .into_iter()
        .find_map(|item| match item {
            PasteItem::File(file) if classify::is_image_mime(&file.mime_type) => Some(file),
            PasteItem::File(_) => None,
            PasteItem::Text(text) => Some(FileInput::pasted_text(text)),
        })
        .ok_or_else(|| {
            Error::UnsupportedContentType(
                "Could not process pasted content; paste an image or plain text".to_string(),
            )
        })
}
