use super::classify::{is_image_mime, normalized_mime};
use super::mime::detect_image_mime;
use super::{FileInput, FileSource};
use crate::models::{ContentKind, ContentPayload};
use crate::{Error, Result};
use base64::Engine as _;
use tokio::io::AsyncReadExt;

/// Receives overall progress as a percentage in `0..=100`.
pub type ProgressFn = dyn Fn(u8) + Send + Sync;

/// File reading occupies the first half of the progress bar.
pub const READ_PROGRESS_SPAN: u8 = 50;

const READ_CHUNK: usize = 64 * 1024;

/// Upper bound on the up-front buffer; `size` is only what the host reported.
const MAX_PREALLOC: usize = READ_CHUNK * 16;

fn read_percent(read: u64, total: u64) -> u8 {
    if total == 0 {
        return READ_PROGRESS_SPAN;
    }
    let scaled = read.min(total) * u64::from(READ_PROGRESS_SPAN) / total;
    scaled as u8
}

async fn read_all(input: &FileInput, progress: &ProgressFn) -> Result<Vec<u8>> {
    match &input.source {
        FileSource::Bytes(bytes) => {
            progress(READ_PROGRESS_SPAN);
            Ok(bytes.clone())
        }
        FileSource::Path(path) => {
            let mut file = tokio::fs::File::open(path)
                .await
                .map_err(|e| Error::ReadFailure(format!("{}: {}", path.display(), e)))?;

            let mut bytes = Vec::with_capacity((input.size as usize).min(MAX_PREALLOC));
            let mut chunk = vec![0u8; READ_CHUNK];
            loop {
                let n = file
                    .read(&mut chunk)
                    .await
                    .map_err(|e| Error::ReadFailure(format!("{}: {}", path.display(), e)))?;
                if n == 0 {
                    break;
                }
                bytes.extend_from_slice(&chunk[..n]);
                progress(read_percent(bytes.len() as u64, input.size));
            }

            progress(READ_PROGRESS_SPAN);
            Ok(bytes)
        }
    }
}

fn to_data_uri(input: &FileInput, bytes: &[u8]) -> String {
    let mime = if is_image_mime(&input.mime_type) {
        normalized_mime(&input.mime_type)
    } else {
        detect_image_mime(bytes).to_string()
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime, encoded)
}

fn decode_text(name: &str, bytes: Vec<u8>) -> Result<String> {
    let mut text = String::from_utf8(bytes).map_err(|e| {
        Error::ReadFailure(format!("'{}' is not valid UTF-8 text: {}", name, e))
    })?;
    if text.starts_with('\u{feff}') {
        text.remove(0);
    }
    Ok(text)
}

/// Read a classified file fully and convert it into a payload.
///
/// Images become a base64 data URI, text is decoded as UTF-8.
pub async fn ingest(
    input: &FileInput,
    kind: ContentKind,
    progress: &ProgressFn,
) -> Result<ContentPayload> {
    tracing::debug!("Reading '{}' as {} ({} bytes)", input.name, kind, input.size);
    progress(0);

    let bytes = read_all(input, progress).await?;

    let data = match kind {
        ContentKind::Image => to_data_uri(input, &bytes),
        ContentKind::Text => decode_text(&input.name, bytes)?,
    };

    tracing::debug!("Read '{}' into a {} byte payload", input.name, data.len());
    Ok(ContentPayload::new(kind, data))
}
