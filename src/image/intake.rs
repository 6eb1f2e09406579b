//! Reads user-provided files into image records.

use crate::error::{EditorError, Result};
use crate::image::types::{ImageFormat, ImageRecord};
use std::path::Path;

/// Reads an image file from disk into an [`ImageRecord`].
///
/// The MIME type comes from the file extension, falling back to the file's
/// magic bytes. Files that are neither PNG, JPEG nor WebP are rejected with
/// [`EditorError::Decode`]. Nothing else is touched on failure.
pub async fn decode_file(path: impl AsRef<Path>) -> Result<ImageRecord> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| EditorError::Decode(format!("{}: {e}", path.display())))?;

    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension)
        .or_else(|| ImageFormat::from_magic_bytes(&bytes))
        .ok_or_else(|| {
            EditorError::Decode(format!("{} is not a PNG, JPEG or WebP image", path.display()))
        })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    tracing::debug!(file = %name, mime = format.mime_type(), size = bytes.len(), "decoded image");
    ImageRecord::from_bytes(&bytes, format.mime_type(), name)
}
