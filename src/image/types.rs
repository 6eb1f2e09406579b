//! Image records exchanged between the session and the service.

use crate::error::{EditorError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Image formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// An uploaded image held by one of the session's slots.
///
/// Immutable once created; replacing a slot drops the previous record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    data_url: String,
    mime_type: String,
    display_name: String,
}

impl ImageRecord {
    /// Builds a record from raw file bytes and the file's declared MIME type.
    pub fn from_bytes(
        bytes: &[u8],
        mime_type: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Result<Self> {
        let mime_type = mime_type.into();
        if !mime_type.starts_with("image/") {
            return Err(EditorError::Decode(format!(
                "unsupported file type: {mime_type}"
            )));
        }
        if bytes.is_empty() {
            return Err(EditorError::Decode("file is empty".into()));
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(Self {
            data_url: format!("data:{mime_type};base64,{encoded}"),
            mime_type,
            display_name: display_name.into(),
        })
    }

    /// Returns the full data URI (`data:<mime>;base64,<payload>`).
    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    /// Returns the base64 payload without the data URI prefix.
    pub fn payload(&self) -> &str {
        self.data_url
            .split_once(',')
            .map(|(_, payload)| payload)
            .unwrap_or(&self.data_url)
    }

    /// Returns the declared MIME type.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Returns the original file name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// An edited image returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[must_use = "generated image should be stored or saved"]
pub struct GenerationResult {
    /// Base64-encoded image bytes, exactly as returned.
    pub data: String,
    /// MIME type declared by the service.
    pub mime_type: String,
}

impl GenerationResult {
    /// Creates a new result.
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Returns the image as a data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Decodes the base64 payload into raw bytes.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| EditorError::Decode(e.to_string()))
    }

    /// Saves the decoded image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.bytes()?)?;
        Ok(())
    }
}

/// Builds the download file name for an edited image.
///
/// `holiday.jpg` edited into a PNG becomes `etlaa-holiday-edited.png`.
pub fn download_file_name(original_name: &str, result_mime_type: &str) -> String {
    let stem = match original_name.rfind('.') {
        Some(pos) => &original_name[..pos],
        None => original_name,
    };
    let stem = if stem.is_empty() { "image" } else { stem };
    let ext = result_mime_type
        .split_once('/')
        .map(|(_, subtype)| subtype)
        .filter(|s| !s.is_empty())
        .unwrap_or("png");
    format!("etlaa-{stem}-edited.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"GIF89a......"), None);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ImageFormat::from_extension("PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_extension("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("txt"), None);
    }

    #[test]
    fn test_record_data_url_and_payload() {
        let record = ImageRecord::from_bytes(&PNG_MAGIC, "image/png", "cat.png").unwrap();
        assert!(record.data_url().starts_with("data:image/png;base64,"));
        assert_eq!(
            record.payload(),
            base64::engine::general_purpose::STANDARD.encode(PNG_MAGIC)
        );
        assert_eq!(record.display_name(), "cat.png");
    }

    #[test]
    fn test_record_rejects_non_image() {
        let err = ImageRecord::from_bytes(b"hello", "text/plain", "notes.txt").unwrap_err();
        assert!(matches!(err, EditorError::Decode(_)));

        let err = ImageRecord::from_bytes(&[], "image/png", "empty.png").unwrap_err();
        assert!(matches!(err, EditorError::Decode(_)));
    }

    #[test]
    fn test_result_bytes() {
        let result = GenerationResult::new("iVBORw0KGgo=", "image/png");
        assert_eq!(result.bytes().unwrap(), PNG_MAGIC[..8].to_vec());
        assert_eq!(result.to_data_url(), "data:image/png;base64,iVBORw0KGgo=");

        let bad = GenerationResult::new("%%%", "image/png");
        assert!(matches!(bad.bytes(), Err(EditorError::Decode(_))));
    }

    #[test]
    fn test_download_file_name() {
        assert_eq!(
            download_file_name("holiday.photo.jpg", "image/png"),
            "etlaa-holiday.photo-edited.png"
        );
        assert_eq!(
            download_file_name("cat.jpg", "image/jpeg"),
            "etlaa-cat-edited.jpeg"
        );
        assert_eq!(download_file_name(".jpg", "image/webp"), "etlaa-image-edited.webp");
        assert_eq!(download_file_name("scan", "image/png"), "etlaa-scan-edited.png");
    }
}
