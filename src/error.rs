//! Error types for photo editing sessions.

use crate::session::EditMode;
use std::time::Duration;

/// Failures reported by the remote generation service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// API key missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Request was refused by the service's safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters (unknown model, bad payload).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response arrived but did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// A request that must be rejected before the service is called.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No primary image has been uploaded.
    #[error("upload the primary image first")]
    MissingPrimaryImage,

    /// The prompt is empty after trimming.
    #[error("write a description or extract one from the reference image first")]
    EmptyPrompt,

    /// The mode needs a second image that has not been uploaded.
    #[error("upload the {} first", second_image_label(.0))]
    MissingSecondaryImage(EditMode),

    /// Style extraction was requested outside reference-style mode.
    #[error("switch to reference style mode to extract a description")]
    ExtractionUnavailable,

    /// A download was requested before any image was generated.
    #[error("generate an edited image first")]
    NoResult,
}

fn second_image_label(mode: &EditMode) -> &'static str {
    match mode {
        EditMode::ReferenceStyle => "reference image",
        _ => "second image to merge",
    }
}

/// Errors that can occur while editing photos.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// The uploaded file could not be read as an image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The action was rejected before reaching the service.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The style-description call failed.
    #[error("description extraction failed: {0}")]
    Extraction(#[source] ServiceError),

    /// The generation call failed at the transport or API level.
    #[error("image generation failed: {0}")]
    Generation(#[source] ServiceError),

    /// Client configuration is incomplete (e.g. no API key).
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error (e.g. saving the result).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EditorError {
    /// Returns the text shown to the user when this error ends an action.
    pub fn user_message(&self) -> String {
        match self {
            Self::Decode(_) => "An error occurred while reading the image. Please try again.".into(),
            Self::Validation(e) => {
                let text = e.to_string();
                let mut chars = text.chars();
                match chars.next() {
                    Some(first) => format!("Please {}{}.", first.to_lowercase(), chars.as_str()),
                    None => text,
                }
            }
            Self::Extraction(_) => {
                "We could not extract a description. Please try again.".into()
            }
            Self::Generation(ServiceError::ContentBlocked(_)) => {
                "The request was blocked by the service's content filters. Try a different description.".into()
            }
            Self::Generation(_) => {
                "An unexpected error occurred while contacting the server. Check your internet connection and try again.".into()
            }
            Self::Config(msg) => format!("The editor is not configured: {msg}"),
            Self::Io(e) => format!("Could not save the image: {e}"),
        }
    }
}

/// Message recorded when the service answers without producing an image.
pub const NO_IMAGE_PRODUCED_MESSAGE: &str =
    "The AI could not edit the image. The content may not be supported. Try a different description.";

/// Result type alias for editing operations.
pub type Result<T> = std::result::Result<T, EditorError>;

/// Reads the `Retry-After` header as whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Maximum length of an error body carried into an error message.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Redacts key query parameters and truncates long error bodies.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len().min(MAX_ERROR_MESSAGE_LEN));
    let mut rest = text;
    while let Some(pos) = rest.find("key=") {
        cleaned.push_str(&rest[..pos + 4]);
        cleaned.push_str("[REDACTED]");
        let tail = &rest[pos + 4..];
        let end = tail
            .find(|c: char| c == '&' || c == '"' || c.is_whitespace())
            .unwrap_or(tail.len());
        rest = &tail[end..];
    }
    cleaned.push_str(rest);

    let cleaned = cleaned.trim();
    if cleaned.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = cleaned.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        cleaned.to_string()
    }
}
