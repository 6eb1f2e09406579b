//! Remote generation service adapters.

mod gemini;

pub use gemini::{DescriptionModel, GeminiClient, GeminiClientBuilder, GeminiModel};

use crate::error::Result;
use crate::image::{GenerationResult, ImageRecord};
use crate::session::EditMode;
use async_trait::async_trait;

/// Capabilities the editing session needs from a remote service.
///
/// Each call is a single attempt; implementations never retry.
#[async_trait]
pub trait EditService: Send + Sync {
    /// Generates an edited image from one or two images and a composed prompt.
    ///
    /// Returns `Ok(None)` when the service answered without an image part.
    /// Transport and API failures are reported as
    /// [`EditorError::Generation`](crate::EditorError::Generation).
    async fn generate(
        &self,
        images: &[ImageRecord],
        prompt: &str,
        mode: EditMode,
    ) -> Result<Option<GenerationResult>>;

    /// Describes the artistic style of `image` as reusable edit guidance.
    ///
    /// Failures are reported as
    /// [`EditorError::Extraction`](crate::EditorError::Extraction).
    async fn extract_description(&self, image: &ImageRecord) -> Result<String>;

    /// Returns the name of this service for display.
    fn name(&self) -> &str;
}
