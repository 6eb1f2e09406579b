//! Gemini (Google) generation and description client.

use crate::error::{parse_retry_after, sanitize_error_message, EditorError, Result, ServiceError};
use crate::image::{GenerationResult, ImageRecord};
use crate::prompt::STYLE_ANALYSIS_INSTRUCTION;
use crate::service::EditService;
use crate::session::EditMode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const MERGE_INTRO_PREFIX: &str = "You are an expert digital artist specializing in photo compositing. Your task is to seamlessly merge the two provided images based on the user's instruction.

User's instruction: \"";

const MERGE_INTRO_SUFFIX: &str = "\"

Follow the user's instruction precisely.

This is Image 1 (the primary image, often the background or main subject):";

const MERGE_SECOND_IMAGE_LABEL: &str =
    "This is Image 2 (the image containing elements to be merged into Image 1):";

const MERGE_FINAL_INSTRUCTION: &str = "Now, produce a single, high-resolution, photorealistic image that combines the elements as requested by the user. The final result should be a believable composition. Output only the final merged image.";

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Gemini 2.5 Flash Image (stable).
    NanoBanana,
    /// Gemini 2.5 Flash Image preview.
    #[default]
    NanoBananaPreview,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPreview => "gemini-2.5-flash-image-preview",
        }
    }
}

/// Text models used for style description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DescriptionModel {
    /// Gemini 2.5 Flash.
    #[default]
    Flash,
    /// Gemini 2.5 Flash-Lite (cheaper, less detailed).
    FlashLite,
}

impl DescriptionModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flash => "gemini-2.5-flash",
            Self::FlashLite => "gemini-2.5-flash-lite",
        }
    }
}

/// Builder for GeminiClient.
#[derive(Debug, Clone, Default)]
pub struct GeminiClientBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    description_model: DescriptionModel,
    base_url: Option<String>,
}

impl GeminiClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY`, then `API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the image generation model.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the model used for style descriptions.
    pub fn description_model(mut self, model: DescriptionModel) -> Self {
        self.description_model = model;
        self
    }

    /// Overrides the API base URL (useful for proxies).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the client, resolving the API key.
    pub fn build(self) -> Result<GeminiClient> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .or_else(|| std::env::var("API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                EditorError::Config("GOOGLE_API_KEY not set and no API key provided".into())
            })?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(GeminiClient {
            client: reqwest::Client::new(),
            api_key,
            model: self.model,
            description_model: self.description_model,
            base_url,
        })
    }
}

/// Gemini client implementing [`EditService`].
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: GeminiModel,
    description_model: DescriptionModel,
    base_url: String,
}

impl GeminiClient {
    /// Creates a new `GeminiClientBuilder`.
    pub fn builder() -> GeminiClientBuilder {
        GeminiClientBuilder::new()
    }

    async fn send(
        &self,
        model: &str,
        body: &GeminiRequest,
    ) -> std::result::Result<GeminiResponse, ServiceError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        Ok(response.json().await?)
    }

    async fn generate_impl(
        &self,
        images: &[ImageRecord],
        prompt: &str,
        mode: EditMode,
    ) -> std::result::Result<Option<GenerationResult>, ServiceError> {
        let start = Instant::now();
        let shape = RequestShape::select(mode, images).ok_or_else(|| {
            ServiceError::InvalidRequest("at least one image is required".into())
        })?;
        let body = GeminiRequest::for_generation(shape, prompt);

        tracing::debug!(
            model = self.model.as_str(),
            %mode,
            parts = body.part_count(),
            "sending generation request"
        );
        let response = self.send(self.model.as_str(), &body).await?;
        let result = response.into_generation_result();

        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            produced_image = result.is_some(),
            "generation complete"
        );
        Ok(result)
    }

    async fn extract_impl(
        &self,
        image: &ImageRecord,
    ) -> std::result::Result<String, ServiceError> {
        let body = GeminiRequest::for_description(image);

        tracing::debug!(
            model = self.description_model.as_str(),
            image = image.display_name(),
            "sending description request"
        );
        let response = self.send(self.description_model.as_str(), &body).await?;
        response.into_description()
    }
}

fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> ServiceError {
    let text = sanitize_error_message(text);
    if status == 404 {
        return ServiceError::InvalidRequest(
            "Model not found. Verify the model name is correct.".into(),
        );
    }
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
        return ServiceError::RateLimited { retry_after };
    }
    if status == 401 || status == 403 {
        return ServiceError::Auth(text);
    }
    let lower = text.to_lowercase();
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content_policy")
        || lower.contains("prohibited")
    {
        return ServiceError::ContentBlocked(text);
    }
    ServiceError::Api {
        status,
        message: text,
    }
}

#[async_trait]
impl EditService for GeminiClient {
    async fn generate(
        &self,
        images: &[ImageRecord],
        prompt: &str,
        mode: EditMode,
    ) -> Result<Option<GenerationResult>> {
        self.generate_impl(images, prompt, mode)
            .await
            .map_err(EditorError::Generation)
    }

    async fn extract_description(&self, image: &ImageRecord) -> Result<String> {
        self.extract_impl(image)
            .await
            .map_err(EditorError::Extraction)
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }
}

/// Which images go into a generation request, and in what order.
#[derive(Debug, Clone, Copy)]
enum RequestShape<'a> {
    /// Two images composited under the merge framing.
    Merge {
        first: &'a ImageRecord,
        second: &'a ImageRecord,
    },
    /// Prompt followed by a single subject image.
    Subject { image: &'a ImageRecord },
}

impl<'a> RequestShape<'a> {
    /// Picks the shape for `mode`. Fewer than two images always falls back to
    /// the subject shape; no images yields `None`.
    fn select(mode: EditMode, images: &'a [ImageRecord]) -> Option<Self> {
        match (mode, images) {
            (EditMode::Merge, [first, second, ..]) => Some(Self::Merge { first, second }),
            (_, [image, ..]) => Some(Self::Subject { image }),
            (_, []) => None,
        }
    }

    fn into_parts(self, prompt: &str) -> Vec<GeminiRequestPart> {
        match self {
            Self::Merge { first, second } => vec![
                GeminiRequestPart::text(format!("{MERGE_INTRO_PREFIX}{prompt}{MERGE_INTRO_SUFFIX}")),
                GeminiRequestPart::image(first),
                GeminiRequestPart::text(MERGE_SECOND_IMAGE_LABEL),
                GeminiRequestPart::image(second),
                GeminiRequestPart::text(MERGE_FINAL_INSTRUCTION),
            ],
            Self::Subject { image } => vec![
                GeminiRequestPart::text(prompt),
                GeminiRequestPart::image(image),
            ],
        }
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

impl GeminiRequestPart {
    fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    fn image(image: &ImageRecord) -> Self {
        Self::InlineData {
            inline_data: GeminiInlineData {
                mime_type: image.mime_type().to_string(),
                data: image.payload().to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
}

impl GeminiRequest {
    fn for_generation(shape: RequestShape<'_>, prompt: &str) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: shape.into_parts(prompt),
            }],
            generation_config: Some(GeminiConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            }),
        }
    }

    fn for_description(image: &ImageRecord) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiRequestPart::text(STYLE_ANALYSIS_INSTRUCTION),
                    GeminiRequestPart::image(image),
                ],
            }],
            generation_config: None,
        }
    }

    fn part_count(&self) -> usize {
        self.contents.iter().map(|c| c.parts.len()).sum()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl GeminiResponse {
    fn block_reason(&self) -> Option<String> {
        let feedback = self.prompt_feedback.as_ref()?;
        let reason = feedback.block_reason.as_ref()?;
        Some(
            feedback
                .block_reason_message
                .clone()
                .unwrap_or_else(|| format!("Prompt blocked: {reason}")),
        )
    }

    /// First inline image of the first candidate, if any.
    fn into_generation_result(self) -> Option<GenerationResult> {
        if let Some(reason) = self.block_reason() {
            tracing::warn!(%reason, "generation prompt was blocked, no image produced");
            return None;
        }

        let candidate = self.candidates.into_iter().next()?;
        if let Some(ref finish_reason) = candidate.finish_reason {
            if finish_reason != "STOP" {
                tracing::warn!(%finish_reason, "generation finished early");
            }
        }

        candidate
            .content?
            .parts
            .into_iter()
            .find_map(|p| p.inline_data)
            .map(|inline| GenerationResult::new(inline.data, inline.mime_type))
    }

    /// Concatenated text of the first candidate, trimmed.
    fn into_description(self) -> std::result::Result<String, ServiceError> {
        if let Some(reason) = self.block_reason() {
            return Err(ServiceError::ContentBlocked(reason));
        }

        let candidate = self.candidates.into_iter().next().ok_or_else(|| {
            ServiceError::UnexpectedResponse("No candidates in Gemini response".into())
        })?;

        let text: String = candidate
            .content
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect::<String>())
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::UnexpectedResponse(
                "No text in Gemini response".into(),
            ));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    const PNG_BYTES: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    fn record(name: &str) -> ImageRecord {
        ImageRecord::from_bytes(&PNG_BYTES, "image/png", name).unwrap()
    }

    fn parts_json(req: &GeminiRequest) -> Vec<Value> {
        let json = serde_json::to_value(req).unwrap();
        json["contents"][0]["parts"].as_array().unwrap().clone()
    }

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::NanoBanana.as_str(), "gemini-2.5-flash-image");
        assert_eq!(
            GeminiModel::default().as_str(),
            "gemini-2.5-flash-image-preview"
        );
        assert_eq!(DescriptionModel::default().as_str(), "gemini-2.5-flash");
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let client = GeminiClientBuilder::new()
            .api_key("test-key")
            .model(GeminiModel::NanoBanana)
            .description_model(DescriptionModel::FlashLite)
            .base_url("http://localhost:8080/v1beta/")
            .build()
            .unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v1beta");
        assert_eq!(client.name(), "Gemini (Google)");
    }

    #[test]
    fn test_builder_rejects_blank_key() {
        let result = GeminiClientBuilder::new().api_key("  ").build();
        assert!(matches!(result, Err(EditorError::Config(_))));
    }

    #[test]
    fn test_merge_request_has_five_ordered_parts() {
        let images = [record("room.png"), record("sofa.png")];
        let shape = RequestShape::select(EditMode::Merge, &images).unwrap();
        let req = GeminiRequest::for_generation(shape, "put the sofa by the window");
        let parts = parts_json(&req);

        assert_eq!(parts.len(), 5);
        assert!(parts[0]["text"]
            .as_str()
            .unwrap()
            .contains("User's instruction: \"put the sofa by the window\""));
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], images[0].payload());
        assert_eq!(parts[2]["text"], MERGE_SECOND_IMAGE_LABEL);
        assert_eq!(parts[3]["inlineData"]["data"], images[1].payload());
        assert_eq!(parts[4]["text"], MERGE_FINAL_INSTRUCTION);
    }

    #[test]
    fn test_merge_with_one_image_falls_back_to_subject_shape() {
        let images = [record("room.png")];
        let shape = RequestShape::select(EditMode::Merge, &images).unwrap();
        let req = GeminiRequest::for_generation(shape, "merge");
        let parts = parts_json(&req);

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], "merge");
        assert!(parts[1].get("inlineData").is_some());
    }

    #[test]
    fn test_subject_request_uses_first_image_only() {
        let images = [record("subject.png"), record("style.png")];
        let shape = RequestShape::select(EditMode::ReferenceStyle, &images).unwrap();
        let req = GeminiRequest::for_generation(shape, "styled prompt");
        let parts = parts_json(&req);

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], "styled prompt");
        assert_eq!(parts[1]["inlineData"]["data"], images[0].payload());
    }

    #[test]
    fn test_no_images_is_rejected() {
        assert!(RequestShape::select(EditMode::TextPrompt, &[]).is_none());
    }

    #[test]
    fn test_generation_requests_image_and_text() {
        let images = [record("cat.png")];
        let shape = RequestShape::select(EditMode::TextPrompt, &images).unwrap();
        let json = serde_json::to_value(GeminiRequest::for_generation(shape, "x")).unwrap();

        assert_eq!(
            json["generationConfig"]["responseModalities"],
            serde_json::json!(["IMAGE", "TEXT"])
        );
        assert!(json.get("generation_config").is_none());
    }

    #[test]
    fn test_description_request_shape() {
        let image = record("style.png");
        let req = GeminiRequest::for_description(&image);
        let json = serde_json::to_value(&req).unwrap();
        let parts = parts_json(&req);

        assert!(json.get("generationConfig").is_none());
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], STYLE_ANALYSIS_INSTRUCTION);
        assert_eq!(parts[1]["inlineData"]["data"], image.payload());
    }

    #[test]
    fn test_response_with_image_after_text() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here is your image"},
                        {"inlineData": {"mimeType": "image/jpeg", "data": "/9j/4AAQ"}},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let result = resp.into_generation_result().unwrap();
        assert_eq!(result.mime_type, "image/jpeg");
        assert_eq!(result.data, "/9j/4AAQ");
    }

    #[test]
    fn test_response_without_image_is_none() {
        let json = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "I can't help with that."}]},
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(resp.into_generation_result().is_none());
    }

    #[test]
    fn test_safety_finish_without_content_is_none() {
        let json = r#"{"candidates": [{"finishReason": "IMAGE_SAFETY"}]}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(resp.into_generation_result().is_none());
    }

    #[test]
    fn test_prompt_feedback_block() {
        let json = r#"{
            "candidates": [],
            "promptFeedback": {"blockReason": "SAFETY"}
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(resp.into_generation_result().is_none());

        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        match resp.into_description() {
            Err(ServiceError::ContentBlocked(msg)) => assert_eq!(msg, "Prompt blocked: SAFETY"),
            other => panic!("expected ContentBlocked, got {other:?}"),
        }
    }

    #[test]
    fn test_description_text_is_trimmed_and_joined() {
        let json = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "\n  Warm palette, "}, {"text": "soft light.  \n"}]}
            }]
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            resp.into_description().unwrap(),
            "Warm palette, soft light."
        );
    }

    #[test]
    fn test_empty_description_is_error() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "   "}]}}]}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            resp.into_description(),
            Err(ServiceError::UnexpectedResponse(_))
        ));

        let resp: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            resp.into_description(),
            Err(ServiceError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_parse_error_mapping() {
        let headers = reqwest::header::HeaderMap::new();
        assert!(matches!(
            parse_error(403, "API key not valid", &headers),
            ServiceError::Auth(_)
        ));
        assert!(matches!(
            parse_error(404, "", &headers),
            ServiceError::InvalidRequest(_)
        ));
        assert!(matches!(
            parse_error(400, "request blocked by safety settings", &headers),
            ServiceError::ContentBlocked(_)
        ));
        assert!(matches!(
            parse_error(500, "internal", &headers),
            ServiceError::Api { status: 500, .. }
        ));

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "12".parse().unwrap());
        match parse_error(429, "quota", &headers) {
            ServiceError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(std::time::Duration::from_secs(12)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }
}
