//! Turns the user's raw text into the instruction sent for generation.
//!
//! Only the reference-style template lives here. How two images are labeled
//! and ordered for a merge is part of the request shape built by the service
//! client.

use crate::session::EditMode;

const REFERENCE_STYLE_PREFIX: &str = "You are an expert photo editor. Your task is to edit the provided subject image to match a specific artistic style.

**Artistic Style to Apply:**
\"";

const REFERENCE_STYLE_SUFFIX: &str = "\"

Please apply ONLY the artistic style described above to the subject image. Do not add new elements unless the style implies them (e.g., paint strokes). Return a high-resolution, professionally edited image.";

/// Instruction used to extract a style description from a reference image.
pub const STYLE_ANALYSIS_INSTRUCTION: &str = "Describe the artistic style of this image in detail. Focus on color palette, lighting, mood, composition, and any distinct visual characteristics like textures or brush strokes. The description should be a practical guide for an AI image editor to replicate the style. Be concise and descriptive.";

/// Builds the final prompt for `mode` from the user's raw text.
pub fn compose(mode: EditMode, raw_prompt: &str) -> String {
    match mode {
        EditMode::TextPrompt | EditMode::Merge => raw_prompt.to_string(),
        EditMode::ReferenceStyle => {
            format!("{REFERENCE_STYLE_PREFIX}{raw_prompt}{REFERENCE_STYLE_SUFFIX}")
        }
    }
}
