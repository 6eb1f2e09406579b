#![warn(missing_docs)]
//! Etlaa - natural-language photo editing sessions.
//!
//! This crate holds the client-side state of a photo editing session (one or
//! two uploaded images, an edit mode, a prompt, a result) and drives single
//! generation and style-description calls against a remote multimodal model.
//!
//! # Quick Start
//!
//! ```no_run
//! use etlaa::{EditMode, GeminiClient, GenerateOutcome, SessionController};
//!
//! #[tokio::main]
//! async fn main() -> etlaa::Result<()> {
//!     let client = GeminiClient::builder().build()?;
//!     let session = SessionController::new(client);
//!
//!     session.upload_primary("cat.jpg").await?;
//!     session.set_mode(EditMode::TextPrompt);
//!     session.set_prompt("make the sky starry");
//!
//!     if let GenerateOutcome::Produced(_) = session.generate().await? {
//!         let path = session.save_result(".")?;
//!         println!("saved {}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Edit modes
//!
//! - [`EditMode::TextPrompt`]: the prompt is sent verbatim with the primary image.
//! - [`EditMode::ReferenceStyle`]: the prompt (usually extracted from the
//!   secondary image with [`SessionController::extract_description`]) is
//!   wrapped in a style-transfer instruction.
//! - [`EditMode::Merge`]: both images are sent with compositing instructions.

mod error;

pub mod image;
pub mod prompt;
pub mod service;
pub mod session;

// Re-export error types at crate root
pub use error::{EditorError, Result, ServiceError, ValidationError, NO_IMAGE_PRODUCED_MESSAGE};

pub use image::{decode_file, download_file_name, GenerationResult, ImageFormat, ImageRecord};
pub use service::{DescriptionModel, EditService, GeminiClient, GeminiClientBuilder, GeminiModel};
pub use session::{
    EditMode, ExtractOutcome, GenerateOutcome, OperationState, OperationStatus,
    SessionController, SessionState,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{EditorError, Result};
    pub use crate::image::{GenerationResult, ImageRecord};
    pub use crate::service::{EditService, GeminiClient};
    pub use crate::session::{EditMode, GenerateOutcome, SessionController, SessionState};
}
