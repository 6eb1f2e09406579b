//! Session state and its transitions.
//!
//! Every transition takes the state by value and returns the next state, so
//! a transition is either fully applied or not applied at all.

use crate::error::ValidationError;
use crate::image::{GenerationResult, ImageRecord};
use crate::prompt;
use serde::{Deserialize, Serialize};

/// How the instruction and images are framed for the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditMode {
    /// Free-text edit of the primary image.
    #[default]
    #[serde(rename = "prompt")]
    TextPrompt,
    /// Apply the style of the secondary image to the primary image.
    #[serde(rename = "reference")]
    ReferenceStyle,
    /// Composite the secondary image into the primary image.
    #[serde(rename = "merge")]
    Merge,
}

impl EditMode {
    /// All modes, in display order.
    pub const ALL: [EditMode; 3] = [Self::TextPrompt, Self::ReferenceStyle, Self::Merge];

    /// Returns the short identifier (e.g. `"reference"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextPrompt => "prompt",
            Self::ReferenceStyle => "reference",
            Self::Merge => "merge",
        }
    }

    /// Returns true if generation needs the secondary image.
    pub fn requires_secondary(&self) -> bool {
        matches!(self, Self::ReferenceStyle | Self::Merge)
    }
}

impl std::fmt::Display for EditMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one asynchronous operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Not started in this session.
    #[default]
    Idle,
    /// Request in flight.
    Running,
    /// Last attempt succeeded.
    Succeeded,
    /// Last attempt failed; see the operation's error.
    Failed,
}

/// Status and user-facing error of one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationState {
    /// Current status.
    pub status: OperationStatus,
    /// Message shown to the user after a failure.
    pub error: Option<String>,
}

impl OperationState {
    fn running() -> Self {
        Self {
            status: OperationStatus::Running,
            error: None,
        }
    }

    fn succeeded() -> Self {
        Self {
            status: OperationStatus::Succeeded,
            error: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Failed,
            error: Some(message.into()),
        }
    }

    /// Returns true while the operation is in flight.
    pub fn is_running(&self) -> bool {
        self.status == OperationStatus::Running
    }
}

/// Everything needed to issue one generation call.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    /// Session the request belongs to.
    pub epoch: u64,
    /// Primary image, then the secondary image when the mode uses it.
    pub images: Vec<ImageRecord>,
    /// Composed prompt.
    pub prompt: String,
    /// Mode at submission time.
    pub mode: EditMode,
}

/// Everything needed to issue one extraction call.
#[derive(Debug, Clone)]
pub struct ExtractionTicket {
    /// Session the request belongs to.
    pub epoch: u64,
    /// Reference image to describe.
    pub image: ImageRecord,
}

/// How a generation call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The service returned an image.
    Produced(GenerationResult),
    /// The service answered without an image.
    NoImageProduced(String),
    /// The call failed; carries the user-facing message.
    Failed(String),
}

/// The editing session. The only source of truth for what is displayed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    epoch: u64,
    primary: Option<ImageRecord>,
    secondary: Option<ImageRecord>,
    mode: EditMode,
    prompt: String,
    result: Option<GenerationResult>,
    extraction: OperationState,
    generation: OperationState,
}

impl SessionState {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Session counter; bumped whenever a fresh session starts.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Primary image slot.
    pub fn primary_image(&self) -> Option<&ImageRecord> {
        self.primary.as_ref()
    }

    /// Secondary image slot (reference or merge image).
    pub fn secondary_image(&self) -> Option<&ImageRecord> {
        self.secondary.as_ref()
    }

    /// Active edit mode.
    pub fn mode(&self) -> EditMode {
        self.mode
    }

    /// Raw prompt text as typed or extracted.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Last generated image.
    pub fn result(&self) -> Option<&GenerationResult> {
        self.result.as_ref()
    }

    /// Style-description operation.
    pub fn extraction(&self) -> &OperationState {
        &self.extraction
    }

    /// Generation operation.
    pub fn generation(&self) -> &OperationState {
        &self.generation
    }

    /// Returns true while either operation is in flight.
    pub fn is_busy(&self) -> bool {
        self.extraction.is_running() || self.generation.is_running()
    }

    /// Returns true when the extract action should be offered.
    pub fn can_extract(&self) -> bool {
        self.mode == EditMode::ReferenceStyle && self.secondary.is_some() && !self.is_busy()
    }

    /// Returns true when the generate action should be offered.
    pub fn can_generate(&self) -> bool {
        !self.is_busy() && self.generation_ticket().is_ok()
    }

    /// Starts a fresh session around a new primary image.
    ///
    /// Clears the secondary image, result, prompt and both operations, and
    /// returns to text-prompt mode.
    pub fn with_primary_image(self, record: ImageRecord) -> Self {
        Self {
            epoch: self.epoch + 1,
            primary: Some(record),
            ..Self::default()
        }
    }

    /// Replaces the secondary image only.
    pub fn with_secondary_image(self, record: ImageRecord) -> Self {
        Self {
            secondary: Some(record),
            ..self
        }
    }

    /// Switches mode; images and prompt are kept.
    pub fn with_mode(self, mode: EditMode) -> Self {
        Self { mode, ..self }
    }

    /// Replaces the prompt text.
    pub fn with_prompt(self, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..self
        }
    }

    /// Discards the whole session.
    pub fn reset(self) -> Self {
        Self {
            epoch: self.epoch + 1,
            ..Self::default()
        }
    }

    /// Records a failed upload without touching anything else.
    pub fn with_upload_error(self, message: impl Into<String>) -> Self {
        Self {
            generation: OperationState {
                error: Some(message.into()),
                ..self.generation
            },
            ..self
        }
    }

    /// Validates the session for generation and snapshots the request.
    pub fn generation_ticket(&self) -> Result<GenerationTicket, ValidationError> {
        let primary = self
            .primary
            .as_ref()
            .ok_or(ValidationError::MissingPrimaryImage)?;
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }

        let mut images = vec![primary.clone()];
        if self.mode.requires_secondary() {
            let secondary = self
                .secondary
                .as_ref()
                .ok_or(ValidationError::MissingSecondaryImage(self.mode))?;
            images.push(secondary.clone());
        }

        Ok(GenerationTicket {
            epoch: self.epoch,
            images,
            prompt: prompt::compose(self.mode, &self.prompt),
            mode: self.mode,
        })
    }

    /// Validates the session for extraction and snapshots the request.
    pub fn extraction_ticket(&self) -> Result<ExtractionTicket, ValidationError> {
        if self.mode != EditMode::ReferenceStyle {
            return Err(ValidationError::ExtractionUnavailable);
        }
        let image = self
            .secondary
            .as_ref()
            .ok_or(ValidationError::MissingSecondaryImage(EditMode::ReferenceStyle))?;
        Ok(ExtractionTicket {
            epoch: self.epoch,
            image: image.clone(),
        })
    }

    /// Records a generation rejected before reaching the service.
    pub fn with_generation_rejected(self, message: impl Into<String>) -> Self {
        Self {
            generation: OperationState::failed(message),
            ..self
        }
    }

    /// Records an extraction rejected before reaching the service.
    pub fn with_extraction_rejected(self, message: impl Into<String>) -> Self {
        Self {
            extraction: OperationState::failed(message),
            ..self
        }
    }

    /// Marks generation as running and clears the previous result and errors.
    pub fn begin_generation(self) -> Self {
        Self {
            result: None,
            generation: OperationState::running(),
            extraction: OperationState {
                error: None,
                ..self.extraction
            },
            ..self
        }
    }

    /// Applies a finished generation. Completions from an earlier session are
    /// ignored.
    pub fn finish_generation(self, epoch: u64, outcome: GenerationOutcome) -> Self {
        if epoch != self.epoch {
            return self;
        }
        match outcome {
            GenerationOutcome::Produced(result) => Self {
                result: Some(result),
                generation: OperationState::succeeded(),
                ..self
            },
            GenerationOutcome::NoImageProduced(message) | GenerationOutcome::Failed(message) => {
                Self {
                    result: None,
                    generation: OperationState::failed(message),
                    ..self
                }
            }
        }
    }

    /// Marks extraction as running and clears its previous error.
    pub fn begin_extraction(self) -> Self {
        Self {
            extraction: OperationState::running(),
            ..self
        }
    }

    /// Applies a finished extraction; a description replaces the prompt.
    /// Completions from an earlier session are ignored.
    pub fn finish_extraction(self, epoch: u64, outcome: Result<String, String>) -> Self {
        if epoch != self.epoch {
            return self;
        }
        match outcome {
            Ok(description) => Self {
                prompt: description,
                extraction: OperationState::succeeded(),
                ..self
            },
            Err(message) => Self {
                extraction: OperationState::failed(message),
                ..self
            },
        }
    }
}
