//! User actions over a shared session.

use crate::error::{EditorError, Result, ValidationError, NO_IMAGE_PRODUCED_MESSAGE};
use crate::image::{self, download_file_name, GenerationResult, ImageRecord};
use crate::service::EditService;
use crate::session::state::{EditMode, GenerationOutcome, SessionState};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Result of a generate action that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// The service returned an edited image.
    Produced(GenerationResult),
    /// The service answered without an image; try a different description.
    NoImageProduced,
    /// Another operation was already running; nothing was sent.
    Busy,
    /// The session was replaced while the call was in flight; the completion
    /// was discarded.
    Stale,
}

/// Result of an extract action that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// The description now stands as the session's prompt.
    Extracted(String),
    /// Another operation was already running; nothing was sent.
    Busy,
    /// The session was replaced while the call was in flight.
    Stale,
}

/// Drives one editing session against an [`EditService`].
///
/// State changes are applied under a short lock and never span a service
/// call, so readers always see a whole transition. Each async action writes
/// state when it starts and when it completes, and completions are tagged with
/// the session epoch they were issued under.
pub struct SessionController<S> {
    service: S,
    state: Mutex<SessionState>,
}

impl<S: EditService> SessionController<S> {
    /// Creates a controller with an empty session.
    pub fn new(service: S) -> Self {
        Self {
            service,
            state: Mutex::new(SessionState::new()),
        }
    }

    /// Returns the service backing this session.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Returns a copy of the current session.
    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<T>(&self, f: impl FnOnce(SessionState) -> (SessionState, T)) -> T {
        let mut guard = self.lock();
        let (next, out) = f(std::mem::take(&mut *guard));
        *guard = next;
        out
    }

    fn apply(&self, f: impl FnOnce(SessionState) -> SessionState) {
        self.update(|state| (f(state), ()));
    }

    /// Replaces the primary image and starts a fresh session.
    pub fn set_primary_image(&self, record: ImageRecord) {
        tracing::info!(image = record.display_name(), "starting new session");
        self.apply(|state| state.with_primary_image(record));
    }

    /// Replaces the secondary image.
    pub fn set_secondary_image(&self, record: ImageRecord) {
        self.apply(|state| state.with_secondary_image(record));
    }

    /// Switches the edit mode.
    pub fn set_mode(&self, mode: EditMode) {
        self.apply(|state| state.with_mode(mode));
    }

    /// Replaces the prompt text.
    pub fn set_prompt(&self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        self.apply(|state| state.with_prompt(prompt));
    }

    /// Discards the session. In-flight calls complete into nothing.
    pub fn reset(&self) {
        tracing::info!("session reset");
        self.apply(SessionState::reset);
    }

    /// Reads `path` into the primary slot.
    pub async fn upload_primary(&self, path: impl AsRef<Path>) -> Result<()> {
        let record = self.decode(path).await?;
        self.set_primary_image(record);
        Ok(())
    }

    /// Reads `path` into the secondary slot.
    pub async fn upload_secondary(&self, path: impl AsRef<Path>) -> Result<()> {
        let record = self.decode(path).await?;
        self.set_secondary_image(record);
        Ok(())
    }

    async fn decode(&self, path: impl AsRef<Path>) -> Result<ImageRecord> {
        match image::decode_file(path).await {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::warn!(error = %e, "image upload failed");
                let message = e.user_message();
                self.apply(|state| state.with_upload_error(message));
                Err(e)
            }
        }
    }

    /// Asks the service for a style description of the reference image and
    /// stores it as the prompt.
    pub async fn extract_description(&self) -> Result<ExtractOutcome> {
        let ticket = self.update(|state| {
            if state.is_busy() {
                return (state, Ok(None));
            }
            match state.extraction_ticket() {
                Ok(ticket) => (state.begin_extraction(), Ok(Some(ticket))),
                Err(e) => {
                    let err = EditorError::from(e);
                    (state.with_extraction_rejected(err.user_message()), Err(err))
                }
            }
        });
        let Some(ticket) = ticket? else {
            tracing::debug!("extraction skipped, session busy");
            return Ok(ExtractOutcome::Busy);
        };

        let outcome = self.service.extract_description(&ticket.image).await;

        let applied = self.update(|state| {
            let current = state.epoch() == ticket.epoch;
            let message = outcome.as_ref().map(String::clone).map_err(EditorError::user_message);
            (state.finish_extraction(ticket.epoch, message), current)
        });
        if !applied {
            tracing::warn!(epoch = ticket.epoch, "discarding extraction from a previous session");
            return Ok(ExtractOutcome::Stale);
        }

        match outcome {
            Ok(description) => Ok(ExtractOutcome::Extracted(description)),
            Err(e) => {
                tracing::warn!(error = %e, "description extraction failed");
                Err(e)
            }
        }
    }

    /// Validates the session, composes the prompt and runs one generation.
    pub async fn generate(&self) -> Result<GenerateOutcome> {
        let ticket = self.update(|state| {
            if state.is_busy() {
                return (state, Ok(None));
            }
            match state.generation_ticket() {
                Ok(ticket) => (state.begin_generation(), Ok(Some(ticket))),
                Err(e) => {
                    let err = EditorError::from(e);
                    (state.with_generation_rejected(err.user_message()), Err(err))
                }
            }
        });
        let Some(ticket) = ticket? else {
            tracing::debug!("generation skipped, session busy");
            return Ok(GenerateOutcome::Busy);
        };

        tracing::debug!(
            mode = %ticket.mode,
            images = ticket.images.len(),
            service = self.service.name(),
            "generating"
        );
        let outcome = self
            .service
            .generate(&ticket.images, &ticket.prompt, ticket.mode)
            .await;

        let recorded = match &outcome {
            Ok(Some(result)) => GenerationOutcome::Produced(result.clone()),
            Ok(None) => GenerationOutcome::NoImageProduced(NO_IMAGE_PRODUCED_MESSAGE.to_string()),
            Err(e) => GenerationOutcome::Failed(e.user_message()),
        };
        let applied = self.update(|state| {
            let current = state.epoch() == ticket.epoch;
            (state.finish_generation(ticket.epoch, recorded), current)
        });
        if !applied {
            tracing::warn!(epoch = ticket.epoch, "discarding generation from a previous session");
            return Ok(GenerateOutcome::Stale);
        }

        match outcome {
            Ok(Some(result)) => Ok(GenerateOutcome::Produced(result)),
            Ok(None) => {
                tracing::warn!("service returned no image");
                Ok(GenerateOutcome::NoImageProduced)
            }
            Err(e) => {
                tracing::warn!(error = %e, "generation failed");
                Err(e)
            }
        }
    }

    /// Returns the download file name for the current result.
    pub fn download_name(&self) -> Option<String> {
        let state = self.lock();
        let result = state.result()?;
        let original = state.primary_image().map(ImageRecord::display_name).unwrap_or("");
        Some(download_file_name(original, &result.mime_type))
    }

    /// Writes the current result into `dir` and returns the file path.
    pub fn save_result(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let (name, result) = {
            let state = self.lock();
            let result = state.result().cloned().ok_or(ValidationError::NoResult)?;
            let original = state.primary_image().map(ImageRecord::display_name).unwrap_or("");
            (download_file_name(original, &result.mime_type), result)
        };

        let path = dir.as_ref().join(name);
        result.save(&path)?;
        tracing::debug!(path = %path.display(), "saved edited image");
        Ok(path)
    }
}
