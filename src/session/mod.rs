//! Editing session: state store and user actions.

mod controller;
mod state;

pub use controller::{ExtractOutcome, GenerateOutcome, SessionController};
pub use state::{
    EditMode, ExtractionTicket, GenerationOutcome, GenerationTicket, OperationState,
    OperationStatus, SessionState,
};
