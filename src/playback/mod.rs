//! Playback Orchestrator: validation, the action loop, and session state

pub mod executor;
pub mod orchestrator;
pub mod state;
pub mod types;
pub mod validator;

pub use executor::ActionExecutor;
pub use orchestrator::PlaybackOrchestrator;
pub use state::{PlaybackEvent, PlaybackState};
pub use types::{
    FailedActionDetail, PlaybackConfig, PlaybackController, PlaybackMode, PlaybackResult,
};
pub use validator::{SequenceValidator, ValidationIssue, ValidationReport, ValidationSeverity};
