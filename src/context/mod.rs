//! Context Engine: live environment detection and verification

pub mod detector;
pub mod types;
pub mod verifier;

pub use detector::ContextDetector;
pub use types::{ApplicationContext, ChangedField, ContextChange, ContextType, UiState};
pub use verifier::{
    ContextVerifier, VerificationCriteria, VerificationLevel, VerificationResult,
    VerificationStatus,
};
