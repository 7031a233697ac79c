//! Recovery Engine: failure classification, strategy selection, learning

pub mod engine;
pub mod types;

pub use engine::{RecoveryConfig, RecoveryEngine};
pub use types::{
    classify_failure, FailureInfo, FailureKind, RecoveryResult, RecoveryStrategy, StrategyAttempt,
};
