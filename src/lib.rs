//! ReplayKit - Adaptive Playback & Recovery Engine
//!
//! Replays recorded user-interaction sequences against desktop
//! environments that have drifted since recording.
//!
//! # Architecture
//!
//! - **Context Engine**: detects and verifies the live environment
//! - **Adaptive Executor**: graduated retargeting of drifted actions
//! - **Recovery Engine**: failure classification + learned strategies
//! - **Pattern Miner & Recording Advisor**: observes activity, scores
//!   when capturing a new recording is worthwhile
//! - **Playback Orchestrator**: the cancellable session state machine
//!   tying it all together

pub mod errors;
pub mod types;
pub mod platform;
pub mod telemetry;

pub mod context;
pub mod patterns;
pub mod adaptive;
pub mod recovery;
pub mod playback;

pub mod config;

// Re-export commonly used types
pub use errors::{EngineError, Result};
pub use playback::{
    PlaybackConfig, PlaybackController, PlaybackMode, PlaybackOrchestrator, PlaybackResult,
    PlaybackState,
};
pub use types::{Action, Bounds, ExecutionOutcome, ExecutionStatus, Point};
