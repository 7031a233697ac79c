//! Pattern mining and recording advisor

pub mod advisor;
pub mod miner;
pub mod types;

pub use advisor::{AdvisorConfig, RecordingAdvisor, TriggerCandidate};
pub use miner::{MinerConfig, PatternMiner};
pub use types::{
    ActivityEvent, ActivityKind, PatternKind, RecordingDecision, RecordingSession,
    RecordingTrigger, StopReason, UserPattern,
};
