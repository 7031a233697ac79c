//! Adaptive Executor: graduated retargeting of drifted actions

pub mod executor;
pub mod types;

pub use executor::{AdaptiveConfig, AdaptiveExecutor};
pub use types::{AdaptationContext, AdaptationKind, AdaptationResult};
