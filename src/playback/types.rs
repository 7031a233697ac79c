//! Playback configuration, control handle, and result types

use crate::context::VerificationLevel;
use crate::playback::state::PlaybackState;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Preset tuning profiles surfaced to embedding applications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackMode {
    /// Strict verification, half speed, generous retries
    Safe,
    Normal,
    /// Minimal verification, double speed, single retry
    Fast,
}

/// Playback tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Inter-action delay scale; clamped to [0.1, 10.0] when applied
    pub speed_multiplier: f64,
    /// Adaptive retries per failed action
    pub max_retries: usize,
    /// Run the context verification gate before each interactive action
    pub verify_context: bool,
    pub verification_level: VerificationLevel,
    /// Fraction of failed actions that aborts the remaining sequence
    pub failure_rate_threshold: f64,
    /// Enable disruptive recovery strategies (restart, user intervention)
    pub aggressive_recovery: bool,
    pub max_adaptation_attempts: usize,
    /// Delay between actions when the action carries no timing, seconds
    pub default_action_delay_secs: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            max_retries: 3,
            verify_context: true,
            verification_level: VerificationLevel::Standard,
            failure_rate_threshold: 0.5,
            aggressive_recovery: false,
            max_adaptation_attempts: 3,
            default_action_delay_secs: 0.5,
        }
    }
}

impl PlaybackConfig {
    /// Preset profile for a mode
    pub fn for_mode(mode: PlaybackMode) -> Self {
        match mode {
            PlaybackMode::Safe => Self {
                speed_multiplier: 0.5,
                max_retries: 5,
                verification_level: VerificationLevel::Strict,
                failure_rate_threshold: 0.3,
                ..Self::default()
            },
            PlaybackMode::Normal => Self::default(),
            PlaybackMode::Fast => Self {
                speed_multiplier: 2.0,
                max_retries: 1,
                verify_context: false,
                verification_level: VerificationLevel::Minimal,
                ..Self::default()
            },
        }
    }

    /// Speed multiplier clamped to the supported range
    pub fn effective_speed(&self) -> f64 {
        self.speed_multiplier.clamp(0.1, 10.0)
    }
}

/// Cloneable handle for cooperative cancel/pause/resume.
///
/// Signals are checked at action boundaries only; an action in flight
/// always executes to completion.
#[derive(Clone)]
pub struct PlaybackController {
    cancelled: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    state: Arc<Mutex<PlaybackState>>,
}

impl PlaybackController {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(PlaybackState::Idle)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Snapshot of the session state for embedding applications
    pub fn state(&self) -> PlaybackState {
        *self.state.lock().unwrap()
    }

    pub(crate) fn set_state(&self, state: PlaybackState) {
        *self.state.lock().unwrap() = state;
    }

    /// Consume leftover cancel/pause signals so the handle serves the
    /// next session
    pub(crate) fn clear_signals(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new()
    }
}

/// Record of one action that ultimately failed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedActionDetail {
    pub index: usize,
    pub kind: String,
    pub message: String,
    /// Classified failure kind name, when recovery ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<String>,
    pub adaptation_attempted: bool,
    pub recovery_attempted: bool,
}

/// Aggregate outcome of one playback session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackResult {
    /// True only when every action succeeded
    pub success: bool,
    pub total_actions: usize,
    pub successful_actions: usize,
    pub failed_actions: usize,
    pub execution_time_seconds: f64,
    pub failed_action_details: Vec<FailedActionDetail>,
    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_clamped() {
        let mut config = PlaybackConfig::default();
        config.speed_multiplier = 50.0;
        assert_eq!(config.effective_speed(), 10.0);

        config.speed_multiplier = 0.001;
        assert_eq!(config.effective_speed(), 0.1);
    }

    #[test]
    fn test_mode_presets() {
        let safe = PlaybackConfig::for_mode(PlaybackMode::Safe);
        assert_eq!(safe.verification_level, VerificationLevel::Strict);
        assert!(safe.max_retries > PlaybackConfig::default().max_retries);

        let fast = PlaybackConfig::for_mode(PlaybackMode::Fast);
        assert!(!fast.verify_context);
    }

    #[test]
    fn test_controller_signals_shared_across_clones() {
        let controller = PlaybackController::new();
        let handle = controller.clone();

        handle.pause();
        assert!(controller.is_paused());

        handle.resume();
        handle.cancel();
        assert!(!controller.is_paused());
        assert!(controller.is_cancelled());
    }

    #[test]
    fn test_result_wire_shape() {
        let result = PlaybackResult {
            success: true,
            total_actions: 5,
            successful_actions: 5,
            failed_actions: 0,
            execution_time_seconds: 1.25,
            failed_action_details: Vec::new(),
            recommendations: Vec::new(),
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"totalActions\":5"));
        assert!(json.contains("\"executionTimeSeconds\":1.25"));
    }
}
