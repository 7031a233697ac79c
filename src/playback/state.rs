//! Playback state machine
//!
//! Deterministic finite state machine for one playback session:
//! - Safety: no invalid states reachable
//! - Determinism: unique next state per event
//! - Terminal states only reachable from Running or Paused

use crate::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Playback session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackState {
    /// No session active
    Idle,

    /// Sequence validation and context detection in progress
    Preparing,

    /// Actions executing on the worker
    Running,

    /// Suspended at an action boundary, resumable
    Paused,

    /// All actions executed without failure (terminal)
    Completed,

    /// Aborted by validation, failure-rate threshold, or terminal error (terminal)
    Failed,

    /// Cancelled cooperatively by the caller (terminal)
    Cancelled,
}

/// Events that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// `play()` called; validation begins
    Prepare,

    /// Validation passed; the action loop starts
    Start,

    /// Pause requested at an action boundary
    Pause,

    /// Resume requested
    Resume,

    /// Every action executed cleanly
    Finish,

    /// Validation blocked, failure-rate threshold tripped, or an
    /// unrecoverable failure occurred
    Fail,

    /// Cancellation signal observed
    Cancel,
}

impl PlaybackState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlaybackState::Completed | PlaybackState::Failed | PlaybackState::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackState::Running | PlaybackState::Paused)
    }

    /// Attempt a state transition.
    ///
    /// Transition function T: S x Event -> Result<S>
    ///
    /// Valid transitions:
    /// 1. Idle      -> Preparing  (on: Prepare)
    /// 2. Preparing -> Running    (on: Start)
    /// 3. Preparing -> Failed     (on: Fail)
    /// 4. Preparing -> Cancelled  (on: Cancel)
    /// 5. Running   -> Paused     (on: Pause)
    /// 6. Paused    -> Running    (on: Resume)
    /// 7. Running   -> Completed  (on: Finish)
    /// 8. Running   -> Failed     (on: Fail)
    /// 9. Running   -> Cancelled  (on: Cancel)
    /// 10. Paused   -> Failed     (on: Fail)
    /// 11. Paused   -> Cancelled  (on: Cancel)
    ///
    /// Terminal states reject every event.
    pub fn transition(&self, event: PlaybackEvent) -> Result<PlaybackState> {
        use PlaybackEvent::*;
        use PlaybackState::*;

        let next = match (self, event) {
            (Idle, Prepare) => Preparing,

            (Preparing, Start) => Running,
            (Preparing, Fail) => Failed,
            (Preparing, Cancel) => Cancelled,

            (Running, Pause) => Paused,
            (Running, Finish) => Completed,
            (Running, Fail) => Failed,
            (Running, Cancel) => Cancelled,

            (Paused, Resume) => Running,
            (Paused, Fail) => Failed,
            (Paused, Cancel) => Cancelled,

            (from, event) => {
                return Err(EngineError::InvalidTransition {
                    from: format!("{:?}", from),
                    to: format!("(via {:?})", event),
                    reason: format!("no valid transition from {:?} on {:?}", from, event),
                });
            }
        };

        Ok(next)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "Idle",
            PlaybackState::Preparing => "Preparing",
            PlaybackState::Running => "Running",
            PlaybackState::Paused => "Paused",
            PlaybackState::Completed => "Completed",
            PlaybackState::Failed => "Failed",
            PlaybackState::Cancelled => "Cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = PlaybackState::Idle
            .transition(PlaybackEvent::Prepare)
            .unwrap()
            .transition(PlaybackEvent::Start)
            .unwrap()
            .transition(PlaybackEvent::Finish)
            .unwrap();
        assert_eq!(state, PlaybackState::Completed);
    }

    #[test]
    fn test_pause_resume_cycle() {
        let paused = PlaybackState::Running
            .transition(PlaybackEvent::Pause)
            .unwrap();
        assert_eq!(paused, PlaybackState::Paused);
        assert!(paused.is_active());

        let resumed = paused.transition(PlaybackEvent::Resume).unwrap();
        assert_eq!(resumed, PlaybackState::Running);
    }

    #[test]
    fn test_terminal_states_reject_events() {
        for state in [
            PlaybackState::Completed,
            PlaybackState::Failed,
            PlaybackState::Cancelled,
        ] {
            assert!(state.is_terminal());
            assert!(state.transition(PlaybackEvent::Start).is_err());
            assert!(state.transition(PlaybackEvent::Cancel).is_err());
        }
    }

    #[test]
    fn test_cannot_complete_from_idle() {
        assert!(PlaybackState::Idle.transition(PlaybackEvent::Finish).is_err());
    }

    #[test]
    fn test_cancel_from_active_and_preparing() {
        for state in [
            PlaybackState::Preparing,
            PlaybackState::Running,
            PlaybackState::Paused,
        ] {
            assert_eq!(
                state.transition(PlaybackEvent::Cancel).unwrap(),
                PlaybackState::Cancelled
            );
        }
    }

    #[test]
    fn test_determinism() {
        let a = PlaybackState::Running.transition(PlaybackEvent::Pause).unwrap();
        let b = PlaybackState::Running.transition(PlaybackEvent::Pause).unwrap();
        assert_eq!(a, b);
    }
}
