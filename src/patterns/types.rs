//! Pattern and recording-advisor type definitions

use crate::types::Point;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One observed event in the rolling activity history
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
}

impl ActivityEvent {
    pub fn action(
        kind: &str,
        coordinates: Option<Point>,
        app: &str,
        text: Option<String>,
        success: bool,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: ActivityKind::Action {
                kind: kind.to_string(),
                coordinates,
                app: app.to_string(),
                text,
                success,
            },
        }
    }

    pub fn context_switch(from_app: &str, to_app: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: ActivityKind::ContextSwitch {
                from_app: from_app.to_string(),
                to_app: to_app.to_string(),
            },
        }
    }
}

/// What happened: an executed action or a context change
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityKind {
    Action {
        kind: String,
        coordinates: Option<Point>,
        app: String,
        text: Option<String>,
        success: bool,
    },
    ContextSwitch {
        from_app: String,
        to_app: String,
    },
}

/// Category of a mined behavioral pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Repetitive,
    Workflow,
    ContextSwitch,
    TimeBased,
}

/// A recurring structure mined from the activity history.
///
/// Updated in place across mining passes, never deleted within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPattern {
    pub id: Uuid,
    pub kind: PatternKind,
    /// Grouping key that identified this pattern
    pub key: String,
    pub description: String,
    /// Observed occurrence count
    pub frequency: usize,
    /// How well this pattern would automate, in [0, 1]
    pub automation_potential: f64,
    /// Heuristic efficiency of the observed behavior, in [0, 1]
    pub efficiency: f64,
    pub confidence: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl UserPattern {
    pub fn new(kind: PatternKind, key: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            key,
            description,
            frequency: 1,
            automation_potential: 0.0,
            efficiency: 0.0,
            confidence: 0.0,
            first_seen: now,
            last_seen: now,
        }
    }

    pub fn is_highly_automatable(&self) -> bool {
        self.automation_potential >= 0.7
    }
}

/// What prompted a recording decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingTrigger {
    Manual,
    ContextBased,
    PatternBased,
    TimeBased,
}

impl RecordingTrigger {
    /// Weighting for how urgent this trigger class is
    pub fn priority_multiplier(&self) -> f64 {
        match self {
            RecordingTrigger::Manual => 2.0,
            RecordingTrigger::PatternBased => 1.5,
            RecordingTrigger::ContextBased => 1.2,
            RecordingTrigger::TimeBased => 1.0,
        }
    }

    /// Weighting for how reliable this trigger class historically is
    pub fn trigger_multiplier(&self) -> f64 {
        match self {
            RecordingTrigger::Manual => 1.5,
            RecordingTrigger::PatternBased => 1.2,
            RecordingTrigger::ContextBased => 1.0,
            RecordingTrigger::TimeBased => 0.8,
        }
    }
}

/// Advisor verdict on whether to record right now
#[derive(Debug, Clone)]
pub struct RecordingDecision {
    pub should_record: bool,
    pub trigger: RecordingTrigger,
    pub confidence: f64,
    /// Weighted decision score the verdict was ranked by
    pub score: f64,
    pub reason: String,
}

/// One bounded capture episode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSession {
    pub id: Uuid,
    pub trigger: RecordingTrigger,
    pub started_at: DateTime<Utc>,
    pub last_event_at: DateTime<Utc>,
    pub event_count: usize,
    /// Distinct application names seen during the session
    pub contexts_seen: Vec<String>,
    /// Session quality in [0, 1]
    pub quality: f64,
}

impl RecordingSession {
    pub fn new(trigger: RecordingTrigger) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            trigger,
            started_at: now,
            last_event_at: now,
            event_count: 0,
            contexts_seen: Vec::new(),
            quality: 0.0,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn idle_secs(&self) -> f64 {
        (Utc::now() - self.last_event_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Why a recording session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxDuration,
    IdleTimeout,
    ContextLost,
    LowQuality,
    Requested,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_multipliers_favor_manual() {
        let manual = RecordingTrigger::Manual.priority_multiplier()
            * RecordingTrigger::Manual.trigger_multiplier();
        let time = RecordingTrigger::TimeBased.priority_multiplier()
            * RecordingTrigger::TimeBased.trigger_multiplier();
        assert!(manual > time);
    }

    #[test]
    fn test_pattern_automatable_threshold() {
        let mut pattern = UserPattern::new(
            PatternKind::Repetitive,
            "click|1:2|Firefox|".to_string(),
            "repeated click".to_string(),
        );
        assert!(!pattern.is_highly_automatable());
        pattern.automation_potential = 0.75;
        assert!(pattern.is_highly_automatable());
    }

    #[test]
    fn test_new_session_starts_empty() {
        let session = RecordingSession::new(RecordingTrigger::Manual);
        assert_eq!(session.event_count, 0);
        assert!(session.contexts_seen.is_empty());
        assert!(session.duration_secs() < 1.0);
    }
}
