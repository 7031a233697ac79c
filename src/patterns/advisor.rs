//! Recording advisor
//!
//! Decides, with a confidence score, whether the current moment merits
//! starting or stopping a capture session. Trigger candidates are ranked by
//! a weighted score; manual requests always win outright. Active sessions
//! auto-stop on duration, idleness, context loss or low quality.

use crate::patterns::types::{
    RecordingDecision, RecordingSession, RecordingTrigger, StopReason, UserPattern,
};
use tracing::debug;

/// Advisor tuning
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    /// Minimum weighted score for a positive decision
    pub decision_threshold: f64,
    /// Hard session duration cap, seconds
    pub max_session_secs: f64,
    /// Idle time that stops a session, seconds
    pub idle_timeout_secs: f64,
    /// Quality floor; sessions below it are stopped once warmed up
    pub quality_floor: f64,
    /// Events before the quality floor applies
    pub quality_warmup_events: usize,
    /// Fractional cost of recording overhead, discounts every score
    pub resource_cost: f64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            decision_threshold: 0.8,
            max_session_secs: 600.0,
            idle_timeout_secs: 120.0,
            quality_floor: 0.3,
            quality_warmup_events: 20,
            resource_cost: 0.2,
        }
    }
}

/// A reason to consider recording right now
#[derive(Debug, Clone)]
pub struct TriggerCandidate {
    pub trigger: RecordingTrigger,
    pub confidence: f64,
    pub reason: String,
}

impl TriggerCandidate {
    pub fn manual() -> Self {
        Self {
            trigger: RecordingTrigger::Manual,
            confidence: 1.0,
            reason: "user requested recording".to_string(),
        }
    }

    /// Candidate derived from a mined pattern's automation potential
    pub fn from_pattern(pattern: &UserPattern) -> Self {
        Self {
            trigger: RecordingTrigger::PatternBased,
            confidence: pattern.automation_potential,
            reason: format!("automatable pattern observed: {}", pattern.description),
        }
    }
}

/// Scores trigger candidates and manages the active recording session
pub struct RecordingAdvisor {
    config: AdvisorConfig,
    active: Option<RecordingSession>,
    context_lost: bool,
}

impl RecordingAdvisor {
    pub fn new() -> Self {
        Self::with_config(AdvisorConfig::default())
    }

    pub fn with_config(config: AdvisorConfig) -> Self {
        Self {
            config,
            active: None,
            context_lost: false,
        }
    }

    /// Rank candidates and return the highest-scoring positive decision,
    /// or the best negative one. Manual requests win outright.
    pub fn evaluate(&self, candidates: &[TriggerCandidate]) -> RecordingDecision {
        if let Some(manual) = candidates
            .iter()
            .find(|c| c.trigger == RecordingTrigger::Manual)
        {
            return RecordingDecision {
                should_record: true,
                trigger: RecordingTrigger::Manual,
                confidence: manual.confidence,
                score: f64::MAX,
                reason: manual.reason.clone(),
            };
        }

        let cost_factor = 1.0 - self.config.resource_cost;
        let mut best: Option<RecordingDecision> = None;

        for candidate in candidates {
            let score = candidate.confidence
                * candidate.trigger.priority_multiplier()
                * candidate.trigger.trigger_multiplier()
                * cost_factor;

            let decision = RecordingDecision {
                should_record: score >= self.config.decision_threshold,
                trigger: candidate.trigger,
                confidence: candidate.confidence,
                score,
                reason: candidate.reason.clone(),
            };

            let replace = match &best {
                None => true,
                // Any positive decision beats any negative one; ties break on score
                Some(current) => {
                    (decision.should_record && !current.should_record)
                        || (decision.should_record == current.should_record
                            && decision.score > current.score)
                }
            };
            if replace {
                best = Some(decision);
            }
        }

        best.unwrap_or(RecordingDecision {
            should_record: false,
            trigger: RecordingTrigger::TimeBased,
            confidence: 0.0,
            score: 0.0,
            reason: "no trigger candidates".to_string(),
        })
    }

    /// Begin a capture session; replaces any active one
    pub fn start_session(&mut self, trigger: RecordingTrigger) -> &RecordingSession {
        debug!(?trigger, "recording session started");
        self.context_lost = false;
        self.active.insert(RecordingSession::new(trigger))
    }

    /// Note an event observed while recording
    pub fn record_event(&mut self, app: &str) {
        if let Some(session) = &mut self.active {
            session.event_count += 1;
            session.last_event_at = chrono::Utc::now();
            if !session.contexts_seen.iter().any(|c| c == app) {
                session.contexts_seen.push(app.to_string());
            }
            session.quality = session_quality(session);
        }
    }

    /// Signal that the recorded context disappeared (window closed, etc.)
    pub fn note_context_lost(&mut self) {
        self.context_lost = true;
    }

    pub fn active_session(&self) -> Option<&RecordingSession> {
        self.active.as_ref()
    }

    /// Check the auto-stop conditions for the active session
    pub fn should_stop(&self) -> Option<StopReason> {
        let session = self.active.as_ref()?;

        if session.duration_secs() >= self.config.max_session_secs {
            return Some(StopReason::MaxDuration);
        }
        if session.idle_secs() >= self.config.idle_timeout_secs {
            return Some(StopReason::IdleTimeout);
        }
        if self.context_lost {
            return Some(StopReason::ContextLost);
        }
        if session.event_count >= self.config.quality_warmup_events
            && session.quality < self.config.quality_floor
        {
            return Some(StopReason::LowQuality);
        }
        None
    }

    /// Close the active session and return it
    pub fn stop_session(&mut self, reason: StopReason) -> Option<RecordingSession> {
        let session = self.active.take();
        if let Some(s) = &session {
            debug!(?reason, events = s.event_count, quality = s.quality, "recording session stopped");
        }
        session
    }
}

impl Default for RecordingAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Quality blends event volume with context diversity
fn session_quality(session: &RecordingSession) -> f64 {
    let volume = (session.event_count as f64 / 50.0).min(1.0);
    let diversity = (session.contexts_seen.len() as f64 / 3.0).min(1.0);
    0.6 * volume + 0.4 * diversity
}
