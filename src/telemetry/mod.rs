//! Engine telemetry
//!
//! Collects typed events from the orchestrator and sub-engines behind a
//! shared handle, with running aggregate statistics for the embedding
//! application.

use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    StateTransition {
        from: String,
        to: String,
        timestamp: Instant,
    },
    ActionExecuted {
        kind: String,
        success: bool,
        duration_ms: u64,
        timestamp: Instant,
    },
    AdaptationAttempt {
        kind: String,
        attempt: usize,
        success: bool,
        timestamp: Instant,
    },
    RecoveryAttempt {
        strategy: String,
        success: bool,
        timestamp: Instant,
    },
    ContextChanged {
        from_app: String,
        to_app: String,
        significance: f64,
        timestamp: Instant,
    },
    VerificationCompleted {
        status: String,
        confidence: f64,
        timestamp: Instant,
    },
}

/// Running telemetry statistics
#[derive(Debug, Clone, Default)]
pub struct TelemetryStats {
    pub actions_executed: usize,
    pub actions_succeeded: usize,
    pub actions_failed: usize,
    pub adaptation_attempts: usize,
    pub adaptations_succeeded: usize,
    pub recovery_attempts: usize,
    pub recoveries_succeeded: usize,
    pub context_changes: usize,
    pub verifications: usize,
    pub state_transitions: usize,
}

/// Telemetry collector shared across engine components
#[derive(Clone)]
pub struct EngineTelemetry {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

impl EngineTelemetry {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = self.stats.lock().unwrap();
            match &event {
                TelemetryEvent::StateTransition { .. } => {
                    stats.state_transitions += 1;
                }
                TelemetryEvent::ActionExecuted { success, .. } => {
                    stats.actions_executed += 1;
                    if *success {
                        stats.actions_succeeded += 1;
                    } else {
                        stats.actions_failed += 1;
                    }
                }
                TelemetryEvent::AdaptationAttempt { success, .. } => {
                    stats.adaptation_attempts += 1;
                    if *success {
                        stats.adaptations_succeeded += 1;
                    }
                }
                TelemetryEvent::RecoveryAttempt { success, .. } => {
                    stats.recovery_attempts += 1;
                    if *success {
                        stats.recoveries_succeeded += 1;
                    }
                }
                TelemetryEvent::ContextChanged { .. } => {
                    stats.context_changes += 1;
                }
                TelemetryEvent::VerificationCompleted { .. } => {
                    stats.verifications += 1;
                }
            }
        }

        let mut events = self.events.lock().unwrap();
        events.push(event);
    }

    /// Get current statistics
    pub fn stats(&self) -> TelemetryStats {
        self.stats.lock().unwrap().clone()
    }

    /// Drain collected events
    pub fn take_events(&self) -> Vec<TelemetryEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    /// Seconds since the collector was created
    pub fn uptime_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

impl Default for EngineTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_stats() {
        let telemetry = EngineTelemetry::new();

        telemetry.record(TelemetryEvent::ActionExecuted {
            kind: "click".to_string(),
            success: true,
            duration_ms: 12,
            timestamp: Instant::now(),
        });
        telemetry.record(TelemetryEvent::ActionExecuted {
            kind: "click".to_string(),
            success: false,
            duration_ms: 8,
            timestamp: Instant::now(),
        });

        let stats = telemetry.stats();
        assert_eq!(stats.actions_executed, 2);
        assert_eq!(stats.actions_succeeded, 1);
        assert_eq!(stats.actions_failed, 1);
    }

    #[test]
    fn test_take_events_drains() {
        let telemetry = EngineTelemetry::new();
        telemetry.record(TelemetryEvent::ContextChanged {
            from_app: "Firefox".to_string(),
            to_app: "Code".to_string(),
            significance: 0.5,
            timestamp: Instant::now(),
        });

        assert_eq!(telemetry.take_events().len(), 1);
        assert!(telemetry.take_events().is_empty());
        assert_eq!(telemetry.stats().context_changes, 1);
    }

    #[test]
    fn test_shared_handle() {
        let telemetry = EngineTelemetry::new();
        let clone = telemetry.clone();

        clone.record(TelemetryEvent::StateTransition {
            from: "Idle".to_string(),
            to: "Preparing".to_string(),
            timestamp: Instant::now(),
        });

        assert_eq!(telemetry.stats().state_transitions, 1);
    }
}
