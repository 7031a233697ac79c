//! Playback orchestration
//!
//! Runs one sequence end to end: pre-flight validation, baseline context
//! detection, then the per-action loop with cooperative cancel/pause at
//! action boundaries. Failed actions route through the adaptive executor
//! first and the recovery engine after; surviving failures are recorded,
//! never re-thrown, and only the global failure-rate threshold aborts the
//! remainder.

use crate::adaptive::{AdaptationContext, AdaptiveConfig, AdaptiveExecutor};
use crate::context::{
    ContextDetector, ContextVerifier, VerificationCriteria, VerificationStatus,
};
use crate::errors::{EngineError, Result};
use crate::patterns::{ActivityEvent, PatternMiner};
use crate::platform::{ElementDetector, PlatformDriver};
use crate::playback::executor::ActionExecutor;
use crate::playback::state::{PlaybackEvent, PlaybackState};
use crate::playback::types::{
    FailedActionDetail, PlaybackConfig, PlaybackController, PlaybackResult,
};
use crate::playback::validator::{SequenceValidator, ValidationReport};
use crate::recovery::{FailureInfo, RecoveryConfig, RecoveryEngine, RecoveryStrategy};
use crate::telemetry::{EngineTelemetry, TelemetryEvent};
use crate::types::{Action, Bounds};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Pause-wait poll granularity
const PAUSE_POLL_MS: u64 = 100;

/// Drives one playback session through its state machine
pub struct PlaybackOrchestrator {
    config: PlaybackConfig,
    driver: Arc<dyn PlatformDriver>,
    elements: Arc<dyn ElementDetector>,
    executor: ActionExecutor,
    detector: ContextDetector,
    verifier: ContextVerifier,
    adaptive: AdaptiveExecutor,
    recovery: RecoveryEngine,
    miner: PatternMiner,
    validator: SequenceValidator,
    controller: PlaybackController,
    telemetry: EngineTelemetry,
}

impl PlaybackOrchestrator {
    pub fn new(driver: Arc<dyn PlatformDriver>, elements: Arc<dyn ElementDetector>) -> Self {
        Self::with_config(driver, elements, PlaybackConfig::default())
    }

    pub fn with_config(
        driver: Arc<dyn PlatformDriver>,
        elements: Arc<dyn ElementDetector>,
        config: PlaybackConfig,
    ) -> Self {
        let telemetry = EngineTelemetry::new();
        let executor = ActionExecutor::new(Arc::clone(&driver));
        let detector =
            ContextDetector::new(Arc::clone(&driver)).with_telemetry(telemetry.clone());
        let adaptive = AdaptiveExecutor::new(Arc::clone(&driver), Arc::clone(&elements))
            .with_telemetry(telemetry.clone());
        let recovery = RecoveryEngine::with_config(
            Arc::clone(&driver),
            Arc::clone(&elements),
            RecoveryConfig {
                aggressive: config.aggressive_recovery,
                ..RecoveryConfig::default()
            },
        )
        .with_telemetry(telemetry.clone());

        Self {
            config,
            driver,
            elements,
            executor,
            detector,
            verifier: ContextVerifier::new(),
            adaptive,
            recovery,
            miner: PatternMiner::new(),
            validator: SequenceValidator::new(),
            controller: PlaybackController::new(),
            telemetry,
        }
    }

    /// Replace the adaptive executor tuning (rebuilds its learning state)
    pub fn with_adaptive_config(mut self, config: AdaptiveConfig) -> Self {
        self.adaptive =
            AdaptiveExecutor::with_config(Arc::clone(&self.driver), Arc::clone(&self.elements), config)
                .with_telemetry(self.telemetry.clone());
        self
    }

    /// Replace the recovery engine tuning (rebuilds its learning state)
    pub fn with_recovery_config(mut self, mut config: RecoveryConfig) -> Self {
        config.aggressive = config.aggressive || self.config.aggressive_recovery;
        self.recovery =
            RecoveryEngine::with_config(Arc::clone(&self.driver), Arc::clone(&self.elements), config)
                .with_telemetry(self.telemetry.clone());
        self
    }

    /// Cloneable cancel/pause handle for this orchestrator's sessions
    pub fn controller(&self) -> PlaybackController {
        self.controller.clone()
    }

    pub fn telemetry(&self) -> &EngineTelemetry {
        &self.telemetry
    }

    /// Activity patterns mined from observed playback so far
    pub fn miner(&self) -> &PatternMiner {
        &self.miner
    }

    /// Pre-flight validation without executing anything
    pub fn validate(&self, sequence: &[Action]) -> ValidationReport {
        self.validator.validate(sequence)
    }

    /// Play `sequence` from `start_index`, blocking the caller until the
    /// session reaches a terminal state.
    ///
    /// Validation failures return an error before any side effect; all
    /// execution-time failures are absorbed into the [`PlaybackResult`].
    pub fn play(&mut self, sequence: &[Action], start_index: usize) -> Result<PlaybackResult> {
        let started = Instant::now();
        let mut state = PlaybackState::Idle;
        self.transition(&mut state, PlaybackEvent::Prepare)?;

        if start_index >= sequence.len() {
            self.transition(&mut state, PlaybackEvent::Fail)?;
            return Err(EngineError::ValidationFailed(format!(
                "start index {} out of range for {} actions",
                start_index,
                sequence.len()
            )));
        }

        let report = self.validator.validate(sequence);
        if !report.is_valid {
            self.transition(&mut state, PlaybackEvent::Fail)?;
            let summary = report
                .blocking_issues()
                .map(|i| i.message.clone())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(EngineError::ValidationFailed(summary));
        }

        // Baseline environment: expectations for verification and drift
        // compensation come from here
        let baseline = self.detector.detect().ok();
        let criteria = baseline.as_ref().map(VerificationCriteria::from_context);
        let expected_app = baseline
            .as_ref()
            .map(|c| c.app_name.clone())
            .unwrap_or_default();
        let adaptation_ctx = AdaptationContext::new(
            baseline
                .as_ref()
                .map(|c| c.window_bounds)
                .unwrap_or(Bounds::new(0, 0, 0, 0)),
            &expected_app,
        );

        self.transition(&mut state, PlaybackEvent::Start)?;
        info!(
            total = sequence.len() - start_index,
            start_index, "playback started"
        );

        let todo = &sequence[start_index..];
        let total = todo.len();
        let mut session = SessionTally::new(total);
        let mut last_app: Option<String> = None;

        for (offset, action) in todo.iter().enumerate() {
            let index = start_index + offset;

            if self.controller.is_cancelled() {
                self.transition(&mut state, PlaybackEvent::Cancel)?;
                info!(index, "playback cancelled");
                return Ok(session.into_result(started, Vec::new()));
            }
            if self.controller.is_paused() {
                self.transition(&mut state, PlaybackEvent::Pause)?;
                while self.controller.is_paused() && !self.controller.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(PAUSE_POLL_MS));
                }
                if self.controller.is_cancelled() {
                    self.transition(&mut state, PlaybackEvent::Cancel)?;
                    return Ok(session.into_result(started, Vec::new()));
                }
                self.transition(&mut state, PlaybackEvent::Resume)?;
            }

            if let Some(wait) = action.wait_before() {
                self.scaled_sleep(wait);
            }

            // Context observation + optional verification gate
            let mut gate_failure: Option<String> = None;
            if action.is_interactive() {
                if let Ok(current) = self.detector.detect() {
                    if let Some(previous) = &last_app {
                        if *previous != current.app_name {
                            self.miner
                                .record(ActivityEvent::context_switch(previous, &current.app_name));
                        }
                    }
                    last_app = Some(current.app_name.clone());

                    if self.config.verify_context {
                        if let Some(criteria) = &criteria {
                            let verification = self.verifier.verify(
                                &current,
                                criteria,
                                self.config.verification_level,
                                self.detector.stable_secs(),
                            );
                            self.telemetry.record(TelemetryEvent::VerificationCompleted {
                                status: format!("{:?}", verification.status),
                                confidence: verification.confidence,
                                timestamp: Instant::now(),
                            });
                            if verification.status == VerificationStatus::Failed {
                                gate_failure = Some(format!(
                                    "context mismatch before action: expected {}, found {}",
                                    expected_app, current.app_name
                                ));
                            }
                        }
                    }
                }
            }

            let resolution = if let Some(message) = gate_failure {
                warn!(index, %message, "verification gate failed");
                self.handle_failure(action, &adaptation_ctx, &expected_app, message)
            } else {
                self.execute_action(action, &adaptation_ctx, &expected_app)
            };

            match resolution {
                ActionResolution::Succeeded { adapted } => {
                    session.successful += 1;
                    if adapted {
                        session.adapted += 1;
                    }
                }
                ActionResolution::Failed {
                    message,
                    failure_kind,
                    adaptation_attempted,
                    recovery_attempted,
                    abort,
                } => {
                    session.failed += 1;
                    session.details.push(FailedActionDetail {
                        index,
                        kind: action.kind_name().to_string(),
                        message: message.clone(),
                        failure_kind,
                        adaptation_attempted,
                        recovery_attempted,
                    });
                    if abort {
                        warn!(index, %message, "aborting: environment unusable");
                        self.transition(&mut state, PlaybackEvent::Fail)?;
                        let recommendations = vec![
                            "environment became unusable during playback; restore the target application and retry".to_string(),
                        ];
                        return Ok(session.into_result(started, recommendations));
                    }
                }
            }

            // Global failure-rate abort
            if session.failed as f64 / total as f64 > self.config.failure_rate_threshold {
                warn!(
                    failed = session.failed,
                    total, "failure-rate threshold tripped"
                );
                self.transition(&mut state, PlaybackEvent::Fail)?;
                let mut recommendations = session.recommendations();
                recommendations.push(format!(
                    "aborted after {} of {} actions failed",
                    session.failed, total
                ));
                return Ok(session.into_result(started, recommendations));
            }

            // Inter-action delay; Wait actions already slept in execution
            if offset + 1 < total && !matches!(action, Action::Wait { .. }) {
                let delay = action
                    .delay_after()
                    .unwrap_or(self.config.default_action_delay_secs);
                self.scaled_sleep(delay);
            }
        }

        if session.failed == 0 {
            self.transition(&mut state, PlaybackEvent::Finish)?;
        } else {
            self.transition(&mut state, PlaybackEvent::Fail)?;
        }
        let recommendations = session.recommendations();
        info!(
            successful = session.successful,
            failed = session.failed,
            total, "playback finished"
        );
        Ok(session.into_result(started, recommendations))
    }

    fn execute_action(
        &mut self,
        action: &Action,
        adaptation_ctx: &AdaptationContext,
        expected_app: &str,
    ) -> ActionResolution {
        let outcome = self.executor.execute(action);
        self.telemetry.record(TelemetryEvent::ActionExecuted {
            kind: action.kind_name().to_string(),
            success: outcome.is_success(),
            duration_ms: outcome.duration_ms,
            timestamp: Instant::now(),
        });
        self.miner.record(ActivityEvent::action(
            action.kind_name(),
            action.coordinates(),
            expected_app,
            action.target_text().map(|t| t.to_string()),
            outcome.is_success(),
        ));

        if outcome.is_success() {
            return ActionResolution::Succeeded { adapted: false };
        }

        let message = outcome
            .message
            .unwrap_or_else(|| "action failed".to_string());
        self.handle_failure(action, adaptation_ctx, expected_app, message)
    }

    /// Failure pipeline: silent bounded adaptation first, then recovery
    /// strategies up to `max_retries` rounds
    fn handle_failure(
        &mut self,
        action: &Action,
        adaptation_ctx: &AdaptationContext,
        expected_app: &str,
        message: String,
    ) -> ActionResolution {
        let mut adaptation_attempted = false;

        if action.is_interactive() {
            adaptation_attempted = true;
            let adaptation = self.adaptive.adapt_and_execute(
                action,
                adaptation_ctx,
                self.config.max_adaptation_attempts,
            );
            if adaptation.success {
                debug!(
                    kind = ?adaptation.kind,
                    attempts = adaptation.attempts,
                    "failure absorbed by adaptation"
                );
                return ActionResolution::Succeeded { adapted: true };
            }
        }

        let mut failure_kind = None;
        for round in 0..self.config.max_retries.max(1) {
            let info = FailureInfo::new(action.clone(), message.clone(), expected_app)
                .with_prior_failures(round + 1);
            let recovery = self.recovery.handle_failure(&info);
            failure_kind = Some(recovery.kind.name().to_string());

            if recovery.success {
                if recovery.strategy == Some(RecoveryStrategy::SkipAndContinue) {
                    // Skipped, not executed: recorded as a failure the
                    // sequence may proceed past
                    return ActionResolution::Failed {
                        message: format!("{} (skipped by recovery)", message),
                        failure_kind,
                        adaptation_attempted,
                        recovery_attempted: true,
                        abort: false,
                    };
                }
                return ActionResolution::Succeeded { adapted: false };
            }
            if !recovery.can_continue {
                return ActionResolution::Failed {
                    message,
                    failure_kind,
                    adaptation_attempted,
                    recovery_attempted: true,
                    abort: true,
                };
            }
        }

        ActionResolution::Failed {
            message,
            failure_kind,
            adaptation_attempted,
            recovery_attempted: true,
            abort: false,
        }
    }

    fn transition(&mut self, state: &mut PlaybackState, event: PlaybackEvent) -> Result<()> {
        let next = state.transition(event)?;
        self.telemetry.record(TelemetryEvent::StateTransition {
            from: state.display_name().to_string(),
            to: next.display_name().to_string(),
            timestamp: Instant::now(),
        });
        debug!(from = state.display_name(), to = next.display_name(), "state transition");
        *state = next;
        self.controller.set_state(next);
        // A finished session consumes its cancel/pause signals, leaving
        // the controller ready for the next play() call
        if next.is_terminal() {
            self.controller.clear_signals();
        }
        Ok(())
    }

    fn scaled_sleep(&self, seconds: f64) {
        let scaled = seconds.max(0.0) / self.config.effective_speed();
        if scaled > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(scaled));
        }
    }
}

/// How one action ended after the full failure pipeline
enum ActionResolution {
    Succeeded {
        adapted: bool,
    },
    Failed {
        message: String,
        failure_kind: Option<String>,
        adaptation_attempted: bool,
        recovery_attempted: bool,
        abort: bool,
    },
}

/// Running per-session tallies
struct SessionTally {
    total: usize,
    successful: usize,
    failed: usize,
    adapted: usize,
    details: Vec<FailedActionDetail>,
}

impl SessionTally {
    fn new(total: usize) -> Self {
        Self {
            total,
            successful: 0,
            failed: 0,
            adapted: 0,
            details: Vec::new(),
        }
    }

    fn recommendations(&self) -> Vec<String> {
        let mut recommendations = Vec::new();
        if self.total > 0 {
            let failure_rate = self.failed as f64 / self.total as f64;
            if failure_rate > 0.2 {
                recommendations.push(format!(
                    "failure rate {:.0}%: switch to SAFE mode for stricter verification and slower playback",
                    failure_rate * 100.0
                ));
            }
            if self.adapted as f64 / self.total as f64 > 0.5 {
                recommendations.push(
                    "more than half of the actions required adaptation: re-record the sequence against the current environment"
                        .to_string(),
                );
            }
        }
        recommendations
    }

    fn into_result(self, started: Instant, recommendations: Vec<String>) -> PlaybackResult {
        PlaybackResult {
            success: self.failed == 0 && self.successful == self.total,
            total_actions: self.total,
            successful_actions: self.successful,
            failed_actions: self.failed,
            execution_time_seconds: started.elapsed().as_secs_f64(),
            failed_action_details: self.details,
            recommendations,
        }
    }
}
