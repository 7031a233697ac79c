//! Failure classification and strategy-driven recovery
//!
//! Free-text failure messages are classified into a [`FailureKind`], then
//! candidate strategies come from a static per-kind table, reordered by the
//! learned success ratio, escalated toward an application restart after
//! repeated failures, and filtered of aggressive options unless enabled.
//! The first resolving strategy short-circuits; every attempt feeds the
//! bounded learning lists.

use crate::context::ContextDetector;
use crate::platform::{ElementDetector, KeyboardInput, PlatformDriver};
use crate::playback::executor::ActionExecutor;
use crate::recovery::types::{
    FailureInfo, FailureKind, RecoveryRecord, RecoveryResult, RecoveryStrategy, StrategyAttempt,
};
use crate::telemetry::{EngineTelemetry, TelemetryEvent};
use crate::types::Point;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Recovery engine tuning
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Strategies tried per failure before giving up
    pub max_strategies: usize,
    /// Allow application-restart and user-intervention strategies
    pub aggressive: bool,
    /// Prior-failure count that escalates toward ApplicationRestart
    pub escalation_threshold: usize,
    /// Upper bound for the growing retry delay, seconds
    pub retry_delay_cap_secs: f64,
    /// Multiplier applied to every recovery sleep; zero disables waiting
    pub delay_scale: f64,
    /// Re-detected context confidence needed to continue the sequence
    pub min_continue_confidence: f64,
    /// Learning samples kept per failure kind
    pub success_history_cap: usize,
    pub failure_history_cap: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_strategies: 3,
            aggressive: false,
            escalation_threshold: 2,
            retry_delay_cap_secs: 10.0,
            delay_scale: 1.0,
            min_continue_confidence: 0.5,
            success_history_cap: 20,
            failure_history_cap: 25,
        }
    }
}

/// Static strategy candidates per failure kind, in conservative-mode order
fn static_strategies(kind: FailureKind) -> &'static [RecoveryStrategy] {
    use RecoveryStrategy::*;
    match kind {
        FailureKind::Timeout => &[RetryWithDelay, ContextRestoration, SkipAndContinue],
        FailureKind::PermissionDenied => &[UserIntervention, SkipAndContinue],
        FailureKind::NetworkError => &[WaitAndRetry, RetryWithDelay, SkipAndContinue],
        FailureKind::ElementNotFound => &[AlternativeMethod, CoordinateAdjustment, WaitAndRetry],
        FailureKind::ContextMismatch => &[ContextRestoration, RetryWithDelay, AlternativeMethod],
        FailureKind::WindowNotFound => &[ContextRestoration, ApplicationRestart, UserIntervention],
        FailureKind::CoordinateOutOfBounds => {
            &[CoordinateAdjustment, AlternativeMethod, SkipAndContinue]
        }
        FailureKind::ApplicationNotResponding => {
            &[WaitAndRetry, ApplicationRestart, UserIntervention]
        }
        FailureKind::InputRejected => &[RetryWithDelay, AlternativeMethod, SkipAndContinue],
        FailureKind::Unknown => &[RetryWithDelay, WaitAndRetry, SkipAndContinue],
    }
}

/// Classifies failures and works through remedial strategies, learning
/// which ones pay off per failure kind
pub struct RecoveryEngine {
    config: RecoveryConfig,
    driver: Arc<dyn PlatformDriver>,
    elements: Arc<dyn ElementDetector>,
    executor: ActionExecutor,
    detector: ContextDetector,
    successes: HashMap<FailureKind, VecDeque<RecoveryRecord>>,
    failures: HashMap<FailureKind, VecDeque<RecoveryRecord>>,
    telemetry: Option<EngineTelemetry>,
}

impl RecoveryEngine {
    pub fn new(driver: Arc<dyn PlatformDriver>, elements: Arc<dyn ElementDetector>) -> Self {
        Self::with_config(driver, elements, RecoveryConfig::default())
    }

    pub fn with_config(
        driver: Arc<dyn PlatformDriver>,
        elements: Arc<dyn ElementDetector>,
        config: RecoveryConfig,
    ) -> Self {
        let executor = ActionExecutor::new(Arc::clone(&driver));
        let detector = ContextDetector::new(Arc::clone(&driver));
        Self {
            config,
            driver,
            elements,
            executor,
            detector,
            successes: HashMap::new(),
            failures: HashMap::new(),
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: EngineTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Classify the failure and try candidate strategies in order until
    /// one resolves it or the configured cap is reached
    pub fn handle_failure(&mut self, info: &FailureInfo) -> RecoveryResult {
        let kind = info.kind();
        let candidates = self.strategy_order(kind, info.prior_failures);
        debug!(
            kind = kind.name(),
            candidates = candidates.len(),
            prior_failures = info.prior_failures,
            "recovering from failure"
        );

        let mut attempts = Vec::new();
        let mut resolved: Option<RecoveryStrategy> = None;

        for strategy in candidates.iter().take(self.config.max_strategies) {
            let start = Instant::now();
            let (success, note) = self.apply(*strategy, info);
            let duration_ms = start.elapsed().as_millis() as u64;
            let overran_timeout =
                start.elapsed().as_secs_f64() > strategy.advisory_timeout_secs();
            if overran_timeout {
                warn!(strategy = strategy.name(), duration_ms, "strategy overran advisory timeout");
            }

            self.record(kind, *strategy, success);
            if let Some(telemetry) = &self.telemetry {
                telemetry.record(TelemetryEvent::RecoveryAttempt {
                    strategy: strategy.name().to_string(),
                    success,
                    timestamp: Instant::now(),
                });
            }

            attempts.push(StrategyAttempt {
                strategy: *strategy,
                success,
                duration_ms,
                overran_timeout,
                note,
            });

            if success {
                resolved = Some(*strategy);
                break;
            }
        }

        let deciding = resolved.or_else(|| attempts.last().map(|a| a.strategy));
        let can_continue = match deciding {
            Some(RecoveryStrategy::SkipAndContinue) | Some(RecoveryStrategy::UserIntervention) => {
                true
            }
            _ => self.context_still_usable(),
        };

        RecoveryResult {
            success: resolved.is_some(),
            kind,
            strategy: resolved,
            attempts,
            can_continue,
            reliability: deciding.map_or(0.0, |s| self.reliability(kind, s)),
            robustness: deciding.map_or(0.0, |s| s.robustness_prior()),
        }
    }

    /// Candidate strategies for a kind: static table order, reordered by
    /// learned success ratio, escalated and filtered per config
    pub fn strategy_order(
        &self,
        kind: FailureKind,
        prior_failures: usize,
    ) -> Vec<RecoveryStrategy> {
        let mut candidates: Vec<RecoveryStrategy> = static_strategies(kind).to_vec();

        // Stable sort: equal ratios (0.5 neutral with no data) keep the
        // static table order
        candidates.sort_by(|a, b| {
            self.success_ratio(kind, *b)
                .partial_cmp(&self.success_ratio(kind, *a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if prior_failures > self.config.escalation_threshold {
            candidates.retain(|s| *s != RecoveryStrategy::ApplicationRestart);
            candidates.insert(0, RecoveryStrategy::ApplicationRestart);
        }

        if !self.config.aggressive {
            candidates.retain(|s| !s.is_aggressive());
        }
        candidates
    }

    /// Learned success ratio for a (kind, strategy) pair; neutral 0.5
    /// below three samples
    pub fn success_ratio(&self, kind: FailureKind, strategy: RecoveryStrategy) -> f64 {
        let wins = self.count(&self.successes, kind, strategy);
        let losses = self.count(&self.failures, kind, strategy);
        let total = wins + losses;
        if total < 3 {
            return 0.5;
        }
        wins as f64 / total as f64
    }

    /// Static prior blended 1:2 with the learned ratio once three samples
    /// exist
    fn reliability(&self, kind: FailureKind, strategy: RecoveryStrategy) -> f64 {
        let prior = strategy.reliability_prior();
        let wins = self.count(&self.successes, kind, strategy);
        let losses = self.count(&self.failures, kind, strategy);
        let total = wins + losses;
        if total < 3 {
            return prior;
        }
        (prior + 2.0 * (wins as f64 / total as f64)) / 3.0
    }

    fn count(
        &self,
        table: &HashMap<FailureKind, VecDeque<RecoveryRecord>>,
        kind: FailureKind,
        strategy: RecoveryStrategy,
    ) -> usize {
        table
            .get(&kind)
            .map_or(0, |records| records.iter().filter(|r| r.strategy == strategy).count())
    }

    fn record(&mut self, kind: FailureKind, strategy: RecoveryStrategy, success: bool) {
        let (table, cap) = if success {
            (&mut self.successes, self.config.success_history_cap)
        } else {
            (&mut self.failures, self.config.failure_history_cap)
        };
        let records = table.entry(kind).or_default();
        records.push_back(RecoveryRecord {
            strategy,
            recorded_at: Utc::now(),
        });
        while records.len() > cap {
            records.pop_front();
        }
    }

    fn apply(&mut self, strategy: RecoveryStrategy, info: &FailureInfo) -> (bool, Option<String>) {
        match strategy {
            RecoveryStrategy::RetryWithDelay => {
                let delay = (2.0 * (info.prior_failures as f64 + 1.0))
                    .min(self.config.retry_delay_cap_secs);
                self.sleep(delay);
                let outcome = self.executor.execute(&info.action);
                (outcome.is_success(), outcome.message)
            }
            RecoveryStrategy::WaitAndRetry => {
                self.sleep(2.0);
                let outcome = self.executor.execute(&info.action);
                (outcome.is_success(), outcome.message)
            }
            RecoveryStrategy::ContextRestoration => self.restore_context(info),
            RecoveryStrategy::CoordinateAdjustment => self.adjust_coordinates(info),
            RecoveryStrategy::AlternativeMethod => self.alternative_method(info),
            RecoveryStrategy::ApplicationRestart => (
                // No relaunch surface on the platform traits; surfaced to
                // the embedding application instead
                false,
                Some(format!("restart of {} required", info.expected_app)),
            ),
            RecoveryStrategy::SkipAndContinue => {
                (true, Some("action skipped".to_string()))
            }
            RecoveryStrategy::UserIntervention => {
                (false, Some("operator attention required".to_string()))
            }
        }
    }

    /// Bring the expected application back to the foreground, then retry
    fn restore_context(&mut self, info: &FailureInfo) -> (bool, Option<String>) {
        let expected = info.expected_app.to_lowercase();
        let focused = |ctx: &crate::context::ApplicationContext| {
            ctx.app_name.to_lowercase().contains(&expected)
        };

        match self.detector.detect() {
            Ok(context) if focused(&context) => {}
            Ok(_) | Err(_) => {
                // Cycle windows once and re-check
                let _ = self
                    .driver
                    .execute_keyboard_action(&KeyboardInput::Combo("alt+tab".to_string()));
                self.sleep(0.5);
                match self.detector.detect() {
                    Ok(context) if focused(&context) => {}
                    _ => {
                        return (
                            false,
                            Some(format!("could not refocus {}", info.expected_app)),
                        )
                    }
                }
            }
        }

        let outcome = self.executor.execute(&info.action);
        (outcome.is_success(), outcome.message)
    }

    /// Clamp the action's coordinates into the active window and retry
    fn adjust_coordinates(&mut self, info: &FailureInfo) -> (bool, Option<String>) {
        let Some(point) = info.action.coordinates() else {
            return (false, Some("action has no coordinates to adjust".to_string()));
        };
        let Ok(window) = self.driver.active_window_info() else {
            return (false, Some("no active window".to_string()));
        };

        let bounds = window.bounds;
        let margin = 2;
        // A window narrower than the margins leaves no interior to clamp into
        if (bounds.width as i32) <= 2 * margin || (bounds.height as i32) <= 2 * margin {
            return (
                false,
                Some(format!(
                    "window {}x{} too small for coordinate adjustment",
                    bounds.width, bounds.height
                )),
            );
        }
        let clamped = Point::new(
            point
                .x
                .clamp(bounds.x + margin, bounds.x + bounds.width as i32 - margin - 1),
            point
                .y
                .clamp(bounds.y + margin, bounds.y + bounds.height as i32 - margin - 1),
        );
        if clamped == point {
            return (false, Some("coordinates already within window".to_string()));
        }

        let outcome = self.executor.execute(&info.action.with_coordinates(clamped));
        (outcome.is_success(), outcome.message)
    }

    /// Re-find the target by its text label and click its center
    fn alternative_method(&mut self, info: &FailureInfo) -> (bool, Option<String>) {
        let Some(text) = info.action.target_text() else {
            return (false, Some("no semantic target to re-resolve".to_string()));
        };

        match self.elements.find_element_by_text(text, true) {
            Ok(Some(element)) => {
                let retargeted = info.action.with_coordinates(element.center());
                let outcome = self.executor.execute(&retargeted);
                (outcome.is_success(), outcome.message)
            }
            Ok(None) => (false, Some(format!("element '{}' not found", text))),
            Err(err) => (false, Some(err.to_string())),
        }
    }

    fn context_still_usable(&mut self) -> bool {
        match self.detector.detect() {
            Ok(context) => context.confidence >= self.config.min_continue_confidence,
            Err(_) => false,
        }
    }

    fn sleep(&self, seconds: f64) {
        let scaled = seconds * self.config.delay_scale;
        if scaled > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(scaled));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Result;
    use crate::platform::{
        DetectedElement, DriverResponse, MouseGesture, Screenshot, WindowInfo,
    };
    use crate::types::{Action, Bounds};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Driver whose mouse actions fail a fixed number of times before
    /// succeeding
    struct FlakyDriver {
        failures_left: AtomicUsize,
        fail_message: String,
        window: WindowInfo,
        mouse_calls: Mutex<Vec<Point>>,
    }

    impl FlakyDriver {
        fn new(failures: usize, message: &str) -> Self {
            Self {
                failures_left: AtomicUsize::new(failures),
                fail_message: message.to_string(),
                window: WindowInfo {
                    title: "Document - Writer".to_string(),
                    app_name: "Writer".to_string(),
                    process_name: "writer".to_string(),
                    bounds: Bounds::new(0, 0, 1024, 768),
                },
                mouse_calls: Mutex::new(Vec::new()),
            }
        }

        fn with_bounds(mut self, bounds: Bounds) -> Self {
            self.window.bounds = bounds;
            self
        }
    }

    impl PlatformDriver for FlakyDriver {
        fn execute_mouse_action(&self, _: MouseGesture, at: Point) -> Result<DriverResponse> {
            self.mouse_calls.lock().unwrap().push(at);
            let remaining = self.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
                Ok(DriverResponse::failed(self.fail_message.clone()))
            } else {
                Ok(DriverResponse::ok_with_confidence(0.9))
            }
        }

        fn execute_keyboard_action(&self, _: &KeyboardInput) -> Result<DriverResponse> {
            Ok(DriverResponse::ok())
        }

        fn take_screenshot(&self) -> Result<Screenshot> {
            Ok(Screenshot {
                width: 0,
                height: 0,
                data: Vec::new(),
            })
        }

        fn active_window_info(&self) -> Result<WindowInfo> {
            Ok(self.window.clone())
        }
    }

    struct NoElements;

    impl ElementDetector for NoElements {
        fn find_element_by_text(&self, _: &str, _: bool) -> Result<Option<DetectedElement>> {
            Ok(None)
        }

        fn elements_in_region(&self, _: Bounds) -> Result<Vec<DetectedElement>> {
            Ok(Vec::new())
        }
    }

    fn fast_config() -> RecoveryConfig {
        RecoveryConfig {
            delay_scale: 0.0,
            ..RecoveryConfig::default()
        }
    }

    fn engine_with(driver: FlakyDriver) -> RecoveryEngine {
        RecoveryEngine::with_config(Arc::new(driver), Arc::new(NoElements), fast_config())
    }

    #[test]
    fn test_static_order_without_history() {
        let engine = engine_with(FlakyDriver::new(0, ""));

        assert_eq!(
            engine.strategy_order(FailureKind::Timeout, 0),
            vec![
                RecoveryStrategy::RetryWithDelay,
                RecoveryStrategy::ContextRestoration,
                RecoveryStrategy::SkipAndContinue,
            ]
        );
        assert_eq!(
            engine.strategy_order(FailureKind::ContextMismatch, 0),
            vec![
                RecoveryStrategy::ContextRestoration,
                RecoveryStrategy::RetryWithDelay,
                RecoveryStrategy::AlternativeMethod,
            ]
        );
    }

    #[test]
    fn test_learned_successes_promote_strategy() {
        let mut engine = engine_with(FlakyDriver::new(0, ""));

        for _ in 0..3 {
            engine.record(FailureKind::Timeout, RecoveryStrategy::ContextRestoration, true);
        }

        let order = engine.strategy_order(FailureKind::Timeout, 0);
        assert_eq!(order[0], RecoveryStrategy::ContextRestoration);
    }

    #[test]
    fn test_aggressive_filtered_in_conservative_mode() {
        let engine = engine_with(FlakyDriver::new(0, ""));

        let order = engine.strategy_order(FailureKind::WindowNotFound, 0);
        assert!(!order.contains(&RecoveryStrategy::ApplicationRestart));
        assert!(!order.contains(&RecoveryStrategy::UserIntervention));
    }

    #[test]
    fn test_escalation_after_repeated_failures() {
        let engine = RecoveryEngine::with_config(
            Arc::new(FlakyDriver::new(0, "")),
            Arc::new(NoElements),
            RecoveryConfig {
                aggressive: true,
                delay_scale: 0.0,
                ..RecoveryConfig::default()
            },
        );

        let order = engine.strategy_order(FailureKind::Timeout, 3);
        assert_eq!(order[0], RecoveryStrategy::ApplicationRestart);
    }

    #[test]
    fn test_timeout_recovered_by_retry() {
        // First retry succeeds: RetryWithDelay resolves a transient timeout
        let mut engine = engine_with(FlakyDriver::new(0, ""));
        let info = FailureInfo::new(
            Action::click(Point::new(100, 100)),
            "operation timed out",
            "Writer",
        );

        let result = engine.handle_failure(&info);

        assert!(result.success);
        assert_eq!(result.kind, FailureKind::Timeout);
        assert_eq!(result.strategy, Some(RecoveryStrategy::RetryWithDelay));
        assert_eq!(result.attempts.len(), 1);
    }

    #[test]
    fn test_persistent_failure_falls_through_to_skip() {
        // Driver fails forever; the timeout ladder ends in SkipAndContinue,
        // which always resolves and allows the sequence to proceed
        let mut engine = engine_with(FlakyDriver::new(usize::MAX, "timed out again"));
        let info = FailureInfo::new(
            Action::click(Point::new(100, 100)),
            "operation timed out",
            "Writer",
        );

        let result = engine.handle_failure(&info);

        assert!(result.success);
        assert_eq!(result.strategy, Some(RecoveryStrategy::SkipAndContinue));
        assert!(result.can_continue);
        assert_eq!(result.attempts.len(), 3);
    }

    #[test]
    fn test_coordinate_adjustment_clamps_into_window() {
        let mut engine = engine_with(FlakyDriver::new(0, ""));
        let info = FailureInfo::new(
            Action::click(Point::new(5000, 5000)),
            "click landed out of bounds",
            "Writer",
        );

        let result = engine.handle_failure(&info);

        assert!(result.success);
        assert_eq!(result.strategy, Some(RecoveryStrategy::CoordinateAdjustment));
        let attempt = &result.attempts[0];
        assert!(attempt.success, "adjustment attempt: {:?}", attempt.note);
    }

    #[test]
    fn test_tiny_window_fails_adjustment_without_panicking() {
        // A 4x4 splash window leaves no interior inside the clamp margin;
        // adjustment must report failure and let the ladder move on
        let mut engine = engine_with(
            FlakyDriver::new(usize::MAX, "still out of bounds")
                .with_bounds(Bounds::new(100, 100, 4, 4)),
        );
        let info = FailureInfo::new(
            Action::click(Point::new(5000, 5000)),
            "click landed out of bounds",
            "Writer",
        );

        let result = engine.handle_failure(&info);

        let adjustment = &result.attempts[0];
        assert_eq!(adjustment.strategy, RecoveryStrategy::CoordinateAdjustment);
        assert!(!adjustment.success);
        assert!(adjustment.note.as_deref().unwrap_or("").contains("too small"));
        // The out-of-bounds ladder still ends in skip-and-continue
        assert_eq!(result.strategy, Some(RecoveryStrategy::SkipAndContinue));
    }

    #[test]
    fn test_learning_lists_capped() {
        let mut engine = RecoveryEngine::with_config(
            Arc::new(FlakyDriver::new(0, "")),
            Arc::new(NoElements),
            RecoveryConfig {
                success_history_cap: 5,
                failure_history_cap: 7,
                delay_scale: 0.0,
                ..RecoveryConfig::default()
            },
        );

        for _ in 0..20 {
            engine.record(FailureKind::Unknown, RecoveryStrategy::RetryWithDelay, true);
            engine.record(FailureKind::Unknown, RecoveryStrategy::RetryWithDelay, false);
        }

        assert_eq!(engine.successes[&FailureKind::Unknown].len(), 5);
        assert_eq!(engine.failures[&FailureKind::Unknown].len(), 7);
    }

    #[test]
    fn test_reliability_blends_learned_ratio() {
        let mut engine = engine_with(FlakyDriver::new(0, ""));
        let kind = FailureKind::Timeout;
        let strategy = RecoveryStrategy::RetryWithDelay;

        // Below three samples the static prior is reported
        assert_eq!(engine.reliability(kind, strategy), strategy.reliability_prior());

        engine.record(kind, strategy, true);
        engine.record(kind, strategy, true);
        engine.record(kind, strategy, false);

        let expected = (strategy.reliability_prior() + 2.0 * (2.0 / 3.0)) / 3.0;
        assert!((engine.reliability(kind, strategy) - expected).abs() < 1e-9);
    }
}
