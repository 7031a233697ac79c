//! Graduated action adaptation
//!
//! Attempts escalate by tier: minimal coordinate compensation, element
//! retargeting around the original point, then aggressive substitution.
//! Every outcome feeds a bounded per-signature learning history that
//! biases the reported reliability toward recent behavior.

use crate::adaptive::types::{
    action_signature, AdaptationContext, AdaptationKind, AdaptationResult, AttemptRecord,
};
use crate::platform::{DetectedElement, ElementDetector, PlatformDriver};
use crate::playback::executor::ActionExecutor;
use crate::telemetry::{EngineTelemetry, TelemetryEvent};
use crate::types::{Action, Bounds, Point};
use chrono::Utc;
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Known text labels with keyboard-shortcut equivalents
const SEMANTIC_SHORTCUTS: &[(&str, &str)] = &[
    ("save", "ctrl+s"),
    ("copy", "ctrl+c"),
    ("paste", "ctrl+v"),
    ("cut", "ctrl+x"),
    ("undo", "ctrl+z"),
    ("find", "ctrl+f"),
    ("new", "ctrl+n"),
    ("open", "ctrl+o"),
    ("close", "ctrl+w"),
    ("print", "ctrl+p"),
];

/// Adaptive executor tuning
#[derive(Debug, Clone)]
pub struct AdaptiveConfig {
    /// Default attempt cap when the caller does not supply one
    pub max_attempts: usize,
    /// Element search radius around the original point, pixels
    pub search_radius: u32,
    /// Radius multiplier for the aggressive widened search
    pub widened_factor: u32,
    /// Maximum random jitter per axis, pixels
    pub jitter_px: i32,
    /// Window movement below this many pixels is treated as jitter
    pub window_shift_threshold: i32,
    /// Sleep between attempts, seconds; clamped to the last entry
    pub attempt_delays: Vec<f64>,
    /// Settle wait before the last-resort unchanged retry, milliseconds
    pub settle_wait_ms: u64,
    /// Learning samples kept per action signature
    pub history_cap: usize,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            search_radius: 50,
            widened_factor: 2,
            jitter_px: 3,
            window_shift_threshold: 5,
            attempt_delays: vec![0.5, 1.0, 2.0],
            settle_wait_ms: 500,
            history_cap: 20,
        }
    }
}

/// Retargets failing (or drifted) actions with an escalating strategy ladder
pub struct AdaptiveExecutor {
    config: AdaptiveConfig,
    driver: Arc<dyn PlatformDriver>,
    elements: Arc<dyn ElementDetector>,
    executor: ActionExecutor,
    history: HashMap<String, VecDeque<AttemptRecord>>,
    telemetry: Option<EngineTelemetry>,
}

impl AdaptiveExecutor {
    pub fn new(driver: Arc<dyn PlatformDriver>, elements: Arc<dyn ElementDetector>) -> Self {
        Self::with_config(driver, elements, AdaptiveConfig::default())
    }

    pub fn with_config(
        driver: Arc<dyn PlatformDriver>,
        elements: Arc<dyn ElementDetector>,
        config: AdaptiveConfig,
    ) -> Self {
        let executor = ActionExecutor::new(Arc::clone(&driver));
        Self {
            config,
            driver,
            elements,
            executor,
            history: HashMap::new(),
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: EngineTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Adapt `action` against observed drift and execute the copies until
    /// one succeeds or `max_attempts` is exhausted.
    ///
    /// The caller-supplied action is never mutated; every tier operates on
    /// a fresh copy.
    pub fn adapt_and_execute(
        &mut self,
        action: &Action,
        context: &AdaptationContext,
        max_attempts: usize,
    ) -> AdaptationResult {
        let max_attempts = if max_attempts == 0 {
            self.config.max_attempts
        } else {
            max_attempts
        };
        let signature = action_signature(action, &context.expected_app);

        let mut last_adapted = action.clone();
        let mut last_kind = None;

        for attempt in 1..=max_attempts {
            let (adapted, kind) = self.adapt_for_attempt(action, context, attempt);
            debug!(
                attempt,
                kind = kind.name(),
                original_kind = action.kind_name(),
                "adaptation attempt"
            );

            let outcome = self.executor.execute(&adapted);
            if let Some(telemetry) = &self.telemetry {
                telemetry.record(TelemetryEvent::AdaptationAttempt {
                    kind: kind.name().to_string(),
                    attempt,
                    success: outcome.is_success(),
                    timestamp: Instant::now(),
                });
            }

            if outcome.is_success() {
                self.record(&signature, kind, true);
                let precision = precision_score(action, &adapted, outcome.confidence);
                let reliability = self.reliability(&signature, kind);
                return AdaptationResult {
                    success: true,
                    adapted_action: adapted,
                    kind: Some(kind),
                    confidence: outcome.confidence.unwrap_or(0.5),
                    attempts: attempt,
                    precision,
                    reliability,
                };
            }

            self.record(&signature, kind, false);
            last_adapted = adapted;
            last_kind = Some(kind);

            if attempt < max_attempts {
                self.sleep_between_attempts(attempt);
            }
        }

        let reliability = last_kind
            .map(|kind| self.reliability(&signature, kind))
            .unwrap_or(0.0);
        AdaptationResult {
            success: false,
            adapted_action: last_adapted,
            kind: last_kind,
            confidence: 0.0,
            attempts: max_attempts,
            precision: 0.0,
            reliability,
        }
    }

    /// Learning samples recorded for a signature
    pub fn history_len(&self, action: &Action, app: &str) -> usize {
        self.history
            .get(&action_signature(action, app))
            .map_or(0, |h| h.len())
    }

    fn adapt_for_attempt(
        &self,
        action: &Action,
        context: &AdaptationContext,
        attempt: usize,
    ) -> (Action, AdaptationKind) {
        match attempt {
            1 => self.tier_minimal(action, context),
            2 => self.tier_moderate(action, context),
            _ => self.tier_aggressive(action, context),
        }
    }

    /// Tier 1: exact window-delta compensation, else bounded jitter
    fn tier_minimal(
        &self,
        action: &Action,
        context: &AdaptationContext,
    ) -> (Action, AdaptationKind) {
        let Some(point) = action.coordinates() else {
            return (action.clone(), AdaptationKind::PreActionWait);
        };

        if let Ok(window) = self.driver.active_window_info() {
            let dx = window.bounds.x - context.expected_bounds.x;
            let dy = window.bounds.y - context.expected_bounds.y;
            if dx.abs() > self.config.window_shift_threshold
                || dy.abs() > self.config.window_shift_threshold
            {
                return (
                    action.with_coordinates(point.offset(dx, dy)),
                    AdaptationKind::WindowShift,
                );
            }
        }

        let mut rng = rand::thread_rng();
        let jitter = self.config.jitter_px;
        let nudged = point.offset(
            rng.gen_range(-jitter..=jitter),
            rng.gen_range(-jitter..=jitter),
        );
        (
            action.with_coordinates(nudged),
            AdaptationKind::CoordinateNudge,
        )
    }

    /// Tier 2: retarget to the nearest detected element, else rescale by
    /// the window-width ratio
    fn tier_moderate(
        &self,
        action: &Action,
        context: &AdaptationContext,
    ) -> (Action, AdaptationKind) {
        let Some(point) = action.coordinates() else {
            return (action.clone(), AdaptationKind::PreActionWait);
        };

        let region = search_region(point, self.config.search_radius);
        if let Ok(elements) = self.elements.elements_in_region(region) {
            if let Some(nearest) = elements.iter().min_by(|a, b| {
                a.center()
                    .distance(&point)
                    .partial_cmp(&b.center().distance(&point))
                    .unwrap_or(std::cmp::Ordering::Equal)
            }) {
                return (
                    action.with_coordinates(nearest.center()),
                    AdaptationKind::ElementRetarget,
                );
            }
        }

        // No elements found: rescale against the expected window width
        if let Ok(window) = self.driver.active_window_info() {
            if context.expected_bounds.width > 0 && window.bounds.width > 0 {
                let factor = window.bounds.width as f64 / context.expected_bounds.width as f64;
                let rel_x = (point.x - context.expected_bounds.x) as f64;
                let rel_y = (point.y - context.expected_bounds.y) as f64;
                let scaled = Point::new(
                    window.bounds.x + (rel_x * factor).round() as i32,
                    window.bounds.y + (rel_y * factor).round() as i32,
                );
                return (action.with_coordinates(scaled), AdaptationKind::ScaleAdjust);
            }
        }

        (action.clone(), AdaptationKind::PreActionWait)
    }

    /// Tier 3+: semantic substitution, widened best-match search, or a
    /// pre-action wait
    fn tier_aggressive(
        &self,
        action: &Action,
        _context: &AdaptationContext,
    ) -> (Action, AdaptationKind) {
        if let Some(text) = action.target_text() {
            let label = text.to_lowercase();
            if let Some((_, shortcut)) = SEMANTIC_SHORTCUTS.iter().find(|(l, _)| *l == label) {
                return (
                    Action::key_press(shortcut),
                    AdaptationKind::SemanticSubstitute,
                );
            }
        }

        if let Some(point) = action.coordinates() {
            let radius = self.config.search_radius * self.config.widened_factor;
            if let Ok(elements) = self.elements.elements_in_region(search_region(point, radius)) {
                if let Some(best) = best_role_match(&elements, action) {
                    return (
                        action.with_coordinates(best.center()),
                        AdaptationKind::WidenedSearch,
                    );
                }
            }
        }

        // Last resort: give the UI time to settle, retry unchanged
        std::thread::sleep(Duration::from_millis(self.config.settle_wait_ms));
        (action.clone(), AdaptationKind::PreActionWait)
    }

    fn sleep_between_attempts(&self, attempt: usize) {
        let delays = &self.config.attempt_delays;
        if delays.is_empty() {
            return;
        }
        let index = (attempt - 1).min(delays.len() - 1);
        std::thread::sleep(Duration::from_secs_f64(delays[index].max(0.0)));
    }

    fn record(&mut self, signature: &str, kind: AdaptationKind, success: bool) {
        let entry = self.history.entry(signature.to_string()).or_default();
        entry.push_back(AttemptRecord {
            kind,
            success,
            recorded_at: Utc::now(),
        });
        while entry.len() > self.config.history_cap {
            entry.pop_front();
        }
    }

    /// Static prior blended 1:2 with the learned success ratio once three
    /// samples exist for the signature
    fn reliability(&self, signature: &str, kind: AdaptationKind) -> f64 {
        let prior = kind.reliability_prior();
        let Some(records) = self.history.get(signature) else {
            return prior;
        };
        if records.len() < 3 {
            return prior;
        }
        let successes = records.iter().filter(|r| r.success).count();
        let ratio = successes as f64 / records.len() as f64;
        (prior + 2.0 * ratio) / 3.0
    }
}

fn search_region(center: Point, radius: u32) -> Bounds {
    let r = radius as i32;
    Bounds::new(center.x - r, center.y - r, radius * 2, radius * 2)
}

/// Best-matching element by role for the action kind, highest confidence
fn best_role_match<'a>(
    elements: &'a [DetectedElement],
    action: &Action,
) -> Option<&'a DetectedElement> {
    let wanted_role = match action {
        Action::Click { .. } | Action::DoubleClick { .. } | Action::RightClick { .. } => "button",
        Action::TypeText { .. } => "text_field",
        _ => return elements.first(),
    };

    elements
        .iter()
        .filter(|e| e.role == wanted_role)
        .max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .or_else(|| elements.first())
}

/// Rewards small coordinate deltas and confident execution
fn precision_score(original: &Action, adapted: &Action, confidence: Option<f64>) -> f64 {
    let delta = match (original.coordinates(), adapted.coordinates()) {
        (Some(a), Some(b)) => a.distance(&b),
        _ => 0.0,
    };
    let positional = (1.0 - (delta / 200.0).min(1.0)).max(0.0);
    let confidence = confidence.unwrap_or(0.5);
    (0.7 * positional + 0.3 * confidence).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Result;
    use crate::platform::{
        DriverResponse, KeyboardInput, MouseGesture, Screenshot, WindowInfo,
    };
    use std::sync::Mutex;

    /// Driver with a movable window; mouse clicks succeed only inside a
    /// designated hot zone
    struct DriftDriver {
        window: Bounds,
        accept: Box<dyn Fn(Point) -> bool + Send + Sync>,
        clicks: Mutex<Vec<Point>>,
        key_combos: Mutex<Vec<String>>,
    }

    impl DriftDriver {
        fn new(window: Bounds, accept: impl Fn(Point) -> bool + Send + Sync + 'static) -> Self {
            Self {
                window,
                accept: Box::new(accept),
                clicks: Mutex::new(Vec::new()),
                key_combos: Mutex::new(Vec::new()),
            }
        }
    }

    impl PlatformDriver for DriftDriver {
        fn execute_mouse_action(&self, _: MouseGesture, at: Point) -> Result<DriverResponse> {
            self.clicks.lock().unwrap().push(at);
            if (self.accept)(at) {
                Ok(DriverResponse::ok_with_confidence(0.9))
            } else {
                Ok(DriverResponse::failed("element not found at coordinates"))
            }
        }

        fn execute_keyboard_action(&self, input: &KeyboardInput) -> Result<DriverResponse> {
            if let KeyboardInput::Combo(combo) = input {
                self.key_combos.lock().unwrap().push(combo.clone());
            }
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
            Ok(WindowInfo {
                title: "app".to_string(),
                app_name: "App".to_string(),
                process_name: "app".to_string(),
                bounds: self.window,
            })
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

    struct FixedElements(Vec<DetectedElement>);

    impl ElementDetector for FixedElements {
        fn find_element_by_text(&self, _: &str, _: bool) -> Result<Option<DetectedElement>> {
            Ok(self.0.first().cloned())
        }

        fn elements_in_region(&self, region: Bounds) -> Result<Vec<DetectedElement>> {
            Ok(self
                .0
                .iter()
                .filter(|e| region.contains(e.center()))
                .cloned()
                .collect())
        }
    }

    fn fast_config() -> AdaptiveConfig {
        AdaptiveConfig {
            attempt_delays: vec![0.0],
            settle_wait_ms: 0,
            ..AdaptiveConfig::default()
        }
    }

    fn context_at(bounds: Bounds) -> AdaptationContext {
        AdaptationContext::new(bounds, "App")
    }

    #[test]
    fn test_window_move_compensated_exactly_on_first_attempt() {
        // Recorded at window origin (100, 100); window now at (130, 90)
        let recorded = Bounds::new(100, 100, 800, 600);
        let driver = Arc::new(DriftDriver::new(
            Bounds::new(130, 90, 800, 600),
            |p| p == Point::new(230, 190),
        ));
        let mut adaptive = AdaptiveExecutor::with_config(
            Arc::clone(&driver) as Arc<dyn PlatformDriver>,
            Arc::new(NoElements),
            fast_config(),
        );

        let original = Action::click(Point::new(200, 200));
        let result = adaptive.adapt_and_execute(&original, &context_at(recorded), 3);

        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.kind, Some(AdaptationKind::WindowShift));
        // Delta (+30, -10) applied exactly
        assert_eq!(
            result.adapted_action.coordinates(),
            Some(Point::new(230, 190))
        );
        // Original untouched
        assert_eq!(original.coordinates(), Some(Point::new(200, 200)));
    }

    #[test]
    fn test_jitter_bounded_when_window_unmoved() {
        let bounds = Bounds::new(0, 0, 800, 600);
        let driver = Arc::new(DriftDriver::new(bounds, |_| true));
        let mut adaptive = AdaptiveExecutor::with_config(
            Arc::clone(&driver) as Arc<dyn PlatformDriver>,
            Arc::new(NoElements),
            fast_config(),
        );

        let original = Action::click(Point::new(400, 300));
        let result = adaptive.adapt_and_execute(&original, &context_at(bounds), 1);

        assert!(result.success);
        assert_eq!(result.kind, Some(AdaptationKind::CoordinateNudge));
        let adapted = result.adapted_action.coordinates().unwrap();
        assert!((adapted.x - 400).abs() <= 3);
        assert!((adapted.y - 300).abs() <= 3);
    }

    #[test]
    fn test_second_attempt_retargets_to_nearest_element() {
        let bounds = Bounds::new(0, 0, 800, 600);
        // Fail everywhere except the element center at (420, 310)
        let driver = Arc::new(DriftDriver::new(bounds, |p| p == Point::new(420, 310)));
        let elements = FixedElements(vec![DetectedElement {
            bounds: Bounds::new(410, 300, 20, 20),
            text: Some("OK".to_string()),
            role: "button".to_string(),
            confidence: 0.9,
        }]);
        let mut adaptive = AdaptiveExecutor::with_config(
            Arc::clone(&driver) as Arc<dyn PlatformDriver>,
            Arc::new(elements),
            fast_config(),
        );

        let result = adaptive.adapt_and_execute(
            &Action::click(Point::new(400, 300)),
            &context_at(bounds),
            3,
        );

        assert!(result.success);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.kind, Some(AdaptationKind::ElementRetarget));
        assert_eq!(
            result.adapted_action.coordinates(),
            Some(Point::new(420, 310))
        );
    }

    #[test]
    fn test_scale_adjust_when_no_elements_found() {
        // Window doubled in width, no detectable elements
        let recorded = Bounds::new(0, 0, 400, 300);
        let driver = Arc::new(DriftDriver::new(
            Bounds::new(0, 0, 800, 300),
            |p| p.x == 400,
        ));
        let mut adaptive = AdaptiveExecutor::with_config(
            Arc::clone(&driver) as Arc<dyn PlatformDriver>,
            Arc::new(NoElements),
            fast_config(),
        );

        let result = adaptive.adapt_and_execute(
            &Action::click(Point::new(200, 100)),
            &context_at(recorded),
            2,
        );

        assert!(result.success);
        assert_eq!(result.kind, Some(AdaptationKind::ScaleAdjust));
        assert_eq!(result.adapted_action.coordinates().unwrap().x, 400);
    }

    #[test]
    fn test_semantic_substitution_on_third_attempt() {
        let bounds = Bounds::new(0, 0, 800, 600);
        // Mouse never succeeds; only the keyboard path can
        let driver = Arc::new(DriftDriver::new(bounds, |_| false));
        let mut adaptive = AdaptiveExecutor::with_config(
            Arc::clone(&driver) as Arc<dyn PlatformDriver>,
            Arc::new(NoElements),
            fast_config(),
        );

        let mut action = Action::click_text("Save");
        // Give it coordinates so earlier tiers run and fail
        action = action.with_coordinates(Point::new(100, 100));

        let result = adaptive.adapt_and_execute(&action, &context_at(bounds), 3);

        assert!(result.success);
        assert_eq!(result.kind, Some(AdaptationKind::SemanticSubstitute));
        assert_eq!(driver.key_combos.lock().unwrap()[0], "ctrl+s");
    }

    #[test]
    fn test_exhaustion_reports_failure() {
        let bounds = Bounds::new(0, 0, 800, 600);
        let driver = Arc::new(DriftDriver::new(bounds, |_| false));
        let mut adaptive = AdaptiveExecutor::with_config(
            Arc::clone(&driver) as Arc<dyn PlatformDriver>,
            Arc::new(NoElements),
            fast_config(),
        );

        let result = adaptive.adapt_and_execute(
            &Action::click(Point::new(10, 10)),
            &context_at(bounds),
            3,
        );

        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.precision, 0.0);
    }

    #[test]
    fn test_learning_history_capped() {
        let bounds = Bounds::new(0, 0, 800, 600);
        let driver = Arc::new(DriftDriver::new(bounds, |_| false));
        let mut adaptive = AdaptiveExecutor::with_config(
            Arc::clone(&driver) as Arc<dyn PlatformDriver>,
            Arc::new(NoElements),
            AdaptiveConfig {
                attempt_delays: vec![0.0],
                settle_wait_ms: 0,
                history_cap: 5,
                ..AdaptiveConfig::default()
            },
        );

        let action = Action::click(Point::new(10, 10));
        for _ in 0..4 {
            adaptive.adapt_and_execute(&action, &context_at(bounds), 3);
        }

        assert!(adaptive.history_len(&action, "App") <= 5);
    }

    #[test]
    fn test_reliability_blends_learned_ratio() {
        let bounds = Bounds::new(0, 0, 800, 600);
        let driver = Arc::new(DriftDriver::new(bounds, |_| true));
        let mut adaptive = AdaptiveExecutor::with_config(
            Arc::clone(&driver) as Arc<dyn PlatformDriver>,
            Arc::new(NoElements),
            fast_config(),
        );

        let action = Action::click(Point::new(10, 10));
        let context = context_at(bounds);

        // First call: fewer than 3 samples, static prior reported
        let first = adaptive.adapt_and_execute(&action, &context, 1);
        assert_eq!(
            first.reliability,
            AdaptationKind::CoordinateNudge.reliability_prior()
        );

        adaptive.adapt_and_execute(&action, &context, 1);
        let third = adaptive.adapt_and_execute(&action, &context, 1);

        // All successes: (prior + 2 * 1.0) / 3
        let expected =
            (AdaptationKind::CoordinateNudge.reliability_prior() + 2.0) / 3.0;
        assert!((third.reliability - expected).abs() < 1e-9);
    }
}
