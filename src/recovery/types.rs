//! Recovery engine type definitions

use crate::types::Action;
use chrono::{DateTime, Utc};

/// Classified category of a failed action execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Timeout,
    PermissionDenied,
    NetworkError,
    ElementNotFound,
    ContextMismatch,
    WindowNotFound,
    CoordinateOutOfBounds,
    ApplicationNotResponding,
    InputRejected,
    Unknown,
}

impl FailureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::PermissionDenied => "permission_denied",
            FailureKind::NetworkError => "network_error",
            FailureKind::ElementNotFound => "element_not_found",
            FailureKind::ContextMismatch => "context_mismatch",
            FailureKind::WindowNotFound => "window_not_found",
            FailureKind::CoordinateOutOfBounds => "coordinate_out_of_bounds",
            FailureKind::ApplicationNotResponding => "application_not_responding",
            FailureKind::InputRejected => "input_rejected",
            FailureKind::Unknown => "unknown",
        }
    }
}

/// Ordered substring rules mapping free-text error content to a kind.
///
/// Order matters: "window not found" must hit the window rule before the
/// generic not-found rule, so more specific rules come first.
pub fn classify_failure(message: &str) -> FailureKind {
    let lower = message.to_lowercase();

    const RULES: &[(&[&str], FailureKind)] = &[
        (&["timed out", "timeout"], FailureKind::Timeout),
        (
            &["permission", "access denied", "not authorized"],
            FailureKind::PermissionDenied,
        ),
        (
            &["network", "connection", "unreachable"],
            FailureKind::NetworkError,
        ),
        (
            &["not responding", "hung", "frozen"],
            FailureKind::ApplicationNotResponding,
        ),
        (
            &["window not found", "no active window", "window closed"],
            FailureKind::WindowNotFound,
        ),
        (
            &["wrong application", "context mismatch", "context lost", "unexpected application"],
            FailureKind::ContextMismatch,
        ),
        (
            &["out of bounds", "off screen", "outside screen"],
            FailureKind::CoordinateOutOfBounds,
        ),
        (
            &["element not found", "no element", "not found", "occluded"],
            FailureKind::ElementNotFound,
        ),
        (
            &["rejected", "input blocked", "refused"],
            FailureKind::InputRejected,
        ),
    ];

    for (needles, kind) in RULES {
        if needles.iter().any(|n| lower.contains(n)) {
            return *kind;
        }
    }
    FailureKind::Unknown
}

/// A named remedial action tried after a classified failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryStrategy {
    RetryWithDelay,
    ContextRestoration,
    CoordinateAdjustment,
    AlternativeMethod,
    WaitAndRetry,
    ApplicationRestart,
    SkipAndContinue,
    UserIntervention,
}

impl RecoveryStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            RecoveryStrategy::RetryWithDelay => "retry_with_delay",
            RecoveryStrategy::ContextRestoration => "context_restoration",
            RecoveryStrategy::CoordinateAdjustment => "coordinate_adjustment",
            RecoveryStrategy::AlternativeMethod => "alternative_method",
            RecoveryStrategy::WaitAndRetry => "wait_and_retry",
            RecoveryStrategy::ApplicationRestart => "application_restart",
            RecoveryStrategy::SkipAndContinue => "skip_and_continue",
            RecoveryStrategy::UserIntervention => "user_intervention",
        }
    }

    /// Disruptive strategies are filtered out unless aggressive recovery
    /// is enabled
    pub fn is_aggressive(&self) -> bool {
        matches!(
            self,
            RecoveryStrategy::ApplicationRestart | RecoveryStrategy::UserIntervention
        )
    }

    /// Static robustness prior: how likely the strategy is to leave the
    /// environment in a usable state
    pub fn robustness_prior(&self) -> f64 {
        match self {
            RecoveryStrategy::SkipAndContinue => 0.95,
            RecoveryStrategy::RetryWithDelay => 0.85,
            RecoveryStrategy::WaitAndRetry => 0.85,
            RecoveryStrategy::ContextRestoration => 0.75,
            RecoveryStrategy::CoordinateAdjustment => 0.7,
            RecoveryStrategy::AlternativeMethod => 0.65,
            RecoveryStrategy::UserIntervention => 0.6,
            RecoveryStrategy::ApplicationRestart => 0.4,
        }
    }

    /// Static reliability prior, blended with the learned success ratio
    pub fn reliability_prior(&self) -> f64 {
        match self {
            RecoveryStrategy::RetryWithDelay => 0.7,
            RecoveryStrategy::ContextRestoration => 0.65,
            RecoveryStrategy::WaitAndRetry => 0.6,
            RecoveryStrategy::AlternativeMethod => 0.55,
            RecoveryStrategy::CoordinateAdjustment => 0.5,
            RecoveryStrategy::SkipAndContinue => 0.9,
            RecoveryStrategy::ApplicationRestart => 0.45,
            RecoveryStrategy::UserIntervention => 0.8,
        }
    }

    /// Advisory per-strategy timeout, seconds. Checked after blocking
    /// calls return, never enforced as a hard deadline.
    pub fn advisory_timeout_secs(&self) -> f64 {
        match self {
            RecoveryStrategy::RetryWithDelay => 15.0,
            RecoveryStrategy::ContextRestoration => 10.0,
            RecoveryStrategy::CoordinateAdjustment => 5.0,
            RecoveryStrategy::AlternativeMethod => 10.0,
            RecoveryStrategy::WaitAndRetry => 20.0,
            RecoveryStrategy::ApplicationRestart => 60.0,
            RecoveryStrategy::SkipAndContinue => 1.0,
            RecoveryStrategy::UserIntervention => 300.0,
        }
    }
}

/// Everything the recovery engine needs to know about a failed action
#[derive(Debug, Clone)]
pub struct FailureInfo {
    pub action: Action,
    pub message: String,
    /// Failures already seen for this action in the current sequence
    pub prior_failures: usize,
    /// Application the action was recorded against
    pub expected_app: String,
}

impl FailureInfo {
    pub fn new(action: Action, message: impl Into<String>, expected_app: &str) -> Self {
        Self {
            action,
            message: message.into(),
            prior_failures: 0,
            expected_app: expected_app.to_string(),
        }
    }

    pub fn with_prior_failures(mut self, prior_failures: usize) -> Self {
        self.prior_failures = prior_failures;
        self
    }

    pub fn kind(&self) -> FailureKind {
        classify_failure(&self.message)
    }
}

/// One strategy attempt inside a recovery run
#[derive(Debug, Clone)]
pub struct StrategyAttempt {
    pub strategy: RecoveryStrategy,
    pub success: bool,
    pub duration_ms: u64,
    /// Whether the attempt overran the strategy's advisory timeout
    pub overran_timeout: bool,
    pub note: Option<String>,
}

/// Outcome of one `handle_failure` call
#[derive(Debug, Clone)]
pub struct RecoveryResult {
    pub success: bool,
    pub kind: FailureKind,
    /// Strategy that resolved the failure, when one did
    pub strategy: Option<RecoveryStrategy>,
    pub attempts: Vec<StrategyAttempt>,
    /// Whether the sequence may proceed past this action
    pub can_continue: bool,
    /// Static prior blended with the learned per-kind success ratio
    pub reliability: f64,
    /// Static robustness prior of the resolving (or last tried) strategy
    pub robustness: f64,
}

/// One learning sample for a (failure kind, strategy) pair
#[derive(Debug, Clone)]
pub struct RecoveryRecord {
    pub strategy: RecoveryStrategy,
    pub recorded_at: DateTime<Utc>,
}
