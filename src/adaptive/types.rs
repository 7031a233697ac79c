//! Adaptive executor type definitions

use crate::types::{Action, Bounds, Point};
use chrono::{DateTime, Utc};

/// How an action was retargeted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdaptationKind {
    /// Shift by the exact observed window-bounds delta
    WindowShift,
    /// Small bounded random jitter for sub-pixel UI shifts
    CoordinateNudge,
    /// Retarget to the nearest interactive element's center
    ElementRetarget,
    /// Rescale coordinates by the window-width ratio
    ScaleAdjust,
    /// Replace with a semantically equivalent action (label -> shortcut)
    SemanticSubstitute,
    /// Widened element search picking the best role match
    WidenedSearch,
    /// Inject a wait before retrying the original action
    PreActionWait,
}

impl AdaptationKind {
    /// Static reliability prior, blended with the learned success ratio
    pub fn reliability_prior(&self) -> f64 {
        match self {
            AdaptationKind::WindowShift => 0.9,
            AdaptationKind::ElementRetarget => 0.8,
            AdaptationKind::SemanticSubstitute => 0.75,
            AdaptationKind::CoordinateNudge => 0.7,
            AdaptationKind::ScaleAdjust => 0.6,
            AdaptationKind::WidenedSearch => 0.55,
            AdaptationKind::PreActionWait => 0.5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AdaptationKind::WindowShift => "window_shift",
            AdaptationKind::CoordinateNudge => "coordinate_nudge",
            AdaptationKind::ElementRetarget => "element_retarget",
            AdaptationKind::ScaleAdjust => "scale_adjust",
            AdaptationKind::SemanticSubstitute => "semantic_substitute",
            AdaptationKind::WidenedSearch => "widened_search",
            AdaptationKind::PreActionWait => "pre_action_wait",
        }
    }
}

/// Drift information one adaptation call works against
#[derive(Debug, Clone)]
pub struct AdaptationContext {
    /// Window bounds at record time
    pub expected_bounds: Bounds,
    /// Application the action was recorded against
    pub expected_app: String,
}

impl AdaptationContext {
    pub fn new(expected_bounds: Bounds, expected_app: &str) -> Self {
        Self {
            expected_bounds,
            expected_app: expected_app.to_string(),
        }
    }
}

/// Outcome of one `adapt_and_execute` call
#[derive(Debug, Clone)]
pub struct AdaptationResult {
    pub success: bool,
    /// The retargeted copy that was executed last; the caller's original
    /// action is never modified
    pub adapted_action: Action,
    pub kind: Option<AdaptationKind>,
    pub confidence: f64,
    pub attempts: usize,
    /// Rewards small coordinate deltas and confident execution
    pub precision: f64,
    /// Static prior blended with the learned per-signature success ratio
    pub reliability: f64,
}

/// One learning sample for a quantized action signature
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub kind: AdaptationKind,
    pub success: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Quantized signature grouping similar actions for learning.
///
/// Coordinates are bucketed to 50px so nearby replays share history.
pub fn action_signature(action: &Action, app: &str) -> String {
    match action.coordinates() {
        Some(Point { x, y }) => format!("{}|{}:{}|{}", action.kind_name(), x / 50, y / 50, app),
        None => format!("{}|-|{}", action.kind_name(), app),
    }
}
