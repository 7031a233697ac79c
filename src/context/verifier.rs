//! Context verification
//!
//! Scores a detected environment against expected criteria at one of four
//! levels. Results are cached by (app, context-type, level) so immediate
//! re-verification of an unchanged environment is idempotent.

use crate::context::types::{ApplicationContext, ContextType, UiState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::debug;

/// Aspect weights for overall confidence
const WEIGHT_APP: f64 = 0.4;
const WEIGHT_TYPE: f64 = 0.25;
const WEIGHT_UI_STATE: f64 = 0.15;
const WEIGHT_SIZE: f64 = 0.1;
const WEIGHT_STABILITY: f64 = 0.1;

const ISSUE_PENALTY: f64 = 0.15;
const WARNING_PENALTY: f64 = 0.05;
const CONTEXT_CONFIDENCE_BOOST: f64 = 0.1;

const THRESHOLD_VERIFIED: f64 = 0.8;
const THRESHOLD_WARNING: f64 = 0.5;

/// Issues containing any of these mark the verification as failed outright
const CRITICAL_ISSUE_MARKERS: &[&str] = &[
    "wrong application",
    "application not detected",
    "context lost",
];

/// How strictly the environment is checked before an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationLevel {
    /// Application match only
    Minimal,
    /// Plus context type, UI state and window size
    Standard,
    /// Plus confidence floor and stability duration; UI-state mismatch
    /// becomes an error
    Strict,
    /// Plus fuzzy app similarity with cached compatibility scores and
    /// suggested adaptations
    Adaptive,
}

/// Expected environment for verification
#[derive(Debug, Clone)]
pub struct VerificationCriteria {
    pub expected_app: Option<String>,
    pub expected_type: Option<ContextType>,
    pub expected_ui_state: Option<UiState>,
    /// Expected window size (width, height)
    pub expected_window_size: Option<(u32, u32)>,
    /// Allowed fractional deviation per window dimension
    pub size_tolerance: f64,
    /// Confidence floor enforced at Strict level
    pub min_confidence: f64,
    /// Required stability duration at Strict level, seconds
    pub min_stability_secs: f64,
    /// Allow fuzzy application-name matching
    pub fuzzy_app_match: bool,
}

impl Default for VerificationCriteria {
    fn default() -> Self {
        Self {
            expected_app: None,
            expected_type: None,
            expected_ui_state: None,
            expected_window_size: None,
            size_tolerance: 0.25,
            min_confidence: 0.7,
            min_stability_secs: 1.0,
            fuzzy_app_match: false,
        }
    }
}

impl VerificationCriteria {
    /// Criteria matching a previously captured context
    pub fn from_context(context: &ApplicationContext) -> Self {
        Self {
            expected_app: Some(context.app_name.clone()),
            expected_type: Some(context.context_type),
            expected_ui_state: Some(context.ui_state),
            expected_window_size: Some((
                context.window_bounds.width,
                context.window_bounds.height,
            )),
            ..Self::default()
        }
    }
}

/// Verification verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Verified,
    Warning,
    Failed,
}

/// Result of one verification call
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub confidence: f64,
    pub app_match: bool,
    pub type_match: bool,
    pub ui_state_match: bool,
    pub size_match: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl VerificationResult {
    pub fn is_usable(&self) -> bool {
        self.status != VerificationStatus::Failed
    }
}

struct CachedResult {
    result: VerificationResult,
    cached_at: Instant,
}

/// Verifies a detected context against expected criteria
pub struct ContextVerifier {
    cache: HashMap<(String, ContextType, VerificationLevel), CachedResult>,
    cache_ttl: Duration,
    /// Learned app-compatibility scores for adaptive fuzzy matching,
    /// keyed (expected, actual)
    compatibility: HashMap<(String, String), f64>,
}

impl ContextVerifier {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            cache_ttl: Duration::from_secs(2),
            compatibility: HashMap::new(),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Verify `context` against `criteria` at the given level.
    ///
    /// `stable_secs` is how long the environment has been unchanged, as
    /// tracked by the detector.
    pub fn verify(
        &mut self,
        context: &ApplicationContext,
        criteria: &VerificationCriteria,
        level: VerificationLevel,
        stable_secs: f64,
    ) -> VerificationResult {
        let cache_key = (context.app_name.clone(), context.context_type, level);
        if let Some(cached) = self.cache.get(&cache_key) {
            if cached.cached_at.elapsed() < self.cache_ttl {
                return cached.result.clone();
            }
        }

        let result = self.verify_uncached(context, criteria, level, stable_secs);
        debug!(
            status = ?result.status,
            confidence = result.confidence,
            ?level,
            "context verified"
        );
        self.cache.insert(
            cache_key,
            CachedResult {
                result: result.clone(),
                cached_at: Instant::now(),
            },
        );
        result
    }

    /// Drop all cached verification results
    pub fn invalidate_cache(&mut self) {
        self.cache.clear();
    }

    fn verify_uncached(
        &mut self,
        context: &ApplicationContext,
        criteria: &VerificationCriteria,
        level: VerificationLevel,
        stable_secs: f64,
    ) -> VerificationResult {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();
        let mut recommendations = Vec::new();

        // App aspect (all levels)
        let fuzzy = criteria.fuzzy_app_match || level == VerificationLevel::Adaptive;
        let (app_match, app_score) = self.score_app(context, criteria, fuzzy, level);
        if !app_match {
            if let Some(expected) = &criteria.expected_app {
                issues.push(format!(
                    "wrong application: expected '{}', found '{}'",
                    expected, context.app_name
                ));
                recommendations.push(format!("bring '{}' to the foreground", expected));
            }
        }

        // Type / UI-state / size aspects (Standard and above)
        let deep = level != VerificationLevel::Minimal;

        let type_match = !deep
            || criteria
                .expected_type
                .map_or(true, |t| t == context.context_type);
        if !type_match {
            warnings.push(format!(
                "context type changed: expected {:?}, found {:?}",
                criteria.expected_type.unwrap_or(ContextType::Unknown),
                context.context_type
            ));
        }

        let ui_state_match = !deep
            || criteria
                .expected_ui_state
                .map_or(true, |s| s == context.ui_state);
        if !ui_state_match {
            let message = format!(
                "UI state mismatch: expected {:?}, found {:?}",
                criteria.expected_ui_state.unwrap_or(UiState::Unknown),
                context.ui_state
            );
            // Strict promotes UI-state mismatch from warning to error
            if level == VerificationLevel::Strict {
                issues.push(message);
            } else {
                warnings.push(message);
            }
        }

        let (size_match, size_score) = if deep {
            score_window_size(context, criteria, &mut warnings)
        } else {
            (true, 1.0)
        };

        // Stability aspect (Strict and above)
        let stability_score = if level == VerificationLevel::Strict
            || level == VerificationLevel::Adaptive
        {
            let score = (stable_secs / criteria.min_stability_secs.max(0.001)).min(1.0);
            if level == VerificationLevel::Strict && score < 1.0 {
                warnings.push(format!(
                    "environment changed {:.1}s ago, below the {:.1}s stability floor",
                    stable_secs, criteria.min_stability_secs
                ));
            }
            score
        } else {
            1.0
        };

        if level == VerificationLevel::Adaptive && !app_match {
            recommendations
                .push("retarget through element search before executing".to_string());
        }

        let aspect_score = WEIGHT_APP * app_score
            + WEIGHT_TYPE * if type_match { 1.0 } else { 0.0 }
            + WEIGHT_UI_STATE * if ui_state_match { 1.0 } else { 0.0 }
            + WEIGHT_SIZE * size_score
            + WEIGHT_STABILITY * stability_score;

        let confidence = (aspect_score - ISSUE_PENALTY * issues.len() as f64
            - WARNING_PENALTY * warnings.len() as f64
            + CONTEXT_CONFIDENCE_BOOST * context.confidence)
            .clamp(0.0, 1.0);

        let has_critical = issues.iter().any(|issue| {
            CRITICAL_ISSUE_MARKERS
                .iter()
                .any(|marker| issue.contains(marker))
        });

        let mut status = if has_critical {
            VerificationStatus::Failed
        } else if !issues.is_empty() || !warnings.is_empty() {
            VerificationStatus::Warning
        } else if confidence >= THRESHOLD_VERIFIED {
            VerificationStatus::Verified
        } else if confidence >= THRESHOLD_WARNING {
            VerificationStatus::Warning
        } else {
            VerificationStatus::Failed
        };

        // Strict never reports Verified below the configured confidence
        // floor, whether the computed score or the detection itself falls
        // short
        if level == VerificationLevel::Strict && status == VerificationStatus::Verified {
            if context.confidence < criteria.min_confidence {
                warnings.push(format!(
                    "detection confidence {:.2} below the {:.2} floor",
                    context.confidence, criteria.min_confidence
                ));
                status = VerificationStatus::Warning;
            } else if confidence < criteria.min_confidence {
                status = VerificationStatus::Warning;
            }
        }

        VerificationResult {
            status,
            confidence,
            app_match,
            type_match,
            ui_state_match,
            size_match,
            issues,
            warnings,
            recommendations,
        }
    }

    fn score_app(
        &mut self,
        context: &ApplicationContext,
        criteria: &VerificationCriteria,
        fuzzy: bool,
        level: VerificationLevel,
    ) -> (bool, f64) {
        let Some(expected) = &criteria.expected_app else {
            return (true, 1.0);
        };

        if expected.eq_ignore_ascii_case(&context.app_name) {
            return (true, 1.0);
        }

        if fuzzy {
            let key = (expected.clone(), context.app_name.clone());
            let similarity = match self.compatibility.get(&key) {
                Some(score) => *score,
                None => {
                    let score = token_similarity(expected, &context.app_name);
                    if level == VerificationLevel::Adaptive {
                        self.compatibility.insert(key, score);
                    }
                    score
                }
            };
            if similarity >= 0.5 {
                return (true, similarity);
            }
            return (false, similarity);
        }

        (false, 0.0)
    }
}

impl Default for ContextVerifier {
    fn default() -> Self {
        Self::new()
    }
}

fn score_window_size(
    context: &ApplicationContext,
    criteria: &VerificationCriteria,
    warnings: &mut Vec<String>,
) -> (bool, f64) {
    let Some((expected_w, expected_h)) = criteria.expected_window_size else {
        return (true, 1.0);
    };

    let dev_w = dimension_deviation(context.window_bounds.width, expected_w);
    let dev_h = dimension_deviation(context.window_bounds.height, expected_h);
    let deviation = dev_w.max(dev_h);

    if deviation <= criteria.size_tolerance {
        (true, 1.0)
    } else {
        warnings.push(format!(
            "window size differs: expected {}x{}, found {}x{}",
            expected_w, expected_h, context.window_bounds.width, context.window_bounds.height
        ));
        (false, (1.0 - deviation).max(0.0))
    }
}

fn dimension_deviation(actual: u32, expected: u32) -> f64 {
    if expected == 0 {
        return 0.0;
    }
    ((actual as f64 - expected as f64) / expected as f64).abs()
}

/// Token-set Jaccard similarity between two application names
fn token_similarity(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<String> = tokenize(a);
    let tokens_b: HashSet<String> = tokenize(b);

    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn tokenize(s: &str) -> HashSet<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}
