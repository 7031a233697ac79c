//! Pre-flight sequence validation
//!
//! Runs before any side effect. Structural per-action checks catch
//! incomplete deserialized actions (a click with no resolvable target);
//! sequence-level heuristics flag suspicious but playable sequences.
//! ERROR and CRITICAL issues block playback; WARNING and INFO do not.

use crate::types::Action;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Pre-flight issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ValidationSeverity {
    /// Whether this severity prevents playback from starting
    pub fn blocks(&self) -> bool {
        matches!(self, ValidationSeverity::Error | ValidationSeverity::Critical)
    }
}

/// One validation finding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    /// Index of the offending action; None for sequence-level findings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_index: Option<usize>,
    /// Missing or invalid field, when the issue is structural
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

/// Outcome of validating one sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn blocking_issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity.blocks())
    }
}

/// Consecutive-click count that triggers a warning
const MAX_CONSECUTIVE_CLICKS: usize = 10;
/// Cumulative recorded delay that triggers a warning, seconds
const MAX_CUMULATIVE_DELAY_SECS: f64 = 600.0;

/// Structural and heuristic sequence checks
pub struct SequenceValidator;

impl SequenceValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, sequence: &[Action]) -> ValidationReport {
        let mut issues = Vec::new();

        if sequence.is_empty() {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Error,
                action_index: None,
                field: None,
                message: "sequence contains no actions".to_string(),
            });
            return ValidationReport {
                is_valid: false,
                issues,
            };
        }

        for (index, action) in sequence.iter().enumerate() {
            self.check_action(index, action, &mut issues);
        }
        self.check_sequence(sequence, &mut issues);

        let is_valid = !issues.iter().any(|i| i.severity.blocks());
        debug!(
            actions = sequence.len(),
            issues = issues.len(),
            is_valid,
            "sequence validated"
        );
        ValidationReport { is_valid, issues }
    }

    fn check_action(&self, index: usize, action: &Action, issues: &mut Vec<ValidationIssue>) {
        match action {
            Action::Click { .. } | Action::DoubleClick { .. } | Action::RightClick { .. } => {
                if action.coordinates().is_none() && action.target_text().is_none() {
                    issues.push(ValidationIssue {
                        severity: ValidationSeverity::Error,
                        action_index: Some(index),
                        field: Some("coordinates".to_string()),
                        message: format!(
                            "{} action has neither coordinates nor a resolvable target",
                            action.kind_name()
                        ),
                    });
                }
            }
            Action::KeyPress { text, .. } => {
                if text.trim().is_empty() {
                    issues.push(ValidationIssue {
                        severity: ValidationSeverity::Error,
                        action_index: Some(index),
                        field: Some("text".to_string()),
                        message: "key_press action has an empty key combination".to_string(),
                    });
                } else if combo_mismatches_platform(text) {
                    issues.push(ValidationIssue {
                        severity: ValidationSeverity::Warning,
                        action_index: Some(index),
                        field: Some("text".to_string()),
                        message: format!("key combination '{}' may not match this platform", text),
                    });
                }
            }
            Action::TypeText { text, .. } => {
                if text.is_empty() {
                    issues.push(ValidationIssue {
                        severity: ValidationSeverity::Error,
                        action_index: Some(index),
                        field: Some("text".to_string()),
                        message: "type_text action has empty text".to_string(),
                    });
                }
            }
            Action::Scroll { amount, .. } => {
                if *amount == 0 {
                    issues.push(ValidationIssue {
                        severity: ValidationSeverity::Warning,
                        action_index: Some(index),
                        field: Some("amount".to_string()),
                        message: "scroll action with zero amount has no effect".to_string(),
                    });
                }
            }
            Action::Wait { seconds } => {
                if *seconds < 0.0 {
                    issues.push(ValidationIssue {
                        severity: ValidationSeverity::Error,
                        action_index: Some(index),
                        field: Some("seconds".to_string()),
                        message: "wait action has a negative duration".to_string(),
                    });
                }
            }
        }

        if let Some(wait) = action.wait_before() {
            if wait < 0.0 {
                issues.push(ValidationIssue {
                    severity: ValidationSeverity::Error,
                    action_index: Some(index),
                    field: Some("waitBefore".to_string()),
                    message: "negative pre-action wait".to_string(),
                });
            }
        }
    }

    fn check_sequence(&self, sequence: &[Action], issues: &mut Vec<ValidationIssue>) {
        let mut consecutive_clicks = 0usize;
        let mut max_consecutive_clicks = 0usize;
        let mut cumulative_delay = 0.0f64;
        let mut interactive = 0usize;

        for action in sequence {
            if matches!(action, Action::Click { .. }) {
                consecutive_clicks += 1;
                max_consecutive_clicks = max_consecutive_clicks.max(consecutive_clicks);
            } else {
                consecutive_clicks = 0;
            }

            cumulative_delay += action.wait_before().unwrap_or(0.0);
            cumulative_delay += action.delay_after().unwrap_or(0.0);
            if action.is_interactive() {
                interactive += 1;
            }
        }

        if max_consecutive_clicks > MAX_CONSECUTIVE_CLICKS {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Warning,
                action_index: None,
                field: None,
                message: format!(
                    "{} consecutive clicks; the recording may contain noise",
                    max_consecutive_clicks
                ),
            });
        }
        if cumulative_delay > MAX_CUMULATIVE_DELAY_SECS {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Warning,
                action_index: None,
                field: None,
                message: format!(
                    "cumulative recorded delay of {:.0}s exceeds {:.0}s",
                    cumulative_delay, MAX_CUMULATIVE_DELAY_SECS
                ),
            });
        }
        if interactive == 0 {
            issues.push(ValidationIssue {
                severity: ValidationSeverity::Warning,
                action_index: None,
                field: None,
                message: "sequence contains no interactive actions".to_string(),
            });
        }
    }
}

impl Default for SequenceValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// A "cmd" modifier only exists on macOS; "ctrl" combos are fine everywhere
fn combo_mismatches_platform(combo: &str) -> bool {
    let lower = combo.to_lowercase();
    lower.contains("cmd") && !cfg!(target_os = "macos")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    #[test]
    fn test_valid_sequence_passes() {
        let validator = SequenceValidator::new();
        let report = validator.validate(&[
            Action::click(Point::new(100, 100)),
            Action::type_text("hello"),
            Action::key_press("ctrl+s"),
        ]);

        assert!(report.is_valid);
        assert!(report.blocking_issues().next().is_none());
    }

    #[test]
    fn test_click_without_target_blocks() {
        let validator = SequenceValidator::new();
        let incomplete: Action = serde_json::from_str(r#"{"kind":"click"}"#).unwrap();

        let report = validator.validate(&[incomplete]);

        assert!(!report.is_valid);
        let issue = report.blocking_issues().next().unwrap();
        assert_eq!(issue.severity, ValidationSeverity::Error);
        assert_eq!(issue.field.as_deref(), Some("coordinates"));
        assert_eq!(issue.action_index, Some(0));
    }

    #[test]
    fn test_click_with_text_target_passes() {
        let validator = SequenceValidator::new();
        let report = validator.validate(&[Action::click_text("Save")]);
        assert!(report.is_valid);
    }

    #[test]
    fn test_empty_sequence_blocks() {
        let report = SequenceValidator::new().validate(&[]);
        assert!(!report.is_valid);
    }

    #[test]
    fn test_consecutive_clicks_warn_but_do_not_block() {
        let validator = SequenceValidator::new();
        let clicks: Vec<Action> = (0..12).map(|i| Action::click(Point::new(i, i))).collect();

        let report = validator.validate(&clicks);

        assert!(report.is_valid);
        assert!(report
            .issues
            .iter()
            .any(|i| i.severity == ValidationSeverity::Warning
                && i.message.contains("consecutive clicks")));
    }

    #[test]
    fn test_cumulative_delay_warns() {
        let validator = SequenceValidator::new();
        let report = validator.validate(&[
            Action::click(Point::new(1, 1)),
            Action::wait(700.0),
        ]);

        assert!(report.is_valid);
        assert!(report
            .issues
            .iter()
            .any(|i| i.message.contains("cumulative recorded delay")));
    }

    #[test]
    fn test_only_waits_warns_zero_interactive() {
        let report = SequenceValidator::new().validate(&[Action::wait(1.0), Action::wait(2.0)]);
        assert!(report.is_valid);
        assert!(report
            .issues
            .iter()
            .any(|i| i.message.contains("no interactive actions")));
    }

    #[test]
    fn test_negative_wait_blocks() {
        let report = SequenceValidator::new().validate(&[Action::wait(-1.0)]);
        assert!(!report.is_valid);
    }

    #[test]
    fn test_empty_key_combo_blocks() {
        let report = SequenceValidator::new().validate(&[Action::key_press("  ")]);
        assert!(!report.is_valid);
    }
}
