//! Replay action model
//!
//! Actions are a closed tagged union matching the recorded wire schema:
//! `{ kind, coordinates?, text?, target?, timing?, waitBefore? }`. A
//! deserialized sequence may still be structurally incomplete (a click with
//! no resolvable target); that is the sequence validator's concern, checked
//! before playback starts. Adaptation produces a new copy via
//! [`Action::with_coordinates`] and never mutates the original.

use serde::{Deserialize, Serialize};

/// Screen coordinate, serialized as `[x, y]` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Component-wise offset, returning a new point
    pub fn offset(&self, dx: i32, dy: i32) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Point::new(x, y)
    }
}

impl From<Point> for (i32, i32) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

/// Rectangular screen region (window bounds, element bounds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point of the region
    pub fn center(&self) -> Point {
        Point::new(
            self.x + (self.width as i32) / 2,
            self.y + (self.height as i32) / 2,
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x
            && p.y >= self.y
            && p.x < self.x + self.width as i32
            && p.y < self.y + self.height as i32
    }
}

/// Optional semantic target for an action (resolved over raw coordinates
/// when present)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Point>,
}

/// Post-action timing hints
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionTiming {
    /// Seconds to wait after the action completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_after: Option<f64>,
}

/// One replay step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    Click {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coordinates: Option<Point>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<TargetSpec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timing: Option<ActionTiming>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wait_before: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    DoubleClick {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coordinates: Option<Point>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<TargetSpec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timing: Option<ActionTiming>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wait_before: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    RightClick {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coordinates: Option<Point>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<TargetSpec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timing: Option<ActionTiming>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wait_before: Option<f64>,
    },
    /// Key combination, e.g. "ctrl+s"
    #[serde(rename_all = "camelCase")]
    KeyPress {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timing: Option<ActionTiming>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wait_before: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    TypeText {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coordinates: Option<Point>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timing: Option<ActionTiming>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wait_before: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    Scroll {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coordinates: Option<Point>,
        /// Scroll delta; negative scrolls up
        #[serde(default)]
        amount: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timing: Option<ActionTiming>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wait_before: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    Wait { seconds: f64 },
}

impl Action {
    /// Well-formed click at fixed coordinates
    pub fn click(p: Point) -> Self {
        Action::Click {
            coordinates: Some(p),
            target: None,
            timing: None,
            wait_before: None,
        }
    }

    /// Click resolved through a text target
    pub fn click_text(text: &str) -> Self {
        Action::Click {
            coordinates: None,
            target: Some(TargetSpec {
                text: Some(text.to_string()),
                coordinates: None,
            }),
            timing: None,
            wait_before: None,
        }
    }

    pub fn key_press(combo: &str) -> Self {
        Action::KeyPress {
            text: combo.to_string(),
            timing: None,
            wait_before: None,
        }
    }

    pub fn type_text(text: &str) -> Self {
        Action::TypeText {
            text: text.to_string(),
            coordinates: None,
            timing: None,
            wait_before: None,
        }
    }

    pub fn wait(seconds: f64) -> Self {
        Action::Wait { seconds }
    }

    /// Stable wire name of the action kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Action::Click { .. } => "click",
            Action::DoubleClick { .. } => "double_click",
            Action::RightClick { .. } => "right_click",
            Action::KeyPress { .. } => "key_press",
            Action::TypeText { .. } => "type_text",
            Action::Scroll { .. } => "scroll",
            Action::Wait { .. } => "wait",
        }
    }

    /// Whether this kind requires a screen position to execute
    pub fn is_pointer_kind(&self) -> bool {
        matches!(
            self,
            Action::Click { .. }
                | Action::DoubleClick { .. }
                | Action::RightClick { .. }
                | Action::Scroll { .. }
        )
    }

    /// Whether this action interacts with the UI (everything except waits)
    pub fn is_interactive(&self) -> bool {
        !matches!(self, Action::Wait { .. })
    }

    /// Effective coordinates: explicit first, then target coordinates
    pub fn coordinates(&self) -> Option<Point> {
        match self {
            Action::Click {
                coordinates,
                target,
                ..
            }
            | Action::DoubleClick {
                coordinates,
                target,
                ..
            }
            | Action::RightClick {
                coordinates,
                target,
                ..
            } => coordinates.or_else(|| target.as_ref().and_then(|t| t.coordinates)),
            Action::TypeText { coordinates, .. } | Action::Scroll { coordinates, .. } => {
                *coordinates
            }
            _ => None,
        }
    }

    /// Text label of the semantic target, if any
    pub fn target_text(&self) -> Option<&str> {
        match self {
            Action::Click { target, .. }
            | Action::DoubleClick { target, .. }
            | Action::RightClick { target, .. } => {
                target.as_ref().and_then(|t| t.text.as_deref())
            }
            _ => None,
        }
    }

    /// New copy of this action with its coordinates replaced.
    ///
    /// Kinds without coordinates are returned unchanged; the receiver is
    /// never modified.
    pub fn with_coordinates(&self, p: Point) -> Action {
        let mut copy = self.clone();
        match &mut copy {
            Action::Click { coordinates, .. }
            | Action::DoubleClick { coordinates, .. }
            | Action::RightClick { coordinates, .. }
            | Action::TypeText { coordinates, .. }
            | Action::Scroll { coordinates, .. } => *coordinates = Some(p),
            _ => {}
        }
        copy
    }

    /// Seconds to wait before executing, if recorded
    pub fn wait_before(&self) -> Option<f64> {
        match self {
            Action::Click { wait_before, .. }
            | Action::DoubleClick { wait_before, .. }
            | Action::RightClick { wait_before, .. }
            | Action::KeyPress { wait_before, .. }
            | Action::TypeText { wait_before, .. }
            | Action::Scroll { wait_before, .. } => *wait_before,
            Action::Wait { .. } => None,
        }
    }

    /// Seconds to wait after executing, if recorded
    pub fn delay_after(&self) -> Option<f64> {
        match self {
            Action::Click { timing, .. }
            | Action::DoubleClick { timing, .. }
            | Action::RightClick { timing, .. }
            | Action::KeyPress { timing, .. }
            | Action::TypeText { timing, .. }
            | Action::Scroll { timing, .. } => timing.and_then(|t| t.delay_after),
            Action::Wait { seconds } => Some(*seconds),
        }
    }
}

/// Per-action execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Skipped,
    Timeout,
}

/// Outcome of one action execution attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    /// Failure message when status is not Success
    pub message: Option<String>,
    /// Executor-reported confidence, when available
    pub confidence: Option<f64>,
    pub duration_ms: u64,
}

impl ExecutionOutcome {
    pub fn success(confidence: Option<f64>, duration_ms: u64) -> Self {
        Self {
            status: ExecutionStatus::Success,
            message: None,
            confidence,
            duration_ms,
        }
    }

    pub fn failure(message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            message: Some(message.into()),
            confidence: None,
            duration_ms,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Skipped,
            message: Some(reason.into()),
            confidence: None,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point::new(0, 0);
        let b = Point::new(3, 4);
        assert_eq!(a.distance(&b), 5.0);
    }

    #[test]
    fn test_bounds_center() {
        let b = Bounds::new(100, 200, 400, 300);
        assert_eq!(b.center(), Point::new(300, 350));
    }

    #[test]
    fn test_action_wire_roundtrip() {
        let json = r#"{"kind":"click","coordinates":[100,150],"waitBefore":0.5}"#;
        let action: Action = serde_json::from_str(json).unwrap();

        assert_eq!(action.kind_name(), "click");
        assert_eq!(action.coordinates(), Some(Point::new(100, 150)));
        assert_eq!(action.wait_before(), Some(0.5));

        let back = serde_json::to_string(&action).unwrap();
        let reparsed: Action = serde_json::from_str(&back).unwrap();
        assert_eq!(action, reparsed);
    }

    #[test]
    fn test_click_without_coordinates_deserializes() {
        // Structural completeness is the validator's job, not serde's
        let json = r#"{"kind":"click"}"#;
        let action: Action = serde_json::from_str(json).unwrap();
        assert!(action.coordinates().is_none());
    }

    #[test]
    fn test_target_text_resolution() {
        let action = Action::click_text("Save");
        assert_eq!(action.target_text(), Some("Save"));
        assert!(action.coordinates().is_none());
    }

    #[test]
    fn test_with_coordinates_returns_new_copy() {
        let original = Action::click(Point::new(100, 100));
        let adapted = original.with_coordinates(Point::new(130, 90));

        assert_eq!(original.coordinates(), Some(Point::new(100, 100)));
        assert_eq!(adapted.coordinates(), Some(Point::new(130, 90)));
    }

    #[test]
    fn test_delay_after_from_timing() {
        let action = Action::Click {
            coordinates: Some(Point::new(1, 1)),
            target: None,
            timing: Some(ActionTiming {
                delay_after: Some(1.5),
            }),
            wait_before: None,
        };
        assert_eq!(action.delay_after(), Some(1.5));
    }

    #[test]
    fn test_wait_is_not_interactive() {
        assert!(!Action::wait(2.0).is_interactive());
        assert!(Action::click(Point::new(0, 0)).is_interactive());
    }
}
