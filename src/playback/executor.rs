//! Per-action executor
//!
//! Maps one [`Action`] onto platform collaborator calls. Collaborator
//! errors never propagate as panics or `Err`; they are absorbed into a
//! failed [`ExecutionOutcome`] carrying the message, so the orchestrator
//! and the adaptive/recovery layers can act on it.

use crate::platform::{KeyboardInput, MouseButton, MouseGesture, PlatformDriver};
use crate::types::{Action, ExecutionOutcome, ExecutionStatus};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Executes single actions against the platform driver
#[derive(Clone)]
pub struct ActionExecutor {
    driver: Arc<dyn PlatformDriver>,
}

impl ActionExecutor {
    pub fn new(driver: Arc<dyn PlatformDriver>) -> Self {
        Self { driver }
    }

    /// Execute one action, converting any collaborator failure into a
    /// failed outcome
    pub fn execute(&self, action: &Action) -> ExecutionOutcome {
        let start = Instant::now();
        let outcome = self.dispatch(action, start);
        debug!(
            kind = action.kind_name(),
            status = ?outcome.status,
            duration_ms = outcome.duration_ms,
            "action executed"
        );
        outcome
    }

    fn dispatch(&self, action: &Action, start: Instant) -> ExecutionOutcome {
        match action {
            Action::Click { .. } => self.pointer_action(
                action,
                MouseGesture::Click {
                    button: MouseButton::Left,
                    double: false,
                },
                start,
            ),
            Action::DoubleClick { .. } => self.pointer_action(
                action,
                MouseGesture::Click {
                    button: MouseButton::Left,
                    double: true,
                },
                start,
            ),
            Action::RightClick { .. } => self.pointer_action(
                action,
                MouseGesture::Click {
                    button: MouseButton::Right,
                    double: false,
                },
                start,
            ),
            Action::Scroll { amount, .. } => {
                self.pointer_action(action, MouseGesture::Scroll { amount: *amount }, start)
            }
            Action::KeyPress { text, .. } => {
                self.keyboard_action(&KeyboardInput::Combo(text.clone()), start)
            }
            Action::TypeText { text, .. } => {
                self.keyboard_action(&KeyboardInput::Text(text.clone()), start)
            }
            Action::Wait { seconds } => {
                std::thread::sleep(Duration::from_secs_f64(seconds.max(0.0)));
                ExecutionOutcome::success(None, start.elapsed().as_millis() as u64)
            }
        }
    }

    fn pointer_action(
        &self,
        action: &Action,
        gesture: MouseGesture,
        start: Instant,
    ) -> ExecutionOutcome {
        let Some(point) = action.coordinates() else {
            return ExecutionOutcome::failure(
                format!("no coordinates resolved for {}", action.kind_name()),
                start.elapsed().as_millis() as u64,
            );
        };

        match self.driver.execute_mouse_action(gesture, point) {
            Ok(response) if response.success => {
                ExecutionOutcome::success(response.confidence, start.elapsed().as_millis() as u64)
            }
            Ok(response) => failure_from_message(
                response
                    .message
                    .unwrap_or_else(|| "mouse action rejected".to_string()),
                start,
            ),
            Err(err) => failure_from_message(err.to_string(), start),
        }
    }

    fn keyboard_action(&self, input: &KeyboardInput, start: Instant) -> ExecutionOutcome {
        match self.driver.execute_keyboard_action(input) {
            Ok(response) if response.success => {
                ExecutionOutcome::success(response.confidence, start.elapsed().as_millis() as u64)
            }
            Ok(response) => failure_from_message(
                response
                    .message
                    .unwrap_or_else(|| "keyboard action rejected".to_string()),
                start,
            ),
            Err(err) => failure_from_message(err.to_string(), start),
        }
    }
}

/// Driver messages mentioning a timeout surface as Timeout status
fn failure_from_message(message: String, start: Instant) -> ExecutionOutcome {
    let lower = message.to_lowercase();
    let mut outcome = ExecutionOutcome::failure(message, start.elapsed().as_millis() as u64);
    if lower.contains("timed out") || lower.contains("timeout") {
        outcome.status = ExecutionStatus::Timeout;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Result;
    use crate::platform::{DriverResponse, Screenshot, WindowInfo};
    use crate::types::{Bounds, Point};
    use std::sync::Mutex;

    /// Driver that records calls and fails on demand
    struct ScriptedDriver {
        fail_with: Option<String>,
        mouse_calls: Mutex<Vec<Point>>,
        keyboard_calls: Mutex<Vec<KeyboardInput>>,
    }

    impl ScriptedDriver {
        fn ok() -> Self {
            Self {
                fail_with: None,
                mouse_calls: Mutex::new(Vec::new()),
                keyboard_calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Self::ok()
            }
        }
    }

    impl PlatformDriver for ScriptedDriver {
        fn execute_mouse_action(&self, _: MouseGesture, at: Point) -> Result<DriverResponse> {
            self.mouse_calls.lock().unwrap().push(at);
            match &self.fail_with {
                Some(message) => Ok(DriverResponse::failed(message.clone())),
                None => Ok(DriverResponse::ok_with_confidence(0.95)),
            }
        }

        fn execute_keyboard_action(&self, input: &KeyboardInput) -> Result<DriverResponse> {
            self.keyboard_calls.lock().unwrap().push(input.clone());
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
                title: String::new(),
                app_name: String::new(),
                process_name: String::new(),
                bounds: Bounds::new(0, 0, 0, 0),
            })
        }
    }

    #[test]
    fn test_click_dispatches_to_driver() {
        let driver = Arc::new(ScriptedDriver::ok());
        let executor = ActionExecutor::new(Arc::clone(&driver) as Arc<dyn PlatformDriver>);

        let outcome = executor.execute(&Action::click(Point::new(100, 150)));

        assert!(outcome.is_success());
        assert_eq!(outcome.confidence, Some(0.95));
        assert_eq!(driver.mouse_calls.lock().unwrap()[0], Point::new(100, 150));
    }

    #[test]
    fn test_click_without_coordinates_fails() {
        let executor = ActionExecutor::new(Arc::new(ScriptedDriver::ok()));
        let outcome = executor.execute(&Action::click_text("Save"));

        assert_eq!(outcome.status, ExecutionStatus::Failed);
        assert!(outcome.message.unwrap().contains("no coordinates"));
    }

    #[test]
    fn test_driver_rejection_becomes_failure() {
        let executor = ActionExecutor::new(Arc::new(ScriptedDriver::failing("element occluded")));
        let outcome = executor.execute(&Action::click(Point::new(1, 1)));

        assert_eq!(outcome.status, ExecutionStatus::Failed);
        assert_eq!(outcome.message.as_deref(), Some("element occluded"));
    }

    #[test]
    fn test_timeout_message_maps_to_timeout_status() {
        let executor =
            ActionExecutor::new(Arc::new(ScriptedDriver::failing("operation timed out")));
        let outcome = executor.execute(&Action::click(Point::new(1, 1)));

        assert_eq!(outcome.status, ExecutionStatus::Timeout);
    }

    #[test]
    fn test_keyboard_dispatch() {
        let driver = Arc::new(ScriptedDriver::ok());
        let executor = ActionExecutor::new(Arc::clone(&driver) as Arc<dyn PlatformDriver>);

        executor.execute(&Action::key_press("ctrl+s"));
        executor.execute(&Action::type_text("hello"));

        let calls = driver.keyboard_calls.lock().unwrap();
        assert_eq!(calls[0], KeyboardInput::Combo("ctrl+s".to_string()));
        assert_eq!(calls[1], KeyboardInput::Text("hello".to_string()));
    }

    #[test]
    fn test_wait_action_succeeds() {
        let executor = ActionExecutor::new(Arc::new(ScriptedDriver::ok()));
        let outcome = executor.execute(&Action::wait(0.01));
        assert!(outcome.is_success());
    }
}
