//! External collaborator interfaces
//!
//! The engine does not inject input, capture screens or walk accessibility
//! trees itself; the embedding application supplies implementations of
//! these traits. All calls are synchronous and return a result the engine
//! converts into failure outcomes rather than propagating panics.

use crate::errors::Result;
use crate::types::{Bounds, Point};

/// Mouse action kinds the platform layer must support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

/// Mouse gesture dispatched to the platform layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MouseGesture {
    Click { button: MouseButton, double: bool },
    Scroll { amount: i32 },
}

/// Keyboard input dispatched to the platform layer
#[derive(Debug, Clone, PartialEq)]
pub enum KeyboardInput {
    /// Key combination such as "ctrl+s"
    Combo(String),
    /// Literal text entry
    Text(String),
}

/// Response from a platform input call
#[derive(Debug, Clone, PartialEq)]
pub struct DriverResponse {
    pub success: bool,
    /// Platform-reported confidence, when available
    pub confidence: Option<f64>,
    pub message: Option<String>,
}

impl DriverResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            confidence: None,
            message: None,
        }
    }

    pub fn ok_with_confidence(confidence: f64) -> Self {
        Self {
            success: true,
            confidence: Some(confidence),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            confidence: None,
            message: Some(message.into()),
        }
    }
}

/// Raw snapshot of the active window, as reported by the OS
#[derive(Debug, Clone, PartialEq)]
pub struct WindowInfo {
    pub title: String,
    pub app_name: String,
    pub process_name: String,
    pub bounds: Bounds,
}

/// Captured screen image; the engine only threads it through, decoding is
/// the element detector's concern
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// OS input injection and window/screen capture
pub trait PlatformDriver: Send + Sync {
    fn execute_mouse_action(&self, gesture: MouseGesture, at: Point) -> Result<DriverResponse>;
    fn execute_keyboard_action(&self, input: &KeyboardInput) -> Result<DriverResponse>;
    fn take_screenshot(&self) -> Result<Screenshot>;
    fn active_window_info(&self) -> Result<WindowInfo>;
}

/// A UI element located on screen by the detection collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedElement {
    pub bounds: Bounds,
    pub text: Option<String>,
    /// Element role, e.g. "button", "text_field", "link"
    pub role: String,
    pub confidence: f64,
}

impl DetectedElement {
    pub fn center(&self) -> Point {
        self.bounds.center()
    }
}

/// Visual/OCR/DOM element detection
pub trait ElementDetector: Send + Sync {
    /// Locate an element by visible text; `fuzzy` permits approximate matches
    fn find_element_by_text(&self, text: &str, fuzzy: bool) -> Result<Option<DetectedElement>>;

    /// All interactive elements intersecting the region
    fn elements_in_region(&self, region: Bounds) -> Result<Vec<DetectedElement>>;
}
