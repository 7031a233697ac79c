//! Environment detection
//!
//! Builds an [`ApplicationContext`] from the raw window snapshot supplied
//! by the platform collaborator. Classification runs an ordered lookup:
//! process-name rules first, window-title keywords as fallback. Consecutive
//! detections are compared and significant changes are published to
//! registered listeners.

use crate::context::types::{
    ApplicationContext, ChangedField, ContextChange, ContextType, UiState,
};
use crate::errors::Result;
use crate::platform::{PlatformDriver, WindowInfo};
use crate::telemetry::{EngineTelemetry, TelemetryEvent};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Confidence weights for detection scoring
const WEIGHT_KNOWN_TYPE: f64 = 0.3;
const WEIGHT_KNOWN_UI_STATE: f64 = 0.2;
const WEIGHT_TITLE_QUALITY: f64 = 0.25;
const WEIGHT_PROCESS_QUALITY: f64 = 0.25;

/// Significance weights for change scoring
const SIG_APP_SWITCH: f64 = 0.5;
const SIG_TYPE_CHANGE: f64 = 0.3;
const SIG_UI_STATE_CHANGE: f64 = 0.2;
const SIG_TITLE_CHANGE: f64 = 0.1;

type Listener = Box<dyn Fn(&ContextChange) + Send + Sync>;

/// Detects the live environment and tracks changes between detections
pub struct ContextDetector {
    driver: Arc<dyn PlatformDriver>,
    process_rules: Vec<(&'static str, ContextType)>,
    title_rules: Vec<(&'static str, ContextType)>,
    last: Option<ApplicationContext>,
    stable_since: Instant,
    listeners: Vec<Listener>,
    telemetry: Option<EngineTelemetry>,
}

impl ContextDetector {
    pub fn new(driver: Arc<dyn PlatformDriver>) -> Self {
        Self {
            driver,
            process_rules: default_process_rules(),
            title_rules: default_title_rules(),
            last: None,
            stable_since: Instant::now(),
            listeners: Vec::new(),
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: EngineTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Register a context-change listener
    pub fn add_listener(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    /// Detect the current environment and publish any change.
    ///
    /// The returned snapshot carries a one-deep back-reference to the
    /// previous detection.
    pub fn detect(&mut self) -> Result<ApplicationContext> {
        let window = self.driver.active_window_info()?;
        let mut context = self.build_context(&window);

        if let Some(prev) = &self.last {
            context.previous = Some(Box::new(prev.detached()));

            let changed = diff_contexts(prev, &context);
            if !changed.is_empty() {
                self.stable_since = Instant::now();
                let change = ContextChange {
                    previous: prev.detached(),
                    current: context.detached(),
                    significance: change_significance(&changed),
                    changed,
                    occurred_at: Utc::now(),
                };
                self.publish(&change);
            }
        }

        self.last = Some(context.detached());
        Ok(context)
    }

    /// Most recent detection, if any
    pub fn last_context(&self) -> Option<&ApplicationContext> {
        self.last.as_ref()
    }

    /// Seconds the environment has been unchanged
    pub fn stable_secs(&self) -> f64 {
        self.stable_since.elapsed().as_secs_f64()
    }

    fn build_context(&self, window: &WindowInfo) -> ApplicationContext {
        let context_type = self.classify(window);
        let ui_state = detect_ui_state(&window.title);
        let confidence = detection_confidence(window, context_type, ui_state);

        debug!(
            app = %window.app_name,
            ?context_type,
            ?ui_state,
            confidence,
            "context detected"
        );

        ApplicationContext {
            app_name: window.app_name.clone(),
            process_name: window.process_name.clone(),
            window_title: window.title.clone(),
            window_bounds: window.bounds,
            context_type,
            ui_state,
            confidence,
            detected_at: Utc::now(),
            previous: None,
        }
    }

    /// Ordered lookup: process table first, title keywords as fallback
    fn classify(&self, window: &WindowInfo) -> ContextType {
        let process = window.process_name.to_lowercase();
        for (pattern, context_type) in &self.process_rules {
            if process.contains(pattern) {
                return *context_type;
            }
        }

        let title = window.title.to_lowercase();
        for (keyword, context_type) in &self.title_rules {
            if title.contains(keyword) {
                return *context_type;
            }
        }

        ContextType::Unknown
    }

    fn publish(&self, change: &ContextChange) {
        debug!(
            from = %change.previous.app_name,
            to = %change.current.app_name,
            significance = change.significance,
            "context change"
        );

        if let Some(telemetry) = &self.telemetry {
            telemetry.record(TelemetryEvent::ContextChanged {
                from_app: change.previous.app_name.clone(),
                to_app: change.current.app_name.clone(),
                significance: change.significance,
                timestamp: Instant::now(),
            });
        }

        for listener in &self.listeners {
            listener(change);
        }
    }
}

fn default_process_rules() -> Vec<(&'static str, ContextType)> {
    vec![
        ("firefox", ContextType::Browser),
        ("chrome", ContextType::Browser),
        ("chromium", ContextType::Browser),
        ("safari", ContextType::Browser),
        ("msedge", ContextType::Browser),
        ("code", ContextType::Editor),
        ("sublime", ContextType::Editor),
        ("notepad", ContextType::Editor),
        ("vim", ContextType::Editor),
        ("idea", ContextType::Editor),
        ("terminal", ContextType::Terminal),
        ("alacritty", ContextType::Terminal),
        ("konsole", ContextType::Terminal),
        ("wezterm", ContextType::Terminal),
        ("cmd", ContextType::Terminal),
        ("powershell", ContextType::Terminal),
        ("explorer", ContextType::FileManager),
        ("nautilus", ContextType::FileManager),
        ("finder", ContextType::FileManager),
        ("winword", ContextType::Office),
        ("excel", ContextType::Office),
        ("libreoffice", ContextType::Office),
        ("vlc", ContextType::Media),
        ("spotify", ContextType::Media),
        ("systemsettings", ContextType::System),
        ("control", ContextType::System),
    ]
}

fn default_title_rules() -> Vec<(&'static str, ContextType)> {
    vec![
        ("mozilla firefox", ContextType::Browser),
        ("google chrome", ContextType::Browser),
        ("visual studio code", ContextType::Editor),
        ("- vim", ContextType::Editor),
        ("terminal", ContextType::Terminal),
        ("file manager", ContextType::FileManager),
        ("settings", ContextType::System),
    ]
}

fn detect_ui_state(title: &str) -> UiState {
    let title = title.to_lowercase();
    if title.contains("save as")
        || title.contains("open file")
        || title.contains("confirm")
        || title.contains("preferences")
        || title.contains("dialog")
    {
        UiState::Dialog
    } else if title.contains("loading") || title.ends_with("...") {
        UiState::Loading
    } else if title.is_empty() {
        UiState::Unknown
    } else {
        UiState::Normal
    }
}

/// Weighted sum over detection quality signals, clamped to [0, 1]
fn detection_confidence(window: &WindowInfo, context_type: ContextType, ui_state: UiState) -> f64 {
    let known_type = if context_type != ContextType::Unknown {
        1.0
    } else {
        0.0
    };
    let known_ui = if ui_state != UiState::Unknown { 1.0 } else { 0.0 };

    let score = WEIGHT_KNOWN_TYPE * known_type
        + WEIGHT_KNOWN_UI_STATE * known_ui
        + WEIGHT_TITLE_QUALITY * title_quality(&window.title)
        + WEIGHT_PROCESS_QUALITY * process_quality(&window.process_name);

    score.clamp(0.0, 1.0)
}

fn title_quality(title: &str) -> f64 {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let alphanumeric = trimmed.chars().filter(|c| c.is_alphanumeric()).count();
    if alphanumeric == 0 {
        return 0.2;
    }
    if trimmed.len() < 4 {
        0.5
    } else {
        1.0
    }
}

fn process_quality(process: &str) -> f64 {
    let trimmed = process.trim();
    if trimmed.is_empty() {
        0.0
    } else if trimmed.len() < 3 {
        0.5
    } else {
        1.0
    }
}

/// A change fires when process name, type, UI state or title differ
fn diff_contexts(prev: &ApplicationContext, current: &ApplicationContext) -> Vec<ChangedField> {
    let mut changed = Vec::new();
    if prev.process_name != current.process_name {
        changed.push(ChangedField::Application);
    }
    if prev.context_type != current.context_type {
        changed.push(ChangedField::ContextType);
    }
    if prev.ui_state != current.ui_state {
        changed.push(ChangedField::UiState);
    }
    if prev.window_title != current.window_title {
        changed.push(ChangedField::Title);
    }
    changed
}

fn change_significance(changed: &[ChangedField]) -> f64 {
    let mut significance = 0.0;
    for field in changed {
        significance += match field {
            ChangedField::Application => SIG_APP_SWITCH,
            ChangedField::ContextType => SIG_TYPE_CHANGE,
            ChangedField::UiState => SIG_UI_STATE_CHANGE,
            ChangedField::Title => SIG_TITLE_CHANGE,
        };
    }
    significance.min(1.0)
}
