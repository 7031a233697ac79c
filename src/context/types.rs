//! Context engine type definitions

use crate::types::Bounds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse classification of the active application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    Browser,
    Editor,
    Terminal,
    FileManager,
    Office,
    Media,
    System,
    Unknown,
}

impl ContextType {
    pub fn name(&self) -> &'static str {
        match self {
            ContextType::Browser => "browser",
            ContextType::Editor => "editor",
            ContextType::Terminal => "terminal",
            ContextType::FileManager => "file_manager",
            ContextType::Office => "office",
            ContextType::Media => "media",
            ContextType::System => "system",
            ContextType::Unknown => "unknown",
        }
    }
}

/// Coarse UI state of the active window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiState {
    Normal,
    Dialog,
    Loading,
    Menu,
    Fullscreen,
    Unknown,
}

/// Snapshot of the live environment at one detection call.
///
/// Immutable once built; successive snapshots are chained through
/// `previous` (one level deep, older history is pruned).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationContext {
    pub app_name: String,
    pub process_name: String,
    pub window_title: String,
    pub window_bounds: Bounds,
    pub context_type: ContextType,
    pub ui_state: UiState,
    /// Detection confidence in [0, 1]
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
    #[serde(skip)]
    pub previous: Option<Box<ApplicationContext>>,
}

impl ApplicationContext {
    /// Snapshot without its back-reference, for chaining
    pub fn detached(&self) -> ApplicationContext {
        let mut copy = self.clone();
        copy.previous = None;
        copy
    }
}

/// Which fields differed between two consecutive detections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangedField {
    Application,
    ContextType,
    UiState,
    Title,
}

/// A detected change between consecutive environment snapshots
#[derive(Debug, Clone)]
pub struct ContextChange {
    pub previous: ApplicationContext,
    pub current: ApplicationContext,
    pub changed: Vec<ChangedField>,
    /// Weighted change significance in [0, 1]
    pub significance: f64,
    pub occurred_at: DateTime<Utc>,
}

impl ContextChange {
    pub fn is_app_switch(&self) -> bool {
        self.changed.contains(&ChangedField::Application)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bounds;

    fn context(app: &str) -> ApplicationContext {
        ApplicationContext {
            app_name: app.to_string(),
            process_name: app.to_lowercase(),
            window_title: format!("{} - main", app),
            window_bounds: Bounds::new(0, 0, 1280, 800),
            context_type: ContextType::Browser,
            ui_state: UiState::Normal,
            confidence: 0.9,
            detected_at: Utc::now(),
            previous: None,
        }
    }

    #[test]
    fn test_detached_prunes_chain() {
        let mut second = context("Firefox");
        second.previous = Some(Box::new(context("Code")));

        let detached = second.detached();
        assert!(detached.previous.is_none());
        assert_eq!(detached.app_name, "Firefox");
    }

    #[test]
    fn test_context_type_names() {
        assert_eq!(ContextType::FileManager.name(), "file_manager");
        assert_eq!(ContextType::Unknown.name(), "unknown");
    }
}
