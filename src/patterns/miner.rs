//! Pattern mining over the rolling activity history
//!
//! A periodic pass runs four independent detectors over a bounded window of
//! recorded events: repetitive actions, fixed-length workflows, context-switch
//! paths and hour-of-day habits. Detected patterns are scored for automation
//! potential and kept for the advisor and the orchestrator's recommendations.

use crate::patterns::types::{ActivityEvent, ActivityKind, PatternKind, UserPattern};
use chrono::{DateTime, Timelike, Utc};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Mining thresholds
#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Rolling history capacity
    pub history_cap: usize,
    /// Recorded events between mining passes
    pub mine_interval: usize,
    /// Minimum occurrences for a repetitive group
    pub min_repetitions: usize,
    /// Inter-occurrence gap counted as "rapid", seconds
    pub rapid_gap_secs: f64,
    /// Fraction of gaps that must be rapid
    pub rapid_gap_fraction: f64,
    /// Sliding window length for workflow comparison
    pub workflow_window: usize,
    /// Per-slot similarity required between workflow windows
    pub workflow_similarity: f64,
    /// Share of one action type that flags an hour bucket
    pub hourly_share: f64,
    /// Minimum events in an hour bucket before it is considered
    pub hourly_min_events: usize,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            history_cap: 1000,
            mine_interval: 50,
            min_repetitions: 3,
            rapid_gap_secs: 60.0,
            rapid_gap_fraction: 0.7,
            workflow_window: 10,
            workflow_similarity: 0.7,
            hourly_share: 0.6,
            hourly_min_events: 5,
        }
    }
}

/// Mines repeating structures from recorded actions and context changes
pub struct PatternMiner {
    config: MinerConfig,
    history: VecDeque<ActivityEvent>,
    patterns: HashMap<String, UserPattern>,
    events_since_mine: usize,
}

impl PatternMiner {
    pub fn new() -> Self {
        Self::with_config(MinerConfig::default())
    }

    pub fn with_config(config: MinerConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
            patterns: HashMap::new(),
            events_since_mine: 0,
        }
    }

    /// Record one event; triggers a mining pass every `mine_interval` events
    pub fn record(&mut self, event: ActivityEvent) {
        self.history.push_back(event);
        while self.history.len() > self.config.history_cap {
            self.history.pop_front();
        }

        self.events_since_mine += 1;
        if self.events_since_mine >= self.config.mine_interval {
            self.mine();
        }
    }

    /// Run all four detectors over the current history
    pub fn mine(&mut self) {
        self.events_since_mine = 0;

        let found = self
            .detect_repetitive()
            .into_iter()
            .chain(self.detect_workflows())
            .chain(self.detect_context_switching())
            .chain(self.detect_time_based());

        let mut upserts = 0usize;
        for pattern in found {
            upserts += 1;
            self.upsert(pattern);
        }
        debug!(
            history = self.history.len(),
            patterns = self.patterns.len(),
            upserts,
            "mining pass complete"
        );
    }

    /// All patterns mined so far
    pub fn patterns(&self) -> Vec<&UserPattern> {
        self.patterns.values().collect()
    }

    /// Patterns worth suggesting for automation, best first
    pub fn automation_candidates(&self) -> Vec<&UserPattern> {
        let mut candidates: Vec<_> = self
            .patterns
            .values()
            .filter(|p| p.is_highly_automatable())
            .collect();
        candidates.sort_by(|a, b| {
            b.automation_potential
                .partial_cmp(&a.automation_potential)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Patterns are updated, never deleted within a session
    fn upsert(&mut self, pattern: UserPattern) {
        match self.patterns.get_mut(&pattern.key) {
            Some(existing) => {
                existing.frequency = pattern.frequency;
                existing.automation_potential = pattern.automation_potential;
                existing.efficiency = pattern.efficiency;
                existing.confidence = pattern.confidence;
                existing.last_seen = Utc::now();
            }
            None => {
                self.patterns.insert(pattern.key.clone(), pattern);
            }
        }
    }

    /// (a) Actions grouped by a coarse similarity key, flagged when they
    /// repeat rapidly
    fn detect_repetitive(&self) -> Vec<UserPattern> {
        let mut groups: HashMap<String, Vec<&ActivityEvent>> = HashMap::new();

        for event in &self.history {
            if let ActivityKind::Action {
                kind,
                coordinates,
                app,
                text,
                ..
            } = &event.kind
            {
                let bucket = coordinates
                    .map(|p| format!("{}:{}", p.x / 100, p.y / 100))
                    .unwrap_or_default();
                let snippet: String = text
                    .as_deref()
                    .unwrap_or("")
                    .chars()
                    .take(12)
                    .collect();
                let key = format!("{}|{}|{}|{}", kind, bucket, app, snippet);
                groups.entry(key).or_default().push(event);
            }
        }

        let mut patterns = Vec::new();
        for (key, events) in groups {
            if events.len() < self.config.min_repetitions {
                continue;
            }

            let gaps = inter_occurrence_gaps(&events);
            let rapid = gaps
                .iter()
                .filter(|g| **g < self.config.rapid_gap_secs)
                .count();
            if gaps.is_empty()
                || (rapid as f64 / gaps.len() as f64) < self.config.rapid_gap_fraction
            {
                continue;
            }

            let apps: Vec<&str> = events
                .iter()
                .filter_map(|e| match &e.kind {
                    ActivityKind::Action { app, .. } => Some(app.as_str()),
                    _ => None,
                })
                .collect();
            let kinds: Vec<&str> = events
                .iter()
                .filter_map(|e| match &e.kind {
                    ActivityKind::Action { kind, .. } => Some(kind.as_str()),
                    _ => None,
                })
                .collect();

            let mut pattern = UserPattern::new(
                PatternKind::Repetitive,
                format!("repetitive|{}", key),
                format!("{} repeated {} times", key, events.len()),
            );
            pattern.frequency = events.len();
            pattern.automation_potential =
                automation_potential(events.len(), &apps, &kinds);
            pattern.efficiency = efficiency_from_gaps(&gaps);
            pattern.confidence = (events.len() as f64 / 10.0).min(1.0);
            patterns.push(pattern);
        }
        patterns
    }

    /// (b) Fixed-length sliding windows compared slot-by-slot
    fn detect_workflows(&self) -> Vec<UserPattern> {
        let window = self.config.workflow_window;
        let actions: Vec<(&str, &str)> = self
            .history
            .iter()
            .filter_map(|e| match &e.kind {
                ActivityKind::Action { kind, app, .. } => Some((kind.as_str(), app.as_str())),
                _ => None,
            })
            .collect();

        if actions.len() < window * 2 {
            return Vec::new();
        }

        let mut clusters: HashMap<usize, usize> = HashMap::new();
        let mut claimed = vec![false; actions.len()];

        for i in 0..=(actions.len() - window) {
            if claimed[i] {
                continue;
            }
            for j in (i + window)..=(actions.len() - window) {
                if claimed[j] {
                    continue;
                }
                let matching = (0..window)
                    .filter(|k| actions[i + *k].0 == actions[j + *k].0)
                    .count();
                if (matching as f64 / window as f64) >= self.config.workflow_similarity {
                    *clusters.entry(i).or_insert(1) += 1;
                    claimed[j] = true;
                }
            }
        }

        let mut patterns = Vec::new();
        for (start, count) in clusters {
            let kinds: Vec<&str> = actions[start..start + window].iter().map(|a| a.0).collect();
            let apps: Vec<&str> = actions[start..start + window].iter().map(|a| a.1).collect();
            let signature = kinds.join(",");

            let mut pattern = UserPattern::new(
                PatternKind::Workflow,
                format!("workflow|{}", signature),
                format!("workflow of {} steps seen {} times", window, count),
            );
            pattern.frequency = count;
            pattern.automation_potential = automation_potential(count, &apps, &kinds);
            pattern.efficiency = 0.5;
            pattern.confidence = (count as f64 / 5.0).min(1.0);
            patterns.push(pattern);
        }
        patterns
    }

    /// (c) Three-switch context-change windows grouped by app path
    fn detect_context_switching(&self) -> Vec<UserPattern> {
        let switches: Vec<(&str, &str)> = self
            .history
            .iter()
            .filter_map(|e| match &e.kind {
                ActivityKind::ContextSwitch { from_app, to_app } => {
                    Some((from_app.as_str(), to_app.as_str()))
                }
                _ => None,
            })
            .collect();

        if switches.len() < 3 {
            return Vec::new();
        }

        let mut groups: HashMap<String, usize> = HashMap::new();
        for window in switches.windows(3) {
            let path = format!(
                "{}>{}>{}>{}",
                window[0].0, window[0].1, window[1].1, window[2].1
            );
            *groups.entry(path).or_insert(0) += 1;
        }

        let mut patterns = Vec::new();
        for (path, count) in groups {
            if count < 2 {
                continue;
            }
            let mut pattern = UserPattern::new(
                PatternKind::ContextSwitch,
                format!("context|{}", path),
                format!("app path {} repeated {} times", path, count),
            );
            pattern.frequency = count;
            pattern.automation_potential = (count as f64 / 10.0).min(1.0) * 0.6;
            pattern.efficiency = 0.4;
            pattern.confidence = (count as f64 / 5.0).min(1.0);
            patterns.push(pattern);
        }
        patterns
    }

    /// (d) Hour-of-day buckets dominated by one action type
    fn detect_time_based(&self) -> Vec<UserPattern> {
        let mut hours: HashMap<u32, HashMap<&str, usize>> = HashMap::new();

        for event in &self.history {
            if let ActivityKind::Action { kind, .. } = &event.kind {
                let hour = event.timestamp.hour();
                *hours.entry(hour).or_default().entry(kind.as_str()).or_insert(0) += 1;
            }
        }

        let mut patterns = Vec::new();
        for (hour, kinds) in hours {
            let total: usize = kinds.values().sum();
            if total < self.config.hourly_min_events {
                continue;
            }
            for (kind, count) in &kinds {
                let share = *count as f64 / total as f64;
                if share > self.config.hourly_share {
                    let mut pattern = UserPattern::new(
                        PatternKind::TimeBased,
                        format!("hourly|{}|{}", hour, kind),
                        format!("{} dominates hour {:02}:00 ({:.0}%)", kind, hour, share * 100.0),
                    );
                    pattern.frequency = *count;
                    pattern.automation_potential = share * 0.5;
                    pattern.efficiency = 0.5;
                    pattern.confidence = share;
                    patterns.push(pattern);
                }
            }
        }
        patterns
    }
}

impl Default for PatternMiner {
    fn default() -> Self {
        Self::new()
    }
}

fn inter_occurrence_gaps(events: &[&ActivityEvent]) -> Vec<f64> {
    let mut timestamps: Vec<DateTime<Utc>> = events.iter().map(|e| e.timestamp).collect();
    timestamps.sort();
    timestamps
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_milliseconds() as f64 / 1000.0)
        .collect()
}

/// Combines repetition count, context homogeneity and action simplicity
fn automation_potential(occurrences: usize, apps: &[&str], kinds: &[&str]) -> f64 {
    let repetition = (occurrences as f64 / 10.0).min(1.0);

    let homogeneity = if apps.is_empty() {
        0.0
    } else {
        let unique: std::collections::HashSet<&&str> = apps.iter().collect();
        1.0 / unique.len() as f64
    };

    let simplicity = if kinds.is_empty() {
        0.0
    } else {
        kinds.iter().map(|k| kind_simplicity(k)).sum::<f64>() / kinds.len() as f64
    };

    (repetition * 0.4 + homogeneity * 0.3 + simplicity * 0.3).clamp(0.0, 1.0)
}

fn kind_simplicity(kind: &str) -> f64 {
    match kind {
        "click" | "double_click" | "right_click" | "key_press" => 1.0,
        "scroll" => 0.8,
        "type_text" => 0.7,
        "wait" => 0.9,
        _ => 0.5,
    }
}

/// Rapid bursts score as more efficient to automate
fn efficiency_from_gaps(gaps: &[f64]) -> f64 {
    if gaps.is_empty() {
        return 0.0;
    }
    let avg = gaps.iter().sum::<f64>() / gaps.len() as f64;
    (1.0 / (1.0 + avg / 60.0)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    fn click_event(x: i32, y: i32, app: &str) -> ActivityEvent {
        ActivityEvent::action("click", Some(Point::new(x, y)), app, None, true)
    }

    #[test]
    fn test_repetitive_detection() {
        let mut miner = PatternMiner::new();
        for _ in 0..5 {
            miner.record(click_event(120, 340, "Firefox"));
        }
        miner.mine();

        let patterns = miner.patterns();
        assert!(patterns
            .iter()
            .any(|p| p.kind == PatternKind::Repetitive && p.frequency >= 5));
    }

    #[test]
    fn test_nearby_clicks_share_coordinate_bucket() {
        let mut miner = PatternMiner::new();
        // All inside the same 100px bucket
        miner.record(click_event(110, 310, "Firefox"));
        miner.record(click_event(145, 330, "Firefox"));
        miner.record(click_event(190, 395, "Firefox"));
        miner.mine();

        assert!(miner
            .patterns()
            .iter()
            .any(|p| p.kind == PatternKind::Repetitive));
    }

    #[test]
    fn test_too_few_occurrences_not_flagged() {
        let mut miner = PatternMiner::new();
        miner.record(click_event(120, 340, "Firefox"));
        miner.record(click_event(120, 340, "Firefox"));
        miner.mine();

        assert!(miner.patterns().is_empty());
    }

    #[test]
    fn test_workflow_detection() {
        let mut miner = PatternMiner::new();
        let sequence = [
            "click", "type_text", "key_press", "click", "scroll", "click", "type_text",
            "key_press", "click", "wait",
        ];
        // Repeat the same 10-step workflow three times
        for _ in 0..3 {
            for kind in &sequence {
                miner.record(ActivityEvent::action(kind, None, "Code", None, true));
            }
        }
        miner.mine();

        assert!(miner
            .patterns()
            .iter()
            .any(|p| p.kind == PatternKind::Workflow));
    }

    #[test]
    fn test_context_switch_path_detection() {
        let mut miner = PatternMiner::new();
        for _ in 0..3 {
            miner.record(ActivityEvent::context_switch("Firefox", "Code"));
            miner.record(ActivityEvent::context_switch("Code", "Terminal"));
            miner.record(ActivityEvent::context_switch("Terminal", "Firefox"));
        }
        miner.mine();

        assert!(miner
            .patterns()
            .iter()
            .any(|p| p.kind == PatternKind::ContextSwitch));
    }

    #[test]
    fn test_time_based_detection() {
        let mut miner = PatternMiner::new();
        // Six clicks in the current hour dominate the bucket
        for _ in 0..6 {
            miner.record(click_event(10, 10, "Firefox"));
        }
        miner.mine();

        assert!(miner
            .patterns()
            .iter()
            .any(|p| p.kind == PatternKind::TimeBased));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut miner = PatternMiner::with_config(MinerConfig {
            history_cap: 20,
            mine_interval: 1000,
            ..MinerConfig::default()
        });
        for i in 0..50 {
            miner.record(click_event(i, i, "Firefox"));
        }
        assert_eq!(miner.history_len(), 20);
    }

    #[test]
    fn test_mining_triggered_by_interval() {
        let mut miner = PatternMiner::with_config(MinerConfig {
            mine_interval: 5,
            ..MinerConfig::default()
        });
        for _ in 0..5 {
            miner.record(click_event(120, 340, "Firefox"));
        }
        // mine() ran automatically on the fifth record
        assert!(!miner.patterns().is_empty());
    }

    #[test]
    fn test_patterns_updated_not_duplicated() {
        let mut miner = PatternMiner::new();
        for _ in 0..4 {
            miner.record(click_event(120, 340, "Firefox"));
        }
        miner.mine();

        for _ in 0..4 {
            miner.record(click_event(120, 340, "Firefox"));
        }
        miner.mine();

        // The second pass updates the existing repetitive pattern in
        // place; other detectors may add patterns of their own kinds
        let patterns = miner.patterns();
        let repetitive: Vec<_> = patterns
            .iter()
            .filter(|p| p.kind == PatternKind::Repetitive)
            .collect();
        assert_eq!(repetitive.len(), 1);
        assert!(repetitive[0].frequency >= 8);
    }

    #[test]
    fn test_automation_potential_scoring() {
        let apps = ["Firefox", "Firefox", "Firefox"];
        let kinds = ["click", "click", "click"];
        let homogeneous = automation_potential(10, &apps, &kinds);

        let mixed_apps = ["Firefox", "Code", "Terminal"];
        let heterogeneous = automation_potential(10, &mixed_apps, &kinds);

        assert!(homogeneous > heterogeneous);
        assert!(homogeneous <= 1.0);
    }

    #[test]
    fn test_automation_candidates_sorted() {
        let mut miner = PatternMiner::new();
        for _ in 0..10 {
            miner.record(click_event(120, 340, "Firefox"));
        }
        for _ in 0..10 {
            miner.record(ActivityEvent::action(
                "type_text",
                Some(Point::new(500, 500)),
                "Code",
                Some("hello".to_string()),
                true,
            ));
        }
        miner.mine();

        let candidates = miner.automation_candidates();
        for pair in candidates.windows(2) {
            assert!(pair[0].automation_potential >= pair[1].automation_potential);
        }
    }
}
