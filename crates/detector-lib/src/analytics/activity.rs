//! Operator-facing activity log

use crate::models::PredictionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

/// Default number of activity entries kept
pub const ACTIVITY_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub level: ActivityLevel,
    pub message: String,
}

/// Bounded log of notable events, newest evicting oldest
#[derive(Debug)]
pub struct ActivityLog {
    entries: RwLock<VecDeque<ActivityEntry>>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(ACTIVITY_CAPACITY)
    }
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, level: ActivityLevel, message: impl Into<String>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(ActivityEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        });
    }

    /// Log the verdict of a recorded prediction
    pub fn push_prediction(&self, result: &PredictionResult) {
        if result.label.is_attack() {
            self.push(
                ActivityLevel::Warning,
                format!(
                    "ATTACK DETECTED by {}! Types: {}. Confidence: {:.2}%",
                    result.model_used,
                    describe_types(result),
                    result.confidence * 100.0
                ),
            );
        } else {
            self.push(
                ActivityLevel::Success,
                format!(
                    "Normal traffic detected by {}. Confidence: {:.2}%",
                    result.model_used,
                    result.confidence * 100.0
                ),
            );
        }
    }

    /// The `n` most recent entries, newest first
    pub fn recent(&self, n: usize) -> Vec<ActivityEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().rev().take(n).cloned().collect()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn describe_types(result: &PredictionResult) -> String {
    if result.attack_types.is_empty() {
        return "Unknown".to_string();
    }
    result
        .attack_types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::AttackType;
    use crate::models::{Label, ModelSelector};

    #[test]
    fn test_prediction_messages() {
        let log = ActivityLog::default();
        log.push_prediction(&PredictionResult::new(Label::Attack, 0.912, ModelSelector::Ensemble));
        log.push_prediction(&PredictionResult::new(
            Label::Normal,
            0.12,
            "xgboost".parse().unwrap(),
        ));

        let entries = log.recent(10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, ActivityLevel::Success);
        assert_eq!(entries[0].message, "Normal traffic detected by xgboost. Confidence: 12.00%");
        assert_eq!(entries[1].level, ActivityLevel::Warning);
        assert_eq!(
            entries[1].message,
            "ATTACK DETECTED by ensemble! Types: Unknown. Confidence: 91.20%"
        );

        log.push_prediction(
            &PredictionResult::new(Label::Attack, 0.7, ModelSelector::Ensemble)
                .with_attack_types(vec![AttackType::DoS, AttackType::PortScan]),
        );
        assert_eq!(
            log.recent(1)[0].message,
            "ATTACK DETECTED by ensemble! Types: DoS, Port_Scan. Confidence: 70.00%"
        );
    }

    #[test]
    fn test_bounded_and_clearable() {
        let log = ActivityLog::new(3);
        for i in 0..5 {
            log.push(ActivityLevel::Info, format!("event {}", i));
        }
        let messages: Vec<String> = log.recent(10).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["event 4", "event 3", "event 2"]);

        log.clear();
        assert!(log.recent(10).is_empty());
    }
}
