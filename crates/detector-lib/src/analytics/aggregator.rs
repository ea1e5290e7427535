//! Rolling analytics over recorded predictions
//!
//! Holds a fixed-capacity ring buffer of recent results plus lifetime counters.
//! All state sits behind one reader/writer lock: `record` and `clear` take the
//! write side, so readers never see a counter bumped without its history entry.

use super::AttackType;
use crate::models::{AggregateStats, Label, PredictionRecord, PredictionResult};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Default number of predictions kept in history
pub const HISTORY_CAPACITY: usize = 200;

#[derive(Debug)]
struct AggregatorState {
    history: VecDeque<PredictionRecord>,
    capacity: usize,
    total_predictions: u64,
    attack_count: u64,
    normal_count: u64,
    model_usage: BTreeMap<String, u64>,
    attack_types: BTreeMap<AttackType, u64>,
}

impl AggregatorState {
    fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            total_predictions: 0,
            attack_count: 0,
            normal_count: 0,
            model_usage: BTreeMap::new(),
            attack_types: BTreeMap::new(),
        }
    }
}

/// Single source of truth for live statistics
#[derive(Debug)]
pub struct Aggregator {
    state: RwLock<AggregatorState>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: RwLock::new(AggregatorState::new(capacity.max(1))),
        }
    }

    // Every mutation finishes before its guard drops, so a poisoned lock
    // still holds consistent state.
    fn read(&self) -> RwLockReadGuard<'_, AggregatorState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AggregatorState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.read().capacity
    }

    pub fn history_len(&self) -> usize {
        self.read().history.len()
    }

    /// Append a result, evicting the oldest entry when full
    pub fn record(&self, result: PredictionResult) -> PredictionRecord {
        let mut state = self.write();

        state.total_predictions += 1;
        match result.label {
            Label::Attack => {
                state.attack_count += 1;
                if result.attack_types.is_empty() {
                    *state.attack_types.entry(AttackType::Other).or_insert(0) += 1;
                }
                for kind in &result.attack_types {
                    *state.attack_types.entry(*kind).or_insert(0) += 1;
                }
            }
            Label::Normal => state.normal_count += 1,
        }
        *state
            .model_usage
            .entry(result.model_used.to_string())
            .or_insert(0) += 1;

        let record = PredictionRecord {
            sequence: state.total_predictions,
            result,
        };
        if state.history.len() >= state.capacity {
            state.history.pop_front();
        }
        state.history.push_back(record.clone());
        record
    }

    pub fn stats(&self) -> AggregateStats {
        let state = self.read();
        let attack_rate = if state.total_predictions == 0 {
            0.0
        } else {
            state.attack_count as f64 / state.total_predictions as f64
        };
        let average_confidence = if state.history.is_empty() {
            0.0
        } else {
            state
                .history
                .iter()
                .map(|r| r.result.confidence)
                .sum::<f64>()
                / state.history.len() as f64
        };

        AggregateStats {
            total_predictions: state.total_predictions,
            attack_count: state.attack_count,
            normal_count: state.normal_count,
            attack_rate,
            average_confidence,
            history_len: state.history.len(),
            model_usage: state.model_usage.clone(),
            attack_types: state.attack_types.clone(),
        }
    }

    /// The `n` most recent records, newest first
    pub fn recent(&self, n: usize) -> Vec<PredictionRecord> {
        self.read().history.iter().rev().take(n).cloned().collect()
    }

    /// Reset counters and history. Loaded models are untouched.
    pub fn clear(&self) {
        let mut state = self.write();
        let capacity = state.capacity;
        *state = AggregatorState::new(capacity);
    }
}
