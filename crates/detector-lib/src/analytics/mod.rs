//! Live analytics over recorded predictions
//!
//! This module provides:
//! - A rolling history of recent predictions with derived statistics
//! - A bounded activity log for operators
//! - Rule-based attack pattern tags

mod activity;
mod aggregator;
mod attack_types;

pub use activity::{ActivityEntry, ActivityLevel, ActivityLog, ACTIVITY_CAPACITY};
pub use aggregator::{Aggregator, HISTORY_CAPACITY};
pub use attack_types::{detect_attack_types, AttackType};
