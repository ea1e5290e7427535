//! Core data models for the detector

use crate::analytics::AttackType;
use crate::error::PredictionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Identifier used to request the combined vote of every loaded model
pub const ENSEMBLE_ID: &str = "ensemble";

/// Number of features each model expects in the stock deployment
pub const STOCK_FEATURE_COUNT: usize = 49;

/// Concrete classifiers known to the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelId {
    RandomForest,
    DecisionTree,
    #[serde(rename = "xgboost")]
    XgBoost,
    #[serde(rename = "lightgbm")]
    LightGbm,
}

impl ModelId {
    /// All known models in ensemble order
    pub const ALL: [ModelId; 4] = [
        ModelId::RandomForest,
        ModelId::DecisionTree,
        ModelId::XgBoost,
        ModelId::LightGbm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::RandomForest => "random_forest",
            ModelId::DecisionTree => "decision_tree",
            ModelId::XgBoost => "xgboost",
            ModelId::LightGbm => "lightgbm",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = PredictionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| PredictionError::unknown_model(s, ModelId::ALL))
    }
}

/// Either a single concrete model or the ensemble of all loaded models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelSelector {
    Single(ModelId),
    Ensemble,
}

impl ModelSelector {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSelector::Single(id) => id.as_str(),
            ModelSelector::Ensemble => ENSEMBLE_ID,
        }
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSelector {
    type Err = PredictionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ENSEMBLE_ID {
            Ok(ModelSelector::Ensemble)
        } else {
            s.parse().map(ModelSelector::Single)
        }
    }
}

impl TryFrom<String> for ModelSelector {
    type Error = PredictionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModelSelector> for String {
    fn from(selector: ModelSelector) -> Self {
        selector.as_str().to_string()
    }
}

/// Binary verdict for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    Normal,
    Attack,
}

impl Label {
    pub fn is_attack(&self) -> bool {
        matches!(self, Label::Attack)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Normal => f.write_str("Normal"),
            Label::Attack => f.write_str("Attack"),
        }
    }
}

/// A feature value as submitted by a caller, before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Null,
    /// Arrays and objects; never valid, kept so validation can name the key
    Other(serde_json::Value),
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

/// Unvalidated feature map submitted for classification
pub type RawFeatureMap = HashMap<String, RawValue>;

/// Ordered list of feature names a model requires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// Validated feature values, ordered exactly as the schema they were checked against
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Only the validator builds vectors, so names and values always line up
    pub(crate) fn from_parts(names: Vec<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values[idx])
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Outcome of one completed inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: Label,
    /// Probability mass assigned to Attack, in [0, 1]
    pub confidence: f64,
    pub model_used: ModelSelector,
    /// Traffic patterns matched by the submitted features
    #[serde(default)]
    pub attack_types: Vec<AttackType>,
    pub timestamp: DateTime<Utc>,
}

impl PredictionResult {
    pub fn new(label: Label, confidence: f64, model_used: ModelSelector) -> Self {
        Self {
            label,
            confidence,
            model_used,
            attack_types: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_attack_types(mut self, attack_types: Vec<AttackType>) -> Self {
        self.attack_types = attack_types;
        self
    }
}

/// A prediction as stored in the rolling history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// 1-based position since the last clear, used as the trend chart x axis
    pub sequence: u64,
    #[serde(flatten)]
    pub result: PredictionResult,
}

/// Live statistics derived from recorded predictions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_predictions: u64,
    pub attack_count: u64,
    pub normal_count: u64,
    pub attack_rate: f64,
    /// Mean confidence over the predictions currently held in history
    pub average_confidence: f64,
    pub history_len: usize,
    pub model_usage: BTreeMap<String, u64>,
    /// Pattern counts over Attack verdicts; `Other` when none matched
    pub attack_types: BTreeMap<AttackType, u64>,
}
