//! Model registry
//!
//! Maps model identifiers to loaded scorers. The registry starts empty and
//! becomes ready exactly once, when the model store installs its handles.

use super::Scorer;
use crate::error::{PredictionError, RegistryError};
use crate::models::{FeatureSchema, FeatureVector, ModelId, ModelSelector};
use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

/// One loaded classifier and the schema it scores against
#[derive(Clone)]
pub struct ModelHandle {
    id: ModelId,
    schema: FeatureSchema,
    scorer: Arc<dyn Scorer>,
    in_flight: Arc<AtomicUsize>,
}

impl ModelHandle {
    pub fn new(id: ModelId, schema: FeatureSchema, scorer: impl Scorer + 'static) -> Self {
        Self {
            id,
            schema,
            scorer: Arc::new(scorer),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Probability of Attack for an already validated vector
    pub fn score(&self, features: &FeatureVector) -> Result<f64> {
        self.scorer.score(features)
    }

    pub fn scorer_kind(&self) -> &'static str {
        self.scorer.kind()
    }

    /// Scoring calls still running, including ones whose caller timed out
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Count a scoring call until the returned guard drops
    pub(crate) fn begin_scoring(&self) -> ScoringGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        ScoringGuard(self.in_flight.clone())
    }
}

/// Keeps a scoring call counted against its model while alive
pub(crate) struct ScoringGuard(Arc<AtomicUsize>);

impl Drop for ScoringGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("id", &self.id)
            .field("features", &self.schema.len())
            .field("scorer", &self.scorer.kind())
            .finish()
    }
}

/// What a model identifier resolved to
#[derive(Debug, Clone)]
pub enum Resolved {
    Single(ModelHandle),
    /// Every loaded handle in declaration order
    Ensemble(Vec<ModelHandle>),
}

impl Resolved {
    pub fn selector(&self) -> ModelSelector {
        match self {
            Resolved::Single(handle) => ModelSelector::Single(handle.id()),
            Resolved::Ensemble(_) => ModelSelector::Ensemble,
        }
    }

    pub fn handles(&self) -> &[ModelHandle] {
        match self {
            Resolved::Single(handle) => std::slice::from_ref(handle),
            Resolved::Ensemble(handles) => handles,
        }
    }
}

/// Summary of the loaded models
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub available_models: Vec<String>,
    pub feature_count: usize,
    pub features: Vec<String>,
}

/// Process-wide lookup from identifier to loaded model
#[derive(Debug, Default)]
pub struct ModelRegistry {
    loaded: OnceLock<Vec<ModelHandle>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the loaded handles and mark the registry ready
    pub fn install(&self, handles: Vec<ModelHandle>) -> Result<(), RegistryError> {
        if self.loaded.get().is_some() {
            return Err(RegistryError::AlreadyLoaded);
        }
        let mut handles = handles;
        if handles.is_empty() {
            return Err(RegistryError::NoModels);
        }
        handles.sort_by_key(|h| h.id());
        for pair in handles.windows(2) {
            if pair[0].id() == pair[1].id() {
                return Err(RegistryError::Duplicate(pair[0].id()));
            }
        }

        let expected = handles[0].schema().len();
        if let Some(bad) = handles.iter().find(|h| h.schema().len() != expected) {
            return Err(RegistryError::SchemaMismatch {
                model: bad.id(),
                expected,
                actual: bad.schema().len(),
            });
        }
        if expected != crate::models::STOCK_FEATURE_COUNT {
            warn!(
                features = expected,
                stock = crate::models::STOCK_FEATURE_COUNT,
                "Model schema differs from the stock feature count"
            );
        }

        let ids: Vec<&str> = handles.iter().map(|h| h.id().as_str()).collect();
        info!(models = ?ids, features = expected, "Model registry ready");
        self.loaded
            .set(handles)
            .map_err(|_| RegistryError::AlreadyLoaded)
    }

    /// Whether the model store has finished loading
    pub fn is_ready(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// Resolve a requested identifier to one handle or the full ensemble
    pub fn resolve(&self, model_id: &str) -> Result<Resolved, PredictionError> {
        let selector: ModelSelector = model_id.parse()?;
        self.resolve_selector(selector)
    }

    pub fn resolve_selector(&self, selector: ModelSelector) -> Result<Resolved, PredictionError> {
        let handles = self.loaded.get().ok_or(PredictionError::ModelsNotLoaded)?;
        match selector {
            ModelSelector::Ensemble => Ok(Resolved::Ensemble(handles.clone())),
            ModelSelector::Single(id) => handles
                .iter()
                .find(|h| h.id() == id)
                .cloned()
                .map(Resolved::Single)
                .ok_or_else(|| {
                    PredictionError::unknown_model(id.as_str(), handles.iter().map(|h| h.id()))
                }),
        }
    }

    /// Loaded model identifiers in ensemble order
    pub fn loaded_models(&self) -> Vec<ModelId> {
        self.loaded
            .get()
            .map(|handles| handles.iter().map(|h| h.id()).collect())
            .unwrap_or_default()
    }

    /// Feature schema of the first loaded model, used as the reference schema
    pub fn reference_schema(&self) -> Option<&FeatureSchema> {
        self.loaded.get().and_then(|h| h.first()).map(|h| h.schema())
    }

    pub fn info(&self) -> Option<ModelInfo> {
        let handles = self.loaded.get()?;
        let schema = handles.first()?.schema();
        Some(ModelInfo {
            available_models: handles.iter().map(|h| h.id().to_string()).collect(),
            feature_count: schema.len(),
            features: schema.names().to_vec(),
        })
    }
}
