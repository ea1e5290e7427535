//! Model store
//!
//! Loads exported classifiers from a directory laid out as:
//!
//! ```text
//! models/
//!   feature_names.json          shared ordered schema
//!   random_forest.onnx          ONNX classifier, or
//!   random_forest.json          linear model
//!   random_forest.features.json optional per-model ordering
//! ```

use super::inference::{LinearScorer, OnnxScorer};
use super::registry::{ModelHandle, ModelRegistry};
use crate::models::{FeatureSchema, ModelId};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Shared schema file name
pub const FEATURE_NAMES_FILE: &str = "feature_names.json";

/// Reads model files and installs them into a registry
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load every model present in the directory
    pub fn load(&self) -> Result<Vec<ModelHandle>> {
        let shared = read_schema(&self.dir.join(FEATURE_NAMES_FILE))
            .with_context(|| format!("Failed to load feature names from {}", self.dir.display()))?;

        let mut handles = Vec::new();
        for id in ModelId::ALL {
            match self.load_model(id, &shared) {
                Ok(Some(handle)) => {
                    info!(model = %id, scorer = handle.scorer_kind(), "Loaded model");
                    handles.push(handle);
                }
                Ok(None) => warn!(model = %id, dir = %self.dir.display(), "Model file not found, skipping"),
                Err(e) => return Err(e.context(format!("Failed to load model {}", id))),
            }
        }

        if handles.is_empty() {
            anyhow::bail!("No models found in {}", self.dir.display());
        }
        Ok(handles)
    }

    /// Load the directory and install the result, flipping the registry to ready
    pub fn load_into(&self, registry: &ModelRegistry) -> Result<usize> {
        let handles = self.load()?;
        let count = handles.len();
        registry.install(handles)?;
        Ok(count)
    }

    fn load_model(&self, id: ModelId, shared: &FeatureSchema) -> Result<Option<ModelHandle>> {
        let override_path = self.dir.join(format!("{}.features.json", id));
        let schema = if override_path.exists() {
            read_schema(&override_path)?
        } else {
            shared.clone()
        };

        let onnx_path = self.dir.join(format!("{}.onnx", id));
        if onnx_path.exists() {
            let bytes = std::fs::read(&onnx_path)
                .with_context(|| format!("Failed to read {}", onnx_path.display()))?;
            let scorer = OnnxScorer::new(&bytes, schema.len())?;
            return Ok(Some(ModelHandle::new(id, schema, scorer)));
        }

        let json_path = self.dir.join(format!("{}.json", id));
        if json_path.exists() {
            let bytes = std::fs::read(&json_path)
                .with_context(|| format!("Failed to read {}", json_path.display()))?;
            let scorer = LinearScorer::from_json(&bytes)?;
            let schema = match &scorer.features {
                Some(names) => FeatureSchema::new(names.iter().cloned()),
                None => schema,
            };
            if scorer.weights.len() != schema.len() {
                anyhow::bail!(
                    "Linear model has {} weights for {} features",
                    scorer.weights.len(),
                    schema.len()
                );
            }
            return Ok(Some(ModelHandle::new(id, schema, scorer)));
        }

        Ok(None)
    }
}

fn read_schema(path: &Path) -> Result<FeatureSchema> {
    let content =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let schema: FeatureSchema = serde_json::from_slice(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    if schema.is_empty() {
        anyhow::bail!("{} lists no features", path.display());
    }
    Ok(schema)
}
