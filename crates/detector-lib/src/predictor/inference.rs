//! Model inference
//!
//! Two scorer flavours: exported ONNX classifiers run through tract, and
//! linear models described in JSON. Both produce the probability of the
//! Attack class for a validated feature vector.

use super::Scorer;
use crate::models::FeatureVector;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX classifier scored with tract
pub struct OnnxScorer {
    model: TractModel,
    num_features: usize,
}

impl OnnxScorer {
    /// Create a scorer from ONNX model bytes expecting `num_features` inputs
    pub fn new(model_bytes: &[u8], num_features: usize) -> Result<Self> {
        let model = Self::load_model(model_bytes, num_features)?;
        Ok(Self {
            model,
            num_features,
        })
    }

    /// Load and optimize an ONNX model from bytes
    fn load_model(model_bytes: &[u8], num_features: usize) -> Result<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, num_features]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(model)
    }

    fn features_to_tensor(&self, features: &FeatureVector) -> Result<Tensor> {
        let data: Vec<f32> = features.values().iter().map(|v| *v as f32).collect();
        let array = tract_ndarray::Array2::from_shape_vec((1, self.num_features), data)
            .context("Feature vector does not match model input shape")?;
        Ok(array.into())
    }
}

/// Pick the Attack probability out of a classifier's outputs.
///
/// Exported classifiers emit a label tensor followed by class probabilities,
/// so outputs are searched from the back for a float tensor of one or two
/// values.
fn attack_probability(outputs: &[TValue]) -> Result<f64> {
    for output in outputs.iter().rev() {
        let Ok(view) = output.to_array_view::<f32>() else {
            continue;
        };
        let values: Vec<f32> = view.iter().copied().collect();
        match values.len() {
            2 => return Ok(values[1] as f64),
            1 => return Ok(values[0] as f64),
            _ => continue,
        }
    }
    anyhow::bail!("Model produced no probability output")
}

impl Scorer for OnnxScorer {
    fn score(&self, features: &FeatureVector) -> Result<f64> {
        let start = Instant::now();

        let input = self.features_to_tensor(features)?;
        let outputs = self.model.run(tvec!(input.into()))?;
        let probability = attack_probability(&outputs)?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(probability)
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }
}

/// Output transform applied to the linear score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Link {
    /// Sigmoid of the weighted sum, as in logistic regression
    #[default]
    Logistic,
    /// The weighted sum itself
    Identity,
}

/// Linear model over the schema's features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearScorer {
    pub weights: Vec<f64>,
    #[serde(default)]
    pub bias: f64,
    #[serde(default)]
    pub link: Link,
    /// Feature ordering the weights refer to, when it differs from the shared schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

impl LinearScorer {
    pub fn new(weights: Vec<f64>, bias: f64, link: Link) -> Self {
        Self {
            weights,
            bias,
            link,
            features: None,
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("Failed to parse linear model")
    }
}

impl Scorer for LinearScorer {
    fn score(&self, features: &FeatureVector) -> Result<f64> {
        if features.len() != self.weights.len() {
            anyhow::bail!(
                "Model has {} weights but received {} features",
                self.weights.len(),
                features.len()
            );
        }
        let z = self
            .weights
            .iter()
            .zip(features.values())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;

        Ok(match self.link {
            Link::Logistic => 1.0 / (1.0 + (-z).exp()),
            Link::Identity => z,
        })
    }

    fn kind(&self) -> &'static str {
        "linear"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeatureSchema, RawFeatureMap, RawValue};
    use crate::predictor::validate;

    fn vector(pairs: &[(&str, f64)]) -> FeatureVector {
        let raw: RawFeatureMap = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), RawValue::Number(*v)))
            .collect();
        let schema = FeatureSchema::new(pairs.iter().map(|(k, _)| *k));
        validate(&raw, &schema).unwrap()
    }

    #[test]
    fn test_identity_link_sums_weighted_features() {
        let scorer = LinearScorer::new(vec![1.0, 1.0], 0.0, Link::Identity);
        let p = scorer.score(&vector(&[("a", 0.3), ("b", 0.4)])).unwrap();
        assert!((p - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_logistic_link() {
        let scorer = LinearScorer::new(vec![2.0], -1.0, Link::Logistic);
        let p = scorer.score(&vector(&[("a", 0.5)])).unwrap();
        assert!((p - 0.5).abs() < 1e-12);

        let p = scorer.score(&vector(&[("a", 10.0)])).unwrap();
        assert!(p > 0.99 && p <= 1.0);
    }

    #[test]
    fn test_weight_count_mismatch_is_error() {
        let scorer = LinearScorer::new(vec![1.0, 2.0, 3.0], 0.0, Link::Logistic);
        assert!(scorer.score(&vector(&[("a", 1.0)])).is_err());
    }

    #[test]
    fn test_linear_model_json() {
        let scorer = LinearScorer::from_json(
            br#"{"weights": [0.5, -0.25], "bias": 0.1, "features": ["sbytes", "dur"]}"#,
        )
        .unwrap();
        assert_eq!(scorer.link, Link::Logistic);
        assert_eq!(scorer.features.as_deref().map(|f| f.len()), Some(2));

        let identity = LinearScorer::from_json(br#"{"weights": [1.0], "link": "identity"}"#).unwrap();
        assert_eq!(identity.link, Link::Identity);
        assert_eq!(identity.bias, 0.0);

        assert!(LinearScorer::from_json(b"not json").is_err());
    }

    #[test]
    fn test_invalid_onnx_bytes_rejected() {
        assert!(OnnxScorer::new(b"definitely not onnx", 4).is_err());
    }
}
