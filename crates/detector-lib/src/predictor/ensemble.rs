//! Ensemble voting
//!
//! Each model casts a binary vote. A strict majority decides the label and an
//! exact tie resolves to Attack, so a split ensemble errs toward raising an
//! alert. Confidence is the mean probability over all models, whatever the
//! vote outcome.

use crate::error::PredictionError;
use crate::models::{Label, ModelId};
use serde::Serialize;

/// Probability at or above which a model votes Attack
pub const ATTACK_THRESHOLD: f64 = 0.5;

/// Combined label and confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub label: Label,
    pub confidence: f64,
}

impl Verdict {
    /// Verdict of a single model
    pub fn from_probability(probability: f64) -> Self {
        Self {
            label: vote(probability),
            confidence: probability,
        }
    }
}

fn vote(probability: f64) -> Label {
    if probability >= ATTACK_THRESHOLD {
        Label::Attack
    } else {
        Label::Normal
    }
}

/// Combine per-model probabilities into one verdict
pub fn combine(scores: &[(ModelId, f64)]) -> Result<Verdict, PredictionError> {
    if scores.is_empty() {
        return Err(PredictionError::EmptyEnsemble);
    }

    let attack_votes = scores
        .iter()
        .filter(|(_, p)| vote(*p).is_attack())
        .count();
    // Ties count as Attack: 2 * votes >= n covers both majority and an even split
    let label = if attack_votes * 2 >= scores.len() {
        Label::Attack
    } else {
        Label::Normal
    };

    let confidence = scores.iter().map(|(_, p)| p).sum::<f64>() / scores.len() as f64;

    Ok(Verdict { label, confidence })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(probabilities: &[f64]) -> Vec<(ModelId, f64)> {
        probabilities
            .iter()
            .zip(ModelId::ALL.iter().cycle())
            .map(|(p, id)| (*id, *p))
            .collect()
    }

    #[test]
    fn test_empty_ensemble_rejected() {
        assert!(matches!(combine(&[]), Err(PredictionError::EmptyEnsemble)));
    }

    #[test]
    fn test_even_split_resolves_to_attack() {
        let verdict = combine(&scores(&[0.9, 0.1])).unwrap();
        assert_eq!(verdict.label, Label::Attack);
        assert!((verdict.confidence - 0.5).abs() < 1e-12);

        let verdict = combine(&scores(&[0.6, 0.2, 0.7, 0.3])).unwrap();
        assert_eq!(verdict.label, Label::Attack);
    }

    #[test]
    fn test_strict_majority_decides() {
        let verdict = combine(&scores(&[0.2, 0.3, 0.9])).unwrap();
        assert_eq!(verdict.label, Label::Normal);

        let verdict = combine(&scores(&[0.51, 0.5, 0.1])).unwrap();
        assert_eq!(verdict.label, Label::Attack);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert_eq!(Verdict::from_probability(0.5).label, Label::Attack);
        assert_eq!(Verdict::from_probability(0.4999).label, Label::Normal);
        assert_eq!(combine(&scores(&[0.5])).unwrap().label, Label::Attack);
    }

    #[test]
    fn test_confidence_is_mean_regardless_of_vote() {
        // Vote says Normal while one model is nearly certain of an attack
        let verdict = combine(&scores(&[0.99, 0.1, 0.2])).unwrap();
        assert_eq!(verdict.label, Label::Normal);
        assert!((verdict.confidence - (0.99 + 0.1 + 0.2) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_mean_over_synthetic_sets() {
        // Deterministic pseudo-random probability sets of every ensemble size
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
        for _ in 0..200 {
            let n = (seed % 4 + 1) as usize;
            let probabilities: Vec<f64> = (0..n)
                .map(|_| {
                    seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    (seed >> 11) as f64 / (1u64 << 53) as f64
                })
                .collect();
            let verdict = combine(&scores(&probabilities)).unwrap();
            let mean = probabilities.iter().sum::<f64>() / n as f64;
            assert!((verdict.confidence - mean).abs() < 1e-12);

            let attacks = probabilities.iter().filter(|p| **p >= 0.5).count();
            let expected = if attacks * 2 >= n { Label::Attack } else { Label::Normal };
            assert_eq!(verdict.label, expected);
        }
    }
}
