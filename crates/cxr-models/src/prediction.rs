//! Prediction results.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnosis::Diagnosis;

/// Allowed deviation of a probability vector's sum from 1.
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-3;

/// Errors mapping a raw model output to a prediction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    #[error("Model returned {actual} outputs, expected {expected}")]
    OutputWidth { expected: usize, actual: usize },

    #[error("Model returned a non-finite value at index {0}")]
    NonFinite(usize),
}

/// Classification of a single image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Prediction {
    /// Highest-probability class
    pub diagnosis: Diagnosis,
    /// Probability of `diagnosis` as a percentage, one decimal place
    pub confidence: f64,
    /// Probability per class, in [0, 1] and summing to 1
    pub class_probabilities: BTreeMap<Diagnosis, f64>,
}

impl Prediction {
    /// Map a raw output vector onto the label table.
    ///
    /// Vectors that are already a probability distribution are used as-is;
    /// anything else (logits) is passed through softmax first. Ties resolve
    /// to the lowest index.
    pub fn from_output(output: &[f32]) -> Result<Self, PredictionError> {
        if output.len() != Diagnosis::COUNT {
            return Err(PredictionError::OutputWidth {
                expected: Diagnosis::COUNT,
                actual: output.len(),
            });
        }
        if let Some(i) = output.iter().position(|v| !v.is_finite()) {
            return Err(PredictionError::NonFinite(i));
        }

        let raw: Vec<f64> = output.iter().map(|&v| f64::from(v)).collect();
        let probs = if is_distribution(&raw) {
            raw
        } else {
            softmax(&raw)
        };

        let mut best = 0;
        for (i, p) in probs.iter().enumerate() {
            if *p > probs[best] {
                best = i;
            }
        }

        let class_probabilities = Diagnosis::ALL
            .iter()
            .zip(probs.iter())
            .map(|(label, p)| (*label, *p))
            .collect();

        Ok(Self {
            diagnosis: Diagnosis::ALL[best],
            confidence: round_percent(probs[best]),
            class_probabilities,
        })
    }

    /// Probability assigned to a class.
    pub fn probability(&self, diagnosis: Diagnosis) -> f64 {
        self.class_probabilities
            .get(&diagnosis)
            .copied()
            .unwrap_or(0.0)
    }
}

fn is_distribution(values: &[f64]) -> bool {
    values.iter().all(|v| (0.0..=1.0).contains(v))
        && (values.iter().sum::<f64>() - 1.0).abs() <= PROBABILITY_SUM_TOLERANCE
}

fn softmax(values: &[f64]) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn round_percent(probability: f64) -> f64 {
    (probability * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_distribution(prediction: &Prediction) {
        let sum: f64 = prediction.class_probabilities.values().sum();
        assert!((sum - 1.0).abs() <= PROBABILITY_SUM_TOLERANCE, "sum = {}", sum);
        assert!(prediction
            .class_probabilities
            .values()
            .all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_softmax_output_used_directly() {
        let prediction = Prediction::from_output(&[0.1, 0.7, 0.2]).unwrap();
        assert_eq!(prediction.diagnosis, Diagnosis::Normal);
        assert!((prediction.confidence - 70.0).abs() < 1e-9);
        assert!((prediction.probability(Diagnosis::Pneumonia) - 0.2).abs() < 1e-6);
        assert_distribution(&prediction);
    }

    #[test]
    fn test_logits_are_normalized() {
        let prediction = Prediction::from_output(&[-1.0, 0.5, 3.0]).unwrap();
        assert_eq!(prediction.diagnosis, Diagnosis::Pneumonia);
        assert!(prediction.confidence > 50.0);
        assert_distribution(&prediction);
    }

    #[test]
    fn test_diagnosis_is_argmax() {
        let prediction = Prediction::from_output(&[0.55, 0.25, 0.2]).unwrap();
        let max = prediction
            .class_probabilities
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(k, _)| *k)
            .unwrap();
        assert_eq!(prediction.diagnosis, max);
        assert_eq!(prediction.diagnosis, Diagnosis::LungOpacity);
    }

    #[test]
    fn test_tie_resolves_to_lowest_index() {
        let third = 1.0_f32 / 3.0;
        let prediction = Prediction::from_output(&[third, third, third]).unwrap();
        assert_eq!(prediction.diagnosis, Diagnosis::LungOpacity);
        assert!((prediction.confidence - 33.3).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_rounded_to_one_decimal() {
        let prediction = Prediction::from_output(&[0.12345, 0.87655, 0.0]).unwrap();
        assert!((prediction.confidence - 87.7).abs() < 1e-9);
    }

    #[test]
    fn test_wrong_width_rejected() {
        let err = Prediction::from_output(&[0.5, 0.5]).unwrap_err();
        assert_eq!(
            err,
            PredictionError::OutputWidth {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = Prediction::from_output(&[0.5, f32::NAN, 0.5]).unwrap_err();
        assert_eq!(err, PredictionError::NonFinite(1));
    }

    #[test]
    fn test_serialized_shape() {
        let prediction = Prediction::from_output(&[0.1, 0.8, 0.1]).unwrap();
        let json = serde_json::to_value(&prediction).unwrap();
        assert_eq!(json["diagnosis"], "Normal");
        let probs = json["class_probabilities"].as_object().unwrap();
        let keys: Vec<&str> = probs.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Lung_Opacity", "Normal", "Pneumonia"]);
    }
}
