use serde::{Deserialize, Serialize};

use super::distribution::ActivationDistribution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationScale {
    /// Predicted values on the normalized 0..=10 scale.
    SimulatedNormalizedActivations,
}

/// Result of one `simulate` call.
///
/// `distribution_values` / `distribution_probabilities` are parallel per
/// token and stay empty for modalities that only yield point estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceSimulation {
    pub tokens: Vec<String>,
    pub expected_activations: Vec<f64>,
    pub activation_scale: ActivationScale,
    pub distribution_values: Vec<Vec<u32>>,
    pub distribution_probabilities: Vec<Vec<f64>>,
}

impl SequenceSimulation {
    pub fn from_distributions(tokens: &[String], distributions: Vec<ActivationDistribution>) -> Self {
        let mut expected_activations = Vec::with_capacity(distributions.len());
        let mut distribution_values = Vec::with_capacity(distributions.len());
        let mut distribution_probabilities = Vec::with_capacity(distributions.len());
        for d in distributions {
            expected_activations.push(d.expected_value);
            distribution_values.push(d.values);
            distribution_probabilities.push(d.probabilities);
        }
        Self {
            tokens: tokens.to_vec(),
            expected_activations,
            activation_scale: ActivationScale::SimulatedNormalizedActivations,
            distribution_values,
            distribution_probabilities,
        }
    }

    /// Sampled values only, no distribution available.
    pub fn point_estimates(tokens: &[String], expected_activations: Vec<f64>) -> Self {
        Self {
            tokens: tokens.to_vec(),
            expected_activations,
            activation_scale: ActivationScale::SimulatedNormalizedActivations,
            distribution_values: Vec::new(),
            distribution_probabilities: Vec::new(),
        }
    }

    /// For logprob-free results an all-zero vector signals a parse failure.
    pub fn is_all_zero(&self) -> bool {
        self.expected_activations.iter().all(|&a| a == 0.0)
    }
}
