//! Turns a predictor's top-logprob table into a distribution over the
//! quantized activation values 0..=10 and its expected value.

use tracing::warn;

use crate::activations::MAX_NORMALIZED_ACTIVATION;
use crate::services::llm::TokenLogprobs;

/// Normalized distribution over the quantized values seen in one table.
/// `values` and `probabilities` are parallel and keep the table's order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivationDistribution {
    pub values: Vec<u32>,
    pub probabilities: Vec<f64>,
    pub expected_value: f64,
}

/// Only the exact strings "0" through "10" count as predictions.
fn quantized_value(token: &str) -> Option<u32> {
    let value: u32 = token.parse().ok()?;
    (value <= MAX_NORMALIZED_ACTIVATION && value.to_string() == token).then_some(value)
}

/// Keeps the candidates that are quantized values and exponentiates them.
/// The result is unnormalized. A repeated value keeps its first position
/// and takes the later probability.
pub fn parse_top_logprobs(top_logprobs: &TokenLogprobs) -> Vec<(u32, f64)> {
    let mut probabilities: Vec<(u32, f64)> = Vec::new();
    for (token, logprob) in top_logprobs.iter() {
        let Some(value) = quantized_value(token) else {
            continue;
        };
        let p = logprob.exp();
        match probabilities.iter_mut().find(|(v, _)| *v == value) {
            Some(slot) => slot.1 = p,
            None => probabilities.push((value, p)),
        }
    }
    probabilities
}

pub fn compute_expected_value(normalized: &[(u32, f64)]) -> f64 {
    normalized.iter().map(|&(v, p)| v as f64 * p).sum()
}

/// Normalized distribution plus expected value for one token position.
///
/// A table with no quantized candidate yields an empty distribution and an
/// expected value of 0.0.
pub fn compute_predicted_activation_stats(top_logprobs: &TokenLogprobs) -> ActivationDistribution {
    let probabilities = parse_top_logprobs(top_logprobs);
    let total: f64 = probabilities.iter().map(|(_, p)| p).sum();
    if probabilities.is_empty() || total <= 0.0 {
        warn!(
            "No quantized activation among {} candidates; using expected value 0",
            top_logprobs.len()
        );
        return ActivationDistribution::default();
    }

    let normalized: Vec<(u32, f64)> = probabilities.into_iter().map(|(v, p)| (v, p / total)).collect();
    let expected_value = compute_expected_value(&normalized);
    let (values, probabilities) = normalized.into_iter().unzip();

    ActivationDistribution {
        values,
        probabilities,
        expected_value,
    }
}
