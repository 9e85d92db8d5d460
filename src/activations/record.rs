use serde::{Deserialize, Serialize};

/// Normalized activations live on the integer scale 0..=10.
pub const MAX_NORMALIZED_ACTIVATION: u32 = 10;

/// A token sequence with one raw activation per token.
/// `activations` may be empty for a sequence that is still waiting on a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationRecord {
    pub tokens: Vec<String>,
    pub activations: Vec<f64>,
}

impl ActivationRecord {
    pub fn new(tokens: Vec<String>, activations: Vec<f64>) -> Self {
        Self { tokens, activations }
    }

    /// Record for tokens whose activations are unknown.
    pub fn unscored(tokens: &[String]) -> Self {
        Self {
            tokens: tokens.to_vec(),
            activations: Vec::new(),
        }
    }

    /// Keeps tokens (and activations, when present) up to and including `index`.
    pub fn truncated_through(&self, index: usize) -> Self {
        let end = (index + 1).min(self.tokens.len());
        Self {
            tokens: self.tokens[..end].to_vec(),
            activations: self.activations.iter().take(end).copied().collect(),
        }
    }
}

/// Largest raw activation over every record, 0.0 when there are none.
pub fn calculate_max_activation(records: &[ActivationRecord]) -> f64 {
    records
        .iter()
        .flat_map(|r| r.activations.iter().copied())
        .fold(None, |acc: Option<f64>, a| Some(acc.map_or(a, |m| m.max(a))))
        .unwrap_or(0.0)
}

/// Maps raw activations onto 0..=10: `min(10, floor(10 * relu(a) / max))`.
pub fn normalize_activations(activations: &[f64], max_activation: f64) -> Vec<u32> {
    if max_activation <= 0.0 {
        return vec![0; activations.len()];
    }
    activations
        .iter()
        .map(|&a| {
            let scaled = (10.0 * a.max(0.0) / max_activation).floor();
            (scaled as u32).min(MAX_NORMALIZED_ACTIVATION)
        })
        .collect()
}

fn format_activation_record(record: &ActivationRecord, max_activation: f64, start_index: usize) -> String {
    let normalized = normalize_activations(&record.activations, max_activation);
    let entries: Vec<String> = record
        .tokens
        .iter()
        .enumerate()
        .map(|(i, token)| match normalized.get(i) {
            Some(value) if i >= start_index => format!("{token}\t{value}"),
            _ => format!("{token}\tunknown"),
        })
        .collect();
    format!("<start>\n{}\n<end>\n", entries.join("\n"))
}

/// Renders scored records for a few-shot prompt.
///
/// Each record becomes a `<start>` / `<end>` block of `token\tvalue` lines.
/// Tokens before a record's start index are shown as `unknown`, which is how
/// partially revealed examples are presented.
pub fn format_activation_records(
    records: &[ActivationRecord],
    max_activation: f64,
    start_indices: Option<&[usize]>,
) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let start = start_indices.and_then(|s| s.get(i).copied()).unwrap_or(0);
            format_activation_record(record, max_activation, start)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders sequences awaiting simulation, every activation left as `unknown`.
pub fn format_sequences_for_simulation(all_tokens: &[&[String]]) -> String {
    let blocks: Vec<String> = all_tokens
        .iter()
        .map(|tokens| {
            tokens
                .iter()
                .map(|t| format!("{t}\tunknown"))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect();
    format!("\n<start>\n{}\n<end>\n", blocks.join("\n<end>\n<start>\n"))
}
