//! Decoding for the logprob-free modality.
//!
//! Nothing here returns an error. A response that cannot be aligned with the
//! subject tokens decodes to all zeros, and a single bad value decodes to 0.

use serde_json::Value;
use tracing::{debug, warn};

use crate::activations::MAX_NORMALIZED_ACTIVATION;

/// Rare marker closing every `token\tvalue` line, so lines can be split
/// even when the value sits next to ordinary punctuation.
pub const ACTIVATION_DELIMITER: char = '༗';
pub const LINE_TERMINATOR: &str = "༗\n";

/// Predictors get confused when asked to reproduce the end-of-text token,
/// so it is sent (and expected back) as a placeholder.
pub const END_OF_TEXT_TOKEN: &str = "<|endoftext|>";
pub const END_OF_TEXT_PLACEHOLDER: &str = "<|not_endoftext|>";

pub fn is_end_of_text(token: &str) -> bool {
    token.trim() == END_OF_TEXT_TOKEN
}

/// Token as it is shown to the predictor.
pub fn substitute_end_of_text(token: &str) -> &str {
    if is_end_of_text(token) {
        END_OF_TEXT_PLACEHOLDER
    } else {
        token
    }
}

/// Splits a completion into token lines.
///
/// Splits on the delimiter plus newline; when that leaves a single segment
/// the predictor most likely dropped the delimiter, so bare newlines are used.
/// Tokens that themselves contain newlines break this fallback.
pub fn split_token_lines(completion: &str) -> Vec<&str> {
    let trimmed = completion
        .trim_matches('\n')
        .trim_matches(|c| c == ACTIVATION_DELIMITER || c == '\n');
    let lines: Vec<&str> = trimmed.split(LINE_TERMINATOR).collect();
    if lines.len() == 1 {
        return trimmed.split('\n').collect();
    }
    lines
}

/// Whether `line` echoes `token`, allowing a dropped leading space and the
/// end-of-text placeholder.
pub fn line_matches_token(line: &str, token: &str) -> bool {
    let expected = format!("{token}\t");
    line.starts_with(&expected)
        || format!(" {line}").starts_with(&expected)
        || (is_end_of_text(token) && line.starts_with(END_OF_TEXT_PLACEHOLDER))
}

fn in_range(value: f64) -> Option<f64> {
    (value.is_finite() && (0.0..=MAX_NORMALIZED_ACTIVATION as f64).contains(&value)).then_some(value)
}

/// Activation carried by one `token\tvalue` line, if it is well formed and in range.
pub fn parse_activation_value(line: &str) -> Option<f64> {
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() != 2 {
        debug!("Token line split into {} parts: {:?}", parts.len(), line);
        return None;
    }
    let Ok(value) = parts[1].trim().parse::<f64>() else {
        debug!("Activation value not numeric: {:?}", parts[1]);
        return None;
    };
    let checked = in_range(value);
    if checked.is_none() {
        debug!("Activation value out of range: {}", value);
    }
    checked
}

/// Decodes a delimited-text completion into one activation per token.
pub fn parse_no_logprobs_completion(completion: &str, tokens: &[String]) -> Vec<f64> {
    let zero_prediction = vec![0.0; tokens.len()];
    let Some(first_token) = tokens.first() else {
        return zero_prediction;
    };

    let token_lines = split_token_lines(completion);
    debug!("Parsed completion into {} token lines", token_lines.len());

    let start = token_lines.iter().position(|line| line_matches_token(line, first_token));
    let Some(start) = start.filter(|&s| token_lines.len() - s == tokens.len()) else {
        warn!(
            "Completion does not echo the {} subject tokens (first token {:?}); returning all zeros",
            tokens.len(),
            first_token
        );
        return zero_prediction;
    };

    let mut predicted = Vec::with_capacity(tokens.len());
    for (i, (line, token)) in token_lines[start..].iter().zip(tokens).enumerate() {
        if !line_matches_token(line, token) {
            warn!("Line {} {:?} does not echo token {:?}; returning all zeros", i, line, token);
            return zero_prediction;
        }
        predicted.push(parse_activation_value(line).unwrap_or(0.0));
    }
    predicted
}

/// Decodes a JSON completion (`{"activations": [{"token", "activation"}]}`).
pub fn parse_no_logprobs_completion_json(completion: &str, tokens: &[String]) -> Vec<f64> {
    match serde_json::from_str::<Value>(completion) {
        Ok(value) => parse_activations_json(&value, tokens),
        Err(e) => {
            warn!("Failed to parse completion JSON: {}", e);
            vec![0.0; tokens.len()]
        }
    }
}

pub fn parse_activations_json(completion: &Value, tokens: &[String]) -> Vec<f64> {
    let zero_prediction = vec![0.0; tokens.len()];

    let Some(activations) = completion.get("activations") else {
        warn!("The key 'activations' is not in the completion; returning all zeros");
        return zero_prediction;
    };
    let Some(entries) = activations.as_array() else {
        warn!("'activations' is not an array; returning all zeros");
        return zero_prediction;
    };
    if entries.len() != tokens.len() {
        warn!(
            "Got {} activations for {} tokens; returning all zeros",
            entries.len(),
            tokens.len()
        );
        return zero_prediction;
    }

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| json_activation_value(i, entry).unwrap_or(0.0))
        .collect()
}

// The echoed token is not compared, only its presence is required.
fn json_activation_value(index: usize, entry: &Value) -> Option<f64> {
    if entry.get("token").is_none() {
        warn!("Activation entry {} has no 'token' key", index);
        return None;
    }
    let Some(raw) = entry.get("activation") else {
        warn!("Activation entry {} has no 'activation' key", index);
        return None;
    };
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        // Booleans are not activations, `true` decodes to 0 rather than 1.
        _ => None,
    };
    let Some(value) = value else {
        warn!("Activation entry {} has invalid value {}", index, raw);
        return None;
    };
    let checked = in_range(value);
    if checked.is_none() {
        warn!("Activation entry {} out of range: {}", index, value);
    }
    checked
}
