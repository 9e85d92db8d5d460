use crate::error::SimulationError;
use crate::services::llm::PredictionResponse;
use super::distribution::{compute_predicted_activation_stats, ActivationDistribution};
use super::types::SequenceSimulation;

/// Opens the block of tokens being scored. The last occurrence in the
/// echoed text is the subject sequence; few-shot blocks come before it.
pub const START_MARKER: &str = "\n<start>\n";

const UNKNOWN: &str = "unknown";

/// Reads one distribution per subject token out of an echoed, scored prompt.
///
/// After the marker the text must continue with `\n<token>\tunknown` for
/// every token, in order. The `unknown` placeholder is the response token
/// whose alternatives are scored, so a response token must start exactly
/// after the tab. Offsets in the response are character offsets.
///
/// Alignment is exact. A merged or altered token is an error, never a guess.
pub fn parse_simulation_response(
    response: &PredictionResponse,
    tokens: &[String],
) -> Result<SequenceSimulation, SimulationError> {
    let text = response.text.as_str();
    let marker = text.rfind(START_MARKER).ok_or(SimulationError::MissingStartMarker)?;

    // Cursor sits on the newline that ends the marker line.
    let mut cursor = marker + START_MARKER.len() - 1;
    let mut cursor_chars = text[..cursor].chars().count();

    let mut distributions: Vec<ActivationDistribution> = Vec::with_capacity(tokens.len());
    for (index, token) in tokens.iter().enumerate() {
        let prefix = format!("\n{token}\t");
        let literal = format!("{prefix}{UNKNOWN}");
        if !text[cursor..].starts_with(&literal) {
            return Err(SimulationError::TokenMismatch {
                index,
                token: token.clone(),
                offset: cursor_chars,
            });
        }

        let offset = cursor_chars + prefix.chars().count();
        let logprobs = response
            .logprobs
            .as_ref()
            .ok_or_else(|| SimulationError::MissingLogprobs("echoed scoring response".to_string()))?;
        let response_index = logprobs
            .text_offset
            .iter()
            .position(|&o| o == offset)
            .ok_or(SimulationError::OffsetNotFound { index, offset })?;
        let table = logprobs
            .top_logprobs
            .get(response_index)
            .ok_or_else(|| SimulationError::MissingLogprobs(format!("response token {response_index}")))?;

        distributions.push(compute_predicted_activation_stats(table));

        cursor += literal.len();
        cursor_chars += literal.chars().count();
    }

    Ok(SequenceSimulation::from_distributions(tokens, distributions))
}
