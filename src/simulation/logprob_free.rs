use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{PromptError, SimulationError};
use crate::few_shot::FewShotExampleSet;
use crate::prompt::{Prompt, PromptFormat};
use crate::services::llm::{PredictionRequest, Predictor};
use super::prompts::{make_logprob_free_prompt, make_logprob_free_prompt_json, simulation_response_schema};
use super::text_parser::{parse_no_logprobs_completion, parse_no_logprobs_completion_json};
use super::types::SequenceSimulation;

const MAX_TOKENS_JSON: u32 = 2000;
const MAX_TOKENS_TEXT: u32 = 1000;

/// Asks the predictor to echo every token with its activation filled in,
/// sampled at temperature 0. No logprobs, so no distributions.
///
/// Each predicted activation can depend on the whole sequence, not only on
/// the tokens before it. A response that does not reproduce the tokens
/// yields all zeros instead of an error.
pub struct LogprobFreeExplanationTokenSimulator<P> {
    predictor: Arc<P>,
    explanation: String,
    few_shot_example_set: FewShotExampleSet,
    prompt_format: PromptFormat,
    json_mode: bool,
}

impl<P: Predictor> LogprobFreeExplanationTokenSimulator<P> {
    pub fn new(
        predictor: Arc<P>,
        explanation: impl Into<String>,
        few_shot_example_set: FewShotExampleSet,
        prompt_format: PromptFormat,
        json_mode: bool,
    ) -> Result<Self, SimulationError> {
        if few_shot_example_set == FewShotExampleSet::Original {
            return Err(SimulationError::UnsupportedExampleSet(few_shot_example_set));
        }
        let explanation = explanation.into();
        if explanation.trim().is_empty() {
            return Err(SimulationError::EmptyExplanation);
        }
        Ok(Self {
            predictor,
            explanation,
            few_shot_example_set,
            prompt_format,
            json_mode,
        })
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn make_simulation_prompt(&self, tokens: &[String]) -> Result<Prompt, PromptError> {
        if self.json_mode {
            make_logprob_free_prompt_json(&self.explanation, tokens, self.few_shot_example_set, self.prompt_format)
        } else {
            make_logprob_free_prompt(&self.explanation, tokens, self.few_shot_example_set, self.prompt_format)
        }
    }

    pub async fn simulate(&self, tokens: &[String]) -> Result<SequenceSimulation, SimulationError> {
        if tokens.is_empty() {
            return Ok(SequenceSimulation::point_estimates(tokens, Vec::new()));
        }

        let simulation_id = Uuid::new_v4();
        info!(
            "[SIM-{}] logprob-free ({}) over {} tokens",
            simulation_id,
            if self.json_mode { "json" } else { "text" },
            tokens.len()
        );

        let prompt = self.make_simulation_prompt(tokens)?;
        let request = if self.json_mode {
            PredictionRequest::free_text(prompt, MAX_TOKENS_JSON, Some(simulation_response_schema()))
        } else {
            PredictionRequest::free_text(prompt, MAX_TOKENS_TEXT, None)
        };
        let response = self.predictor.predict(request).await?;
        debug!("[SIM-{}] completion: {:?}", simulation_id, response.text);

        let predicted = if self.json_mode {
            parse_no_logprobs_completion_json(&response.text, tokens)
        } else {
            parse_no_logprobs_completion(&response.text, tokens)
        };

        let result = SequenceSimulation::point_estimates(tokens, predicted);
        debug!("[SIM-{}] result: {:?}", simulation_id, result);
        Ok(result)
    }
}
