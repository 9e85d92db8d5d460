use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{PromptError, SimulationError};
use crate::few_shot::FewShotExampleSet;
use crate::prompt::{Prompt, PromptFormat};
use crate::services::llm::{PredictionRequest, Predictor};
use super::logprob_parser::parse_simulation_response;
use super::prompts::make_all_at_once_prompt;
use super::types::SequenceSimulation;

pub(crate) const TOP_LOGPROBS: u8 = 15;

/// Scores every token in a single echo call using the `unknown`-placeholder
/// trick: the predictor's alternatives at each placeholder are the prediction.
pub struct ExplanationNeuronSimulator<P> {
    predictor: Arc<P>,
    explanation: String,
    few_shot_example_set: FewShotExampleSet,
    prompt_format: PromptFormat,
}

impl<P: Predictor> ExplanationNeuronSimulator<P> {
    pub fn new(
        predictor: Arc<P>,
        explanation: impl Into<String>,
        few_shot_example_set: FewShotExampleSet,
        prompt_format: PromptFormat,
    ) -> Self {
        Self {
            predictor,
            explanation: explanation.into(),
            few_shot_example_set,
            prompt_format,
        }
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn make_simulation_prompt(&self, tokens: &[String]) -> Result<Prompt, PromptError> {
        make_all_at_once_prompt(&self.explanation, tokens, self.few_shot_example_set, self.prompt_format)
    }

    pub async fn simulate(&self, tokens: &[String]) -> Result<SequenceSimulation, SimulationError> {
        let simulation_id = Uuid::new_v4();
        info!("[SIM-{}] all-at-once over {} tokens", simulation_id, tokens.len());

        let prompt = self.make_simulation_prompt(tokens)?;
        let response = self
            .predictor
            .predict(PredictionRequest::score_echo(prompt, TOP_LOGPROBS))
            .await?;
        debug!("[SIM-{}] response: {:?}", simulation_id, response);

        let result = parse_simulation_response(&response, tokens)?;
        debug!("[SIM-{}] result: {:?}", simulation_id, result);
        Ok(result)
    }
}
