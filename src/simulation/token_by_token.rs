use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SimulationError;
use crate::few_shot::FewShotExampleSet;
use crate::prompt::{Prompt, PromptFormat};
use crate::services::llm::{PredictionRequest, Predictor};
use super::all_at_once::TOP_LOGPROBS;
use super::distribution::{compute_predicted_activation_stats, ActivationDistribution};
use super::prompts::make_single_token_prompt;
use super::types::SequenceSimulation;

/// One single-token call per position, each scored from the alternatives of
/// the one generated token. Slower than all-at-once but needs no echo.
pub struct ExplanationTokenByTokenSimulator<P> {
    predictor: Arc<P>,
    explanation: String,
    few_shot_example_set: FewShotExampleSet,
    prompt_format: PromptFormat,
    max_concurrent: Option<usize>,
}

impl<P: Predictor> ExplanationTokenByTokenSimulator<P> {
    pub fn new(
        predictor: Arc<P>,
        explanation: impl Into<String>,
        few_shot_example_set: FewShotExampleSet,
        prompt_format: PromptFormat,
        max_concurrent: Option<usize>,
    ) -> Result<Self, SimulationError> {
        if few_shot_example_set == FewShotExampleSet::Original {
            return Err(SimulationError::UnsupportedExampleSet(few_shot_example_set));
        }
        if few_shot_example_set.single_token_prediction_example().is_none() {
            return Err(SimulationError::MissingSingleTokenExample(few_shot_example_set));
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
            max_concurrent,
        })
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn make_single_token_simulation_prompt(
        &self,
        tokens: &[String],
        token_index_to_score: usize,
    ) -> Result<Prompt, SimulationError> {
        make_single_token_prompt(
            &self.explanation,
            tokens,
            token_index_to_score,
            self.few_shot_example_set,
            self.prompt_format,
        )
    }

    /// Fans out one request per token and reassembles by token index.
    /// The first failing call fails the whole simulation; dropping the
    /// task set aborts whatever is still in flight.
    pub async fn simulate(&self, tokens: &[String]) -> Result<SequenceSimulation, SimulationError> {
        let simulation_id = Uuid::new_v4();
        info!("[SIM-{}] token-by-token over {} tokens", simulation_id, tokens.len());

        let limiter = self.max_concurrent.map(|n| Arc::new(Semaphore::new(n.clamp(1, Semaphore::MAX_PERMITS))));
        let mut tasks = JoinSet::new();

        for index in 0..tokens.len() {
            let prompt = self.make_single_token_simulation_prompt(tokens, index)?;
            let request = PredictionRequest::single_token(prompt, TOP_LOGPROBS);
            let predictor = Arc::clone(&self.predictor);
            let limiter = limiter.clone();

            tasks.spawn(async move {
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                (index, predictor.predict(request).await)
            });
        }

        let mut scored: Vec<(usize, ActivationDistribution)> = Vec::with_capacity(tokens.len());
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined?;
            let response = result?;
            let table = response
                .logprobs
                .as_ref()
                .and_then(|lp| lp.top_logprobs.first())
                .ok_or_else(|| SimulationError::MissingLogprobs(format!("token {index}")))?;
            debug!("[SIM-{}] token {} scored", simulation_id, index);
            scored.push((index, compute_predicted_activation_stats(table)));
        }

        // Completion order is arbitrary.
        scored.sort_by_key(|(index, _)| *index);
        let result = SequenceSimulation::from_distributions(tokens, scored.into_iter().map(|(_, d)| d).collect());
        debug!("[SIM-{}] result: {:?}", simulation_id, result);
        Ok(result)
    }
}
