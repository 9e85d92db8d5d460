use std::sync::Arc;

use crate::config::{SimulationType, SimulatorConfig};
use crate::error::SimulationError;
use crate::services::llm::Predictor;
use super::all_at_once::ExplanationNeuronSimulator;
use super::logprob_free::LogprobFreeExplanationTokenSimulator;
use super::token_by_token::ExplanationTokenByTokenSimulator;
use super::types::SequenceSimulation;

/// The closed set of simulation strategies.
pub enum NeuronSimulator<P> {
    AllAtOnce(ExplanationNeuronSimulator<P>),
    OneAtATime(ExplanationTokenByTokenSimulator<P>),
    LogprobFree(LogprobFreeExplanationTokenSimulator<P>),
}

impl<P: Predictor> NeuronSimulator<P> {
    pub fn from_config(
        predictor: Arc<P>,
        explanation: impl Into<String>,
        config: &SimulatorConfig,
    ) -> Result<Self, SimulationError> {
        let format = config.resolved_prompt_format();
        let example_set = config.resolved_example_set();

        let simulator = match config.simulation_type {
            SimulationType::AllAtOnce => {
                NeuronSimulator::AllAtOnce(ExplanationNeuronSimulator::new(predictor, explanation, example_set, format))
            }
            SimulationType::OneAtATime => NeuronSimulator::OneAtATime(ExplanationTokenByTokenSimulator::new(
                predictor,
                explanation,
                example_set,
                format,
                config.max_concurrent,
            )?),
            SimulationType::LogprobFree => NeuronSimulator::LogprobFree(LogprobFreeExplanationTokenSimulator::new(
                predictor,
                explanation,
                example_set,
                format,
                config.json_mode,
            )?),
        };
        Ok(simulator)
    }

    pub fn simulation_type(&self) -> SimulationType {
        match self {
            NeuronSimulator::AllAtOnce(_) => SimulationType::AllAtOnce,
            NeuronSimulator::OneAtATime(_) => SimulationType::OneAtATime,
            NeuronSimulator::LogprobFree(_) => SimulationType::LogprobFree,
        }
    }

    pub fn explanation(&self) -> &str {
        match self {
            NeuronSimulator::AllAtOnce(s) => s.explanation(),
            NeuronSimulator::OneAtATime(s) => s.explanation(),
            NeuronSimulator::LogprobFree(s) => s.explanation(),
        }
    }

    pub async fn simulate(&self, tokens: &[String]) -> Result<SequenceSimulation, SimulationError> {
        match self {
            NeuronSimulator::AllAtOnce(s) => s.simulate(tokens).await,
            NeuronSimulator::OneAtATime(s) => s.simulate(tokens).await,
            NeuronSimulator::LogprobFree(s) => s.simulate(tokens).await,
        }
    }
}
