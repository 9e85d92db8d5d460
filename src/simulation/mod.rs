//! Explanation-driven neuron simulation.
//!
//! A simulator turns (explanation, tokens) into a prompt, asks a
//! [`Predictor`](crate::services::llm::Predictor) for a prediction and
//! decodes the answer into a [`SequenceSimulation`].
//!
//! - `all_at_once`: one echo call, distributions from logprobs
//! - `token_by_token`: one call per token, distributions from logprobs
//! - `logprob_free`: one free-text or JSON call, point estimates only

pub mod all_at_once;
pub mod distribution;
pub mod logprob_free;
pub mod logprob_parser;
pub mod prompts;
pub mod simulator;
pub mod text_parser;
pub mod token_by_token;
pub mod types;

pub use all_at_once::ExplanationNeuronSimulator;
pub use distribution::{compute_expected_value, compute_predicted_activation_stats, parse_top_logprobs, ActivationDistribution};
pub use logprob_free::LogprobFreeExplanationTokenSimulator;
pub use logprob_parser::parse_simulation_response;
pub use simulator::NeuronSimulator;
pub use text_parser::{parse_no_logprobs_completion, parse_no_logprobs_completion_json};
pub use token_by_token::ExplanationTokenByTokenSimulator;
pub use types::{ActivationScale, SequenceSimulation};
