use thiserror::Error;

use crate::few_shot::FewShotExampleSet;

/// Failures raised by a predictor backend.
/// Retry policy lives with the backend, never in the simulators.
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("predictor returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed predictor response: {0}")]
    Malformed(String),

    /// The request asks for something the chosen endpoint cannot do.
    #[error("unsupported request: {0}")]
    Unsupported(&'static str),
}

/// Conversation layout violations caught while building a prompt.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("structured prompts must open with a system message")]
    MissingSystemMessage,

    #[error("extra system message at position {0} is not allowed")]
    ExtraSystemMessage(usize),

    #[error("consecutive {role} messages at position {index}")]
    ConsecutiveRole { role: &'static str, index: usize },

    #[error("instruction-following prompts need at least one user message")]
    MissingUserMessage,
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("predictor call failed: {0}")]
    Predictor(#[from] PredictorError),

    #[error("prompt construction failed: {0}")]
    Prompt(#[from] PromptError),

    /// The `<start>` marker is absent from an echoed logprob response.
    #[error("no scoring start marker found in response text")]
    MissingStartMarker,

    /// Echoed text diverged from `\n<token>\tunknown` at a subject token.
    #[error("response text does not echo token {index} ({token:?}) at offset {offset}")]
    TokenMismatch { index: usize, token: String, offset: usize },

    /// No response token begins right after the tab, usually because the
    /// tab was merged into a neighbouring token by the predictor's tokenizer.
    #[error("no response token starts at character offset {offset} (token {index}); tab likely merged")]
    OffsetNotFound { index: usize, offset: usize },

    #[error("response carries no logprobs for {0}")]
    MissingLogprobs(String),

    #[error("few-shot example set {0:?} is not supported by this simulator")]
    UnsupportedExampleSet(FewShotExampleSet),

    #[error("few-shot example set {0:?} has no single-token prediction example")]
    MissingSingleTokenExample(FewShotExampleSet),

    #[error("explanation must not be empty")]
    EmptyExplanation,

    #[error("per-token prediction task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}
