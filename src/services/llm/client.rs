use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::error::PredictorError;
use crate::prompt::{Message, Prompt};
use super::predictor::Predictor;
use super::types::{PredictionRequest, PredictionResponse, ResponseLogprobs, TokenLogprobs};

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            model: "default".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl ClientConfig {
    /// Reads `NEURON_SIM_BASE_URL`, `NEURON_SIM_MODEL`, `NEURON_SIM_API_KEY`
    /// and `NEURON_SIM_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("NEURON_SIM_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("NEURON_SIM_MODEL").unwrap_or(defaults.model),
            api_key: std::env::var("NEURON_SIM_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout_secs: std::env::var("NEURON_SIM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Plain HTTP predictor. No caching, no retries.
#[derive(Clone)]
pub struct LLMService {
    client: Client,
    config: ClientConfig,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    echo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logprobs: Option<u8>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
    logprobs: Option<CompletionLogprobs>,
}

#[derive(Deserialize)]
struct CompletionLogprobs {
    text_offset: Vec<usize>,
    // The first echoed token has no alternatives and comes back as null.
    top_logprobs: Vec<Option<TokenLogprobs>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    logprobs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_logprobs: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    logprobs: Option<ChatLogprobs>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatLogprobs {
    content: Option<Vec<ChatTokenLogprob>>,
}

#[derive(Deserialize)]
struct ChatTokenLogprob {
    token: String,
    #[serde(default)]
    top_logprobs: Vec<ChatTopLogprob>,
}

#[derive(Deserialize)]
struct ChatTopLogprob {
    token: String,
    logprob: f64,
}

impl LLMService {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> Result<R, PredictorError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let mut request = self.client.post(url).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(PredictorError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    async fn complete(&self, prompt: &str, request: &PredictionRequest) -> Result<PredictionResponse, PredictorError> {
        if request.response_schema.is_some() {
            return Err(PredictorError::Unsupported(
                "response schema needs a structured prompt (chat endpoint)",
            ));
        }
        let body = CompletionRequest {
            model: &self.config.model,
            prompt,
            max_tokens: request.max_tokens,
            echo: request.echo,
            temperature: request.temperature,
            logprobs: request.logprobs,
        };
        let resp: CompletionResponse = self.post("/v1/completions", &body).await?;
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| PredictorError::Malformed("completion has no choices".to_string()))?;

        Ok(PredictionResponse {
            text: choice.text,
            logprobs: choice.logprobs.map(|lp| ResponseLogprobs {
                text_offset: lp.text_offset,
                top_logprobs: lp.top_logprobs.into_iter().map(Option::unwrap_or_default).collect(),
            }),
        })
    }

    async fn chat(&self, messages: &[Message], request: &PredictionRequest) -> Result<PredictionResponse, PredictorError> {
        // Chat endpoints cannot echo the prompt back for scoring.
        if request.echo {
            return Err(PredictorError::Unsupported("echo scoring needs a text prompt (completions endpoint)"));
        }
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            logprobs: request.logprobs.is_some(),
            top_logprobs: request.logprobs,
            response_format: request.response_schema.as_ref().map(|schema| {
                json!({
                    "type": "json_schema",
                    "json_schema": { "name": "simulation", "schema": schema, "strict": true }
                })
            }),
        };
        let resp: ChatResponse = self.post("/v1/chat/completions", &body).await?;
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| PredictorError::Malformed("chat completion has no choices".to_string()))?;

        let logprobs = choice.logprobs.and_then(|lp| lp.content).map(chat_logprobs_to_offsets);
        Ok(PredictionResponse {
            text: choice.message.content.unwrap_or_default(),
            logprobs,
        })
    }
}

/// Chat endpoints report logprobs per token without offsets;
/// rebuild character offsets by accumulating token lengths.
fn chat_logprobs_to_offsets(content: Vec<ChatTokenLogprob>) -> ResponseLogprobs {
    let mut offset = 0;
    let mut trace = ResponseLogprobs::default();
    for entry in content {
        trace.text_offset.push(offset);
        offset += entry.token.chars().count();
        trace
            .top_logprobs
            .push(entry.top_logprobs.into_iter().map(|t| (t.token, t.logprob)).collect());
    }
    trace
}

impl Predictor for LLMService {
    async fn predict(&self, request: PredictionRequest) -> Result<PredictionResponse, PredictorError> {
        debug!(
            "Predictor request: max_tokens={} echo={} logprobs={:?}",
            request.max_tokens, request.echo, request.logprobs
        );
        match &request.prompt {
            Prompt::Text(prompt) => self.complete(prompt, &request).await,
            Prompt::Messages(messages) => self.chat(messages, &request).await,
        }
    }
}
