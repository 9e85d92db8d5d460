use std::fmt;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::prompt::Prompt;

/// Top alternative tokens for one generated position, in the order the
/// predictor reported them. Deserializes from a JSON object
/// (`{"3": -0.2, "0": -1.9}`) or from a list of `[token, logprob]` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenLogprobs(pub Vec<(String, f64)>);

impl TokenLogprobs {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self(entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(t, lp)| (t.as_str(), *lp))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for TokenLogprobs {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(t, lp)| (t.into(), lp)).collect())
    }
}

impl Serialize for TokenLogprobs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (token, logprob) in &self.0 {
            map.serialize_entry(token, logprob)?;
        }
        map.end()
    }
}

struct TokenLogprobsVisitor;

impl<'de> Visitor<'de> for TokenLogprobsVisitor {
    type Value = TokenLogprobs;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of token to logprob or a list of [token, logprob] pairs")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((token, logprob)) = access.next_entry::<String, f64>()? {
            entries.push((token, logprob));
        }
        Ok(TokenLogprobs(entries))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(pair) = access.next_element::<(String, f64)>()? {
            entries.push(pair);
        }
        Ok(TokenLogprobs(entries))
    }
}

impl<'de> Deserialize<'de> for TokenLogprobs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TokenLogprobsVisitor)
    }
}

/// Per generated-token logprob trace, legacy completions shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseLogprobs {
    /// Character (not byte) offset in `text` where each response token starts.
    pub text_offset: Vec<usize>,
    pub top_logprobs: Vec<TokenLogprobs>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub prompt: Prompt,
    pub max_tokens: u32,
    pub echo: bool,
    pub temperature: Option<f32>,
    /// Number of top alternatives to report per position.
    pub logprobs: Option<u8>,
    /// JSON schema the predictor output must conform to.
    pub response_schema: Option<serde_json::Value>,
}

impl PredictionRequest {
    /// Echo the prompt back and score it without generating.
    pub fn score_echo(prompt: Prompt, logprobs: u8) -> Self {
        Self {
            prompt,
            max_tokens: 0,
            echo: true,
            temperature: None,
            logprobs: Some(logprobs),
            response_schema: None,
        }
    }

    /// Sample exactly one token and report its alternatives.
    pub fn single_token(prompt: Prompt, logprobs: u8) -> Self {
        Self {
            prompt,
            max_tokens: 1,
            echo: false,
            temperature: None,
            logprobs: Some(logprobs),
            response_schema: None,
        }
    }

    /// Deterministic free-text generation, no logprobs.
    pub fn free_text(prompt: Prompt, max_tokens: u32, response_schema: Option<serde_json::Value>) -> Self {
        Self {
            prompt,
            max_tokens,
            echo: false,
            temperature: Some(0.0),
            logprobs: None,
            response_schema,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Generated text, preceded by the prompt when echo was requested.
    pub text: String,
    pub logprobs: Option<ResponseLogprobs>,
}

impl PredictionResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            logprobs: None,
        }
    }
}
