#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use neuron_simulator::services::llm::{
    PredictionRequest, PredictionResponse, Predictor, ResponseLogprobs, TokenLogprobs,
};
use neuron_simulator::PredictorError;

type Responder = dyn Fn(&PredictionRequest) -> Result<PredictionResponse, PredictorError> + Send + Sync;
type Delay = dyn Fn(&PredictionRequest) -> Duration + Send + Sync;

/// Scripted predictor: records every request, answers through a closure,
/// optionally sleeps per request to reorder completions.
pub struct MockPredictor {
    responder: Box<Responder>,
    delay: Option<Box<Delay>>,
    pub requests: Mutex<Vec<PredictionRequest>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockPredictor {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&PredictionRequest) -> Result<PredictionResponse, PredictorError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay<D>(mut self, delay: D) -> Self
    where
        D: Fn(&PredictionRequest) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Predictor for MockPredictor {
    async fn predict(&self, request: PredictionRequest) -> Result<PredictionResponse, PredictorError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(&request)).await;
        }

        let response = (self.responder)(&request);
        self.requests.lock().unwrap().push(request);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

pub fn toks(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

pub fn table(entries: &[(&str, f64)]) -> TokenLogprobs {
    entries.iter().map(|(t, lp)| (*t, *lp)).collect()
}

/// Builds an echoed scoring response for `tokens`: some preamble, the
/// `<start>` block, and one registered response token at every `unknown`.
/// `tables[i]` is reported for the i-th subject token.
pub fn echoed_response(preamble: &str, tokens: &[String], tables: Vec<TokenLogprobs>) -> PredictionResponse {
    let mut text = format!("{preamble}\n<start>");
    let mut text_offset = vec![0];
    let mut top_logprobs = vec![TokenLogprobs::default()];

    for (token, t) in tokens.iter().zip(tables) {
        text.push_str(&format!("\n{token}\t"));
        text_offset.push(text.chars().count());
        top_logprobs.push(t);
        text.push_str("unknown");
    }
    text.push_str("\n<end>\n");

    PredictionResponse {
        text,
        logprobs: Some(ResponseLogprobs { text_offset, top_logprobs }),
    }
}
