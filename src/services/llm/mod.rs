pub mod client;
pub mod predictor;
pub mod types;

pub use client::{ClientConfig, LLMService};
pub use predictor::Predictor;
pub use types::*;
