use std::future::Future;

use crate::error::PredictorError;
use super::types::{PredictionRequest, PredictionResponse};

/// The language model backend a simulator delegates to.
///
/// Caching, retries and rate limiting belong to implementations.
/// Simulators treat any returned error as fatal for the current call.
pub trait Predictor: Send + Sync + 'static {
    fn predict(
        &self,
        request: PredictionRequest,
    ) -> impl Future<Output = Result<PredictionResponse, PredictorError>> + Send;
}
