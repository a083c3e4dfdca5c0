//! Exchange rate abstractions

use anyhow::Result;
use async_trait::async_trait;

/// A single observation from a rate source. `rate` is `None` when the
/// upstream returned a value that could not be parsed into a number; transport
/// and API-level failures surface as errors from the provider instead.
#[derive(Debug, Clone)]
pub struct RateQuote {
    pub rate: Option<f64>,
    pub update_time: String,
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<RateQuote>;
}
