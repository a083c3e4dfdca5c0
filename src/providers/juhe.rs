use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::util::with_retry;
use crate::core::exchange::{RateProvider, RateQuote};

/// Juhe.cn currency API client. The upstream reports rates as strings inside
/// an `error_code`/`result` envelope.
pub struct JuheRateProvider {
    base_url: String,
    api_key: String,
}

impl JuheRateProvider {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        JuheRateProvider {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct JuheResponse {
    error_code: i64,
    reason: Option<String>,
    #[serde(default)]
    result: Vec<JuheRateItem>,
}

#[derive(Deserialize, Debug)]
struct JuheRateItem {
    exchange: Option<String>,
    #[serde(alias = "updateTime", default)]
    update_time: String,
}

#[async_trait]
impl RateProvider for JuheRateProvider {
    #[instrument(
        name = "JuheRateFetch",
        skip(self),
        fields(from = %from, to = %to)
    )]
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<RateQuote> {
        if self.api_key.is_empty() {
            return Err(anyhow!("Exchange API key is not configured"));
        }

        let url = format!("{}/onebox/exchange/currency", self.base_url);
        debug!("Requesting exchange rate from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("seabrief/1.0")
            .build()?;
        let params = [
            ("key", self.api_key.as_str()),
            ("from", from),
            ("to", to),
            ("version", "2"),
        ];

        let response = with_retry(|| async { client.get(&url).query(&params).send().await })
            .await
            .map_err(|e| anyhow!("Rate request error: {e} for pair: {from}/{to}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for pair: {from}/{to}",
                response.status()
            ));
        }

        let data = response.json::<JuheResponse>().await?;
        if data.error_code != 0 {
            return Err(anyhow!(
                "Exchange API error {}: {}",
                data.error_code,
                data.reason.unwrap_or_else(|| "unknown".to_string())
            ));
        }

        let item = data
            .result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No rate data found for pair: {from}/{to}"))?;

        // An unparsable rate is a data-quality problem, not a transport one;
        // report it as an empty observation so the monitor rejects it.
        let rate = match item.exchange.as_deref() {
            Some(text) => match text.parse::<f64>() {
                Ok(rate) => Some(rate),
                Err(_) => {
                    warn!("Unparsable exchange value from upstream: {text:?}");
                    None
                }
            },
            None => None,
        };

        Ok(RateQuote {
            rate,
            update_time: item.update_time,
        })
    }
}
