use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::util::with_retry;
use crate::core::news::{NewsHeadline, NewsProvider};

/// How many headlines the briefing shows per city.
const HEADLINE_COUNT: usize = 3;

/// NewsData.io client. The upstream wraps both successes and failures in a
/// `status` envelope; on error the `results` field turns into an object
/// carrying the message.
pub struct NewsDataProvider {
    base_url: String,
    api_key: String,
    language: String,
}

impl NewsDataProvider {
    pub fn new(base_url: &str, api_key: &str, language: &str) -> Self {
        NewsDataProvider {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            language: language.to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct NewsResponse {
    status: String,
    #[serde(default)]
    results: serde_json::Value,
}

#[derive(Deserialize, Debug)]
struct NewsItem {
    title: Option<String>,
    link: Option<String>,
}

#[async_trait]
impl NewsProvider for NewsDataProvider {
    #[instrument(name = "NewsDataFetch", skip(self), fields(country = %country_code))]
    async fn fetch_headlines(&self, country_code: &str) -> Result<Vec<NewsHeadline>> {
        if self.api_key.is_empty() {
            return Err(anyhow!("News API key is not configured"));
        }

        let url = format!("{}/api/1/news", self.base_url);
        debug!("Requesting headlines from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("seabrief/1.0")
            .build()?;
        let params = [
            ("apikey", self.api_key.as_str()),
            ("country", country_code),
            ("language", self.language.as_str()),
        ];

        let response = with_retry(|| async { client.get(&url).query(&params).send().await })
            .await
            .map_err(|e| anyhow!("News request error: {e} for country: {country_code}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} from news API",
                response.status()
            ));
        }

        let data = response.json::<NewsResponse>().await?;
        if data.status != "success" {
            let message = data
                .results
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            return Err(anyhow!("News API error: {message}"));
        }

        let items: Vec<NewsItem> = serde_json::from_value(data.results)
            .map_err(|e| anyhow!("Unexpected news payload: {e}"))?;

        let headlines = items
            .into_iter()
            .take(HEADLINE_COUNT)
            .map(|item| NewsHeadline {
                title: item.title.unwrap_or_else(|| "Untitled".to_string()),
                link: item.link.unwrap_or_else(|| "#".to_string()),
            })
            .collect::<Vec<_>>();

        debug!("Received {} headline(s)", headlines.len());
        Ok(headlines)
    }
}
