//! Local news abstractions

use anyhow::Result;
use async_trait::async_trait;

/// One headline for the briefing's news section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsHeadline {
    pub title: String,
    pub link: String,
}

/// Fetches the top local headlines for a country. Providers trim the list
/// to the number of items the briefing shows.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn fetch_headlines(&self, country_code: &str) -> Result<Vec<NewsHeadline>>;
}
