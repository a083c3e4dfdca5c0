use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::util::with_retry;
use crate::core::weather::{DailyForecast, WeatherProvider};

/// Open-Meteo forecast client. No API key, seven daily values per request.
pub struct OpenMeteoProvider {
    base_url: String,
}

impl OpenMeteoProvider {
    pub fn new(base_url: &str) -> Self {
        OpenMeteoProvider {
            base_url: base_url.to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct ForecastResponse {
    daily: DailySeries,
}

#[derive(Deserialize, Debug)]
struct DailySeries {
    time: Vec<String>,
    #[serde(default)]
    weather_code: Vec<Option<u8>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    windspeed_10m_max: Vec<Option<f64>>,
}

fn series_value(series: &[Option<f64>], index: usize) -> Option<f64> {
    series.get(index).copied().flatten()
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    #[instrument(
        name = "OpenMeteoFetch",
        skip(self),
        fields(latitude = %latitude, longitude = %longitude)
    )]
    async fn fetch_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        timezone: &str,
    ) -> Result<Vec<DailyForecast>> {
        let url = format!("{}/v1/forecast", self.base_url);
        debug!("Requesting forecast from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("seabrief/1.0")
            .build()?;
        let params = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            (
                "daily",
                "weather_code,temperature_2m_max,temperature_2m_min,precipitation_sum,windspeed_10m_max"
                    .to_string(),
            ),
            ("forecast_days", "7".to_string()),
            ("timezone", timezone.to_string()),
        ];

        let response = with_retry(|| async { client.get(&url).query(&params).send().await })
            .await
            .map_err(|e| anyhow!("Forecast request error: {e} for URL: {url}"))?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {} from weather API", response.status()));
        }

        let data = response.json::<ForecastResponse>().await?;
        let daily = data.daily;

        let mut forecast = Vec::with_capacity(daily.time.len());
        for (i, date_str) in daily.time.iter().enumerate() {
            let date: NaiveDate = date_str
                .parse()
                .map_err(|e| anyhow!("Invalid forecast date '{date_str}': {e}"))?;

            forecast.push(DailyForecast {
                date,
                weather_code: daily.weather_code.get(i).copied().flatten().unwrap_or(0),
                temp_max: series_value(&daily.temperature_2m_max, i),
                temp_min: series_value(&daily.temperature_2m_min, i),
                precipitation_mm: series_value(&daily.precipitation_sum, i).unwrap_or(0.0),
                windspeed_kmh: series_value(&daily.windspeed_10m_max, i).unwrap_or(0.0),
            });
        }

        debug!("Received {} forecast day(s)", forecast.len());
        Ok(forecast)
    }
}
