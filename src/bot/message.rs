//! Markdown message building for briefings and rate alerts.
//!
//! DingTalk markdown ignores plain newlines inside a message card, so the
//! templates join lines with `<br>` the way the platform expects.

use chrono::Local;

use crate::config::BotConfig;
use crate::core::news::NewsHeadline;
use crate::core::weather::{DailyForecast, extreme_weather_alerts};

/// Weather half of a briefing; `error` is set when the fetch failed.
#[derive(Debug, Clone, Default)]
pub struct WeatherReport {
    pub forecast: Vec<DailyForecast>,
    pub error: Option<String>,
}

impl WeatherReport {
    pub fn ok(&self) -> bool {
        self.error.is_none() && !self.forecast.is_empty()
    }
}

/// Exchange half of a briefing. `accepted` means the rate passed validation;
/// a fetched-but-rejected rate is never shown in the briefing.
#[derive(Debug, Clone, Default)]
pub struct ExchangeReport {
    pub rate: Option<f64>,
    pub update_time: String,
    pub accepted: bool,
    pub error: Option<String>,
}

impl ExchangeReport {
    pub fn ok(&self) -> bool {
        self.accepted && self.rate.is_some()
    }
}

/// News half of a briefing. The default (no provider configured) carries no
/// headlines and no error, and the briefing omits the section entirely.
#[derive(Debug, Clone, Default)]
pub struct NewsReport {
    pub headlines: Vec<NewsHeadline>,
    pub error: Option<String>,
}

impl NewsReport {
    pub fn ok(&self) -> bool {
        self.error.is_none() && !self.headlines.is_empty()
    }
}

/// Builds the message body pushed to each group. One required operation;
/// implementations own the whole template.
pub trait MessageBuilder: Send + Sync {
    fn build_message(
        &self,
        bot: &BotConfig,
        weather: &WeatherReport,
        exchange: &ExchangeReport,
        news: &NewsReport,
    ) -> String;
}

/// The standard city template: date and rate header, 7-day forecast table,
/// extreme-weather section, data-source footer.
pub struct CityBriefing;

impl CityBriefing {
    fn forecast_table(forecast: &[DailyForecast]) -> String {
        let mut table = String::new();
        table.push_str("| Date | Day | Weather | Temp | Wind |<br>");
        table.push_str("| ---- | ---- | ---- | ---- | ---- |<br>");

        for day in forecast {
            let temp = match (day.temp_min, day.temp_max) {
                (Some(min), Some(max)) => format!("{min:.0}~{max:.0}℃"),
                _ => "N/A".to_string(),
            };
            let wind = day.wind();

            table.push_str(&format!(
                "| {} | {} | {} | {} | {}{} |<br>",
                day.date_short(),
                day.weekday(),
                day.weather(),
                temp,
                wind.icon,
                wind.label
            ));
        }

        table
    }

    fn news_section(news: &NewsReport) -> String {
        if !news.ok() && news.error.is_none() {
            // News is not configured for this bot
            return String::new();
        }

        let body = if news.headlines.is_empty() {
            "No local news available".to_string()
        } else {
            news.headlines
                .iter()
                .enumerate()
                .map(|(i, headline)| format!("{}. [{}]({})", i + 1, headline.title, headline.link))
                .collect::<Vec<_>>()
                .join("<br>")
        };

        format!("<br><br>## 📰 Local headlines<br><br>{body}")
    }
}

impl MessageBuilder for CityBriefing {
    fn build_message(
        &self,
        bot: &BotConfig,
        weather: &WeatherReport,
        exchange: &ExchangeReport,
        news: &NewsReport,
    ) -> String {
        let today = Local::now().format("%Y-%m-%d");

        let rate_text = if exchange.ok() {
            format!(
                "1 {} = {} {}",
                bot.target_currency,
                exchange.rate.unwrap_or_default(),
                bot.currency
            )
        } else {
            "unavailable".to_string()
        };

        let weather_table = Self::forecast_table(&weather.forecast);

        let alerts = extreme_weather_alerts(&weather.forecast);
        let alert_section = if alerts.is_empty() {
            String::new()
        } else {
            format!(
                "<br><br>## 🚨 Extreme weather warning<br><br>{}",
                alerts.join("<br>")
            )
        };

        let news_section = Self::news_section(news);

        format!(
            "{} {} daily briefing<br><br>📅 Date: {today}<br>💱 Rate: {rate_text}<br><br>\
             ## 📊 7-day forecast<br><br>{weather_table}{alert_section}{news_section}<br><br>\
             <i>*Data from Open-Meteo and Juhe.cn*</i>",
            bot.country, bot.city
        )
    }
}

/// Markdown body for a rate-anomaly alert.
pub fn alert_message(
    bot_name: &str,
    currency_pair: &str,
    reason: &str,
    current_rate: f64,
    last_rate: Option<f64>,
    change_percent: Option<f64>,
) -> String {
    let change_info = match (change_percent, last_rate) {
        (Some(change), _) => format!("<br>**Change**: {change:+.2}%"),
        (None, Some(last)) if last > 0.0 => {
            let change = (current_rate - last) / last * 100.0;
            format!("<br>**Change**: {change:+.2}%")
        }
        _ => String::new(),
    };
    let last_rate_info = last_rate
        .map(|last| format!("<br>**Previous rate**: {last}"))
        .unwrap_or_default();
    let now = Local::now().format("%Y-%m-%d %H:%M:%S");

    format!(
        "## 🚨 Rate anomaly alert<br><br>**Monitor**: {bot_name}<br>\
         **Pair**: {currency_pair}<br>**Problem**: {reason}<br>\
         **Current rate**: {current_rate}{change_info}{last_rate_info}<br><br>\
         **Time**: {now}<br><br>Check the exchange API or contact an administrator."
    )
}
