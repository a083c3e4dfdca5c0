//! Briefing bot orchestration: fetch, validate, format, push.

pub mod message;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::future::join3;
use tracing::{error, info, warn};

use crate::config::{AppConfig, BotConfig, GroupConfig};
use crate::core::exchange::RateProvider;
use crate::core::news::NewsProvider;
use crate::core::notify::{AlertSink, Notifier};
use crate::core::weather::WeatherProvider;
use crate::monitor::history::RateHistoryStore;
use crate::monitor::validator::RateValidator;
use message::{ExchangeReport, MessageBuilder, NewsReport, WeatherReport};

pub use message::{CityBriefing, alert_message};

/// Fans a rate-anomaly alert out to the bot's groups as a markdown card.
pub struct GroupAlertSink<'a> {
    notifier: &'a dyn Notifier,
    groups: &'a [GroupConfig],
    bot_name: String,
    pair: String,
    currency: String,
    last_rate: Option<f64>,
}

impl<'a> GroupAlertSink<'a> {
    pub fn new(
        notifier: &'a dyn Notifier,
        groups: &'a [GroupConfig],
        bot: &BotConfig,
        last_rate: Option<f64>,
    ) -> Self {
        Self {
            notifier,
            groups,
            bot_name: bot.name.clone(),
            pair: format!("{}/{}", bot.target_currency, bot.currency),
            currency: bot.currency.clone(),
            last_rate,
        }
    }
}

#[async_trait]
impl AlertSink for GroupAlertSink<'_> {
    async fn send_alert(
        &self,
        reason: &str,
        current_rate: f64,
        change_percent: Option<f64>,
    ) -> Result<()> {
        if self.groups.is_empty() {
            return Err(anyhow!("No groups configured for rate alerts"));
        }

        let text = alert_message(
            &self.bot_name,
            &self.pair,
            reason,
            current_rate,
            self.last_rate,
            change_percent,
        );
        let title = format!("Rate anomaly alert - {}", self.currency);

        let mut sent = 0;
        for group in self.groups {
            match self
                .notifier
                .send_markdown(&group.open_conversation_id, &title, &text)
                .await
            {
                Ok(()) => {
                    info!("Rate alert sent to group: {}", group.name);
                    sent += 1;
                }
                Err(e) => error!("Failed to send rate alert to group {}: {e:#}", group.name),
            }
        }

        if sent == 0 {
            return Err(anyhow!("Rate alert could not be delivered to any group"));
        }
        Ok(())
    }
}

/// What one bot run produced, for the end-of-run report.
#[derive(Debug, Clone)]
pub struct BotOutcome {
    pub bot_name: String,
    pub weather_ok: bool,
    /// `None` when no news provider is configured.
    pub news_ok: Option<bool>,
    pub rate: Option<f64>,
    pub rate_accepted: bool,
    pub alert_sent: bool,
    pub groups_sent: usize,
    pub groups_total: usize,
    pub error: Option<String>,
}

pub struct Bot<'a> {
    config: &'a BotConfig,
    groups: Vec<GroupConfig>,
}

impl<'a> Bot<'a> {
    pub fn new(config: &'a BotConfig, app: &AppConfig) -> Self {
        let groups = app.groups_for(config).into_iter().cloned().collect();
        Self { config, groups }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// One briefing cycle: concurrent weather + rate fetch, rate validation
    /// with alerting, message build, group fan-out. Never fails the process;
    /// everything that goes wrong lands in the returned outcome.
    pub async fn run<S: RateHistoryStore>(
        &self,
        weather_provider: &dyn WeatherProvider,
        rate_provider: &dyn RateProvider,
        news_provider: Option<&dyn NewsProvider>,
        notifier: &dyn Notifier,
        validator: &RateValidator<S>,
        builder: &dyn MessageBuilder,
    ) -> BotOutcome {
        let bot = self.config;
        info!("[{}] Starting briefing run", bot.name);

        let last_rate = validator
            .last_point(&bot.target_currency, &bot.currency)
            .map(|point| point.rate);
        let sink = GroupAlertSink::new(notifier, &self.groups, bot, last_rate);

        let news_fetch = async {
            match news_provider {
                Some(provider) => Some(provider.fetch_headlines(&bot.news_code()).await),
                None => None,
            }
        };
        let (weather_result, rate_result, news_result) = join3(
            weather_provider.fetch_forecast(bot.latitude, bot.longitude, bot.weather_timezone()),
            rate_provider.fetch_rate(&bot.target_currency, &bot.currency),
            news_fetch,
        )
        .await;

        let weather = match weather_result {
            Ok(forecast) => {
                info!("[{}] Received {}-day forecast", bot.name, forecast.len());
                WeatherReport {
                    forecast,
                    error: None,
                }
            }
            Err(e) => {
                warn!("[{}] Weather fetch failed: {e:#}", bot.name);
                WeatherReport {
                    forecast: Vec::new(),
                    error: Some(format!("{e:#}")),
                }
            }
        };

        let news = match news_result {
            None => NewsReport::default(),
            Some(Ok(headlines)) => {
                info!("[{}] Received {} headline(s)", bot.name, headlines.len());
                NewsReport {
                    headlines,
                    error: None,
                }
            }
            Some(Err(e)) => {
                // News never blocks the briefing
                warn!("[{}] News fetch failed: {e:#}", bot.name);
                NewsReport {
                    headlines: Vec::new(),
                    error: Some(format!("{e:#}")),
                }
            }
        };

        let mut alert_sent = false;
        let exchange = match rate_result {
            Ok(quote) => {
                let outcome = validator
                    .check_and_record(
                        quote.rate,
                        &bot.target_currency,
                        &bot.currency,
                        &quote.update_time,
                        Some(&sink),
                    )
                    .await;
                alert_sent = outcome.alert_sent;

                let accepted = outcome.result.accepted;
                if accepted {
                    if let Some(rate) = quote.rate {
                        info!(
                            "[{}] Rate: 1 {} = {rate} {}",
                            bot.name, bot.target_currency, bot.currency
                        );
                    }
                }
                ExchangeReport {
                    rate: quote.rate,
                    update_time: quote.update_time,
                    accepted,
                    error: (!accepted).then(|| outcome.result.reason),
                }
            }
            Err(e) => {
                error!("[{}] Rate fetch failed: {e:#}", bot.name);
                match sink
                    .send_alert(&format!("rate fetch failed: {e:#}"), 0.0, None)
                    .await
                {
                    Ok(()) => alert_sent = true,
                    Err(sink_err) => error!("[{}] Failed to send rate alert: {sink_err:#}", bot.name),
                }
                ExchangeReport {
                    rate: None,
                    update_time: String::new(),
                    accepted: false,
                    error: Some(format!("{e:#}")),
                }
            }
        };

        let mut outcome = BotOutcome {
            bot_name: bot.name.clone(),
            weather_ok: weather.ok(),
            news_ok: news_provider.map(|_| news.ok()),
            rate: exchange.rate,
            rate_accepted: exchange.accepted,
            alert_sent,
            groups_sent: 0,
            groups_total: self.groups.len(),
            error: None,
        };

        if !weather.ok() && !exchange.ok() {
            error!(
                "[{}] Both weather and rate unavailable, briefing not sent",
                bot.name
            );
            outcome.error = Some("weather and rate both unavailable".to_string());
            return outcome;
        }

        if self.groups.is_empty() {
            error!("[{}] No groups configured, briefing not sent", bot.name);
            outcome.error = Some("no groups configured".to_string());
            return outcome;
        }

        let text = builder.build_message(bot, &weather, &exchange, &news);
        let title = format!("{} daily briefing", bot.city);

        for group in &self.groups {
            match notifier
                .send_markdown(&group.open_conversation_id, &title, &text)
                .await
            {
                Ok(()) => {
                    info!("[{}] Briefing sent to group: {}", bot.name, group.name);
                    outcome.groups_sent += 1;
                }
                Err(e) => error!(
                    "[{}] Failed to send briefing to group {}: {e:#}",
                    bot.name, group.name
                ),
            }
        }

        info!(
            "[{}] Briefing run done: {}/{} group(s)",
            bot.name, outcome.groups_sent, outcome.groups_total
        );
        outcome
    }
}
