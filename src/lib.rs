pub mod bot;
pub mod cli;
pub mod config;
pub mod core;
pub mod monitor;
pub mod providers;

use anyhow::{Context, Result, bail};
use chrono::Duration;
use tracing::{debug, info};

use crate::bot::{Bot, CityBriefing};
use crate::cli::report;
use crate::cli::report::CheckItem;
use crate::config::{AppConfig, BotConfig};
use crate::core::news::NewsProvider;
use crate::monitor::history::JsonFileStore;
use crate::monitor::validator::RateValidator;
use crate::providers::dingtalk::DingTalkClient;
use crate::providers::juhe::JuheRateProvider;
use crate::providers::newsdata::NewsDataProvider;
use crate::providers::open_meteo::OpenMeteoProvider;

pub enum AppCommand {
    /// Push briefings, optionally limited to one bot by name or country.
    Run {
        name: Option<String>,
        country: Option<String>,
    },
    /// Validate configuration and upstream API connectivity.
    Check,
    /// Drop rate-history entries older than the given number of days.
    Prune { days: i64 },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Run { name, country } => {
            run_bots(&config, name.as_deref(), country.as_deref()).await
        }
        AppCommand::Check => check_setup(&config).await,
        AppCommand::Prune { days } => prune_history(&config, days),
    }
}

fn build_validator(config: &AppConfig) -> Result<RateValidator<JsonFileStore>> {
    let store = JsonFileStore::new(config.history_path()?);
    Ok(RateValidator::with_limits(
        store,
        config.monitor.change_threshold,
        config.monitor.rate_min,
        config.monitor.rate_max,
    ))
}

async fn run_bots(config: &AppConfig, name: Option<&str>, country: Option<&str>) -> Result<()> {
    info!("Briefing push starting...");

    let weather_base = config
        .providers
        .weather
        .as_ref()
        .map_or("https://api.open-meteo.com", |p| p.base_url.as_str());
    let weather_provider = OpenMeteoProvider::new(weather_base);

    let (exchange_base, exchange_key) = config
        .providers
        .exchange
        .as_ref()
        .map_or(("http://op.juhe.cn", ""), |p| {
            (p.base_url.as_str(), p.api_key.as_str())
        });
    let rate_provider = JuheRateProvider::new(exchange_base, exchange_key);

    // News is an optional section; skipped entirely without an API key
    let news_provider = config
        .providers
        .news
        .as_ref()
        .filter(|p| !p.api_key.is_empty())
        .map(|p| NewsDataProvider::new(&p.base_url, &p.api_key, &p.language));

    let dingtalk = config
        .providers
        .dingtalk
        .as_ref()
        .context("DingTalk credentials are not configured")?;
    let notifier = DingTalkClient::from_config(dingtalk)?;

    let validator = build_validator(config)?;

    let selected: Vec<&BotConfig> = config
        .bots
        .iter()
        .filter(|bot| name.is_none_or(|name| bot.name == name))
        .filter(|bot| country.is_none_or(|country| bot.country == country))
        .collect();
    if selected.is_empty() {
        bail!("No bot matches the requested name/country filter");
    }

    let pb = report::new_progress_bar(selected.len() as u64);
    let mut outcomes = Vec::with_capacity(selected.len());
    for bot_config in selected {
        pb.set_message(bot_config.name.clone());
        let bot = Bot::new(bot_config, config);
        let outcome = bot
            .run(
                &weather_provider,
                &rate_provider,
                news_provider.as_ref().map(|p| p as &dyn NewsProvider),
                &notifier,
                &validator,
                &CityBriefing,
            )
            .await;
        outcomes.push(outcome);
        pb.inc(1);
    }
    pb.finish_and_clear();

    report::print_run_report(&outcomes);

    let succeeded = outcomes.iter().filter(|o| o.groups_sent > 0).count();
    info!("Briefing push complete: {succeeded}/{} bot(s)", outcomes.len());
    Ok(())
}

/// Mirrors what a run needs: complete config, resolvable group references
/// and reachable upstream APIs. Connectivity tests are skipped for
/// providers whose credentials are not configured.
async fn check_setup(config: &AppConfig) -> Result<()> {
    use crate::core::exchange::RateProvider;
    use crate::core::weather::WeatherProvider;

    info!("Checking configuration and upstream APIs...");
    let mut items = Vec::new();

    items.push(CheckItem::new(
        "bots",
        !config.bots.is_empty(),
        format!(
            "{} bot(s), {} group(s) configured",
            config.bots.len(),
            config.groups.len()
        ),
    ));

    for bot in &config.bots {
        let dangling: Vec<&str> = bot
            .groups
            .iter()
            .filter(|name| !config.groups.iter().any(|group| &&group.name == name))
            .map(String::as_str)
            .collect();
        let resolved = config.groups_for(bot).len();

        let (ok, detail) = if !dangling.is_empty() {
            (
                false,
                format!("unknown group reference(s): {}", dangling.join(", ")),
            )
        } else if resolved == 0 {
            (false, "no groups configured".to_string())
        } else {
            (true, format!("{resolved} group(s) resolved"))
        };
        items.push(CheckItem::new(&format!("groups: {}", bot.name), ok, detail));
    }

    let exchange_key_configured = config
        .providers
        .exchange
        .as_ref()
        .is_some_and(|p| !p.api_key.is_empty());
    items.push(CheckItem::new(
        "exchange credentials",
        exchange_key_configured,
        if exchange_key_configured {
            "API key configured"
        } else {
            "exchange API key missing"
        },
    ));

    let dingtalk = config.providers.dingtalk.as_ref();
    items.push(CheckItem::new(
        "dingtalk credentials",
        dingtalk.is_some(),
        if dingtalk.is_some() {
            "client id and secret configured"
        } else {
            "dingtalk section missing"
        },
    ));

    let news_key_configured = config
        .providers
        .news
        .as_ref()
        .is_some_and(|p| !p.api_key.is_empty());
    items.push(CheckItem::new(
        "news credentials",
        true,
        if news_key_configured {
            "API key configured"
        } else {
            "not configured (news section disabled)"
        },
    ));

    if let Some(bot) = config.bots.first() {
        let weather_base = config
            .providers
            .weather
            .as_ref()
            .map_or("https://api.open-meteo.com", |p| p.base_url.as_str());
        let weather_provider = OpenMeteoProvider::new(weather_base);
        let (ok, detail) = match weather_provider
            .fetch_forecast(bot.latitude, bot.longitude, bot.weather_timezone())
            .await
        {
            Ok(forecast) => (true, format!("{}-day forecast for {}", forecast.len(), bot.city)),
            Err(e) => (false, format!("{e:#}")),
        };
        items.push(CheckItem::new("weather API", ok, detail));

        if exchange_key_configured {
            let (exchange_base, exchange_key) = config
                .providers
                .exchange
                .as_ref()
                .map_or(("http://op.juhe.cn", ""), |p| {
                    (p.base_url.as_str(), p.api_key.as_str())
                });
            let rate_provider = JuheRateProvider::new(exchange_base, exchange_key);
            let (ok, detail) = match rate_provider
                .fetch_rate(&bot.target_currency, &bot.currency)
                .await
            {
                Ok(quote) => (
                    true,
                    format!(
                        "1 {} = {} {}",
                        bot.target_currency,
                        quote.rate.map_or("?".to_string(), |r| r.to_string()),
                        bot.currency
                    ),
                ),
                Err(e) => (false, format!("{e:#}")),
            };
            items.push(CheckItem::new("exchange API", ok, detail));
        }
    }

    if let Some(dingtalk) = dingtalk {
        let (ok, detail) = match DingTalkClient::from_config(dingtalk) {
            Ok(client) => match client.check_auth().await {
                Ok(()) => (true, "access token obtained".to_string()),
                Err(e) => (false, format!("{e:#}")),
            },
            Err(e) => (false, format!("{e:#}")),
        };
        items.push(CheckItem::new("dingtalk API", ok, detail));
    }

    report::print_check_report(&items);

    let failed = items.iter().filter(|item| !item.ok).count();
    if failed > 0 {
        bail!("{failed} check(s) failed");
    }
    Ok(())
}

fn prune_history(config: &AppConfig, days: i64) -> Result<()> {
    if days <= 0 {
        bail!("Retention must be at least one day");
    }
    let validator = build_validator(config)?;
    validator.prune(Duration::days(days));
    Ok(())
}
