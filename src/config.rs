use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::monitor::validator::{DEFAULT_CHANGE_THRESHOLD, DEFAULT_RATE_MAX, DEFAULT_RATE_MIN};

fn default_target_currency() -> String {
    "CNY".to_string()
}

/// One briefing bot: a city, its currency pair and its target groups.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BotConfig {
    pub name: String,
    pub country: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub currency: String,
    pub currency_name: String,
    #[serde(default = "default_target_currency")]
    pub target_currency: String,
    pub groups: Vec<String>,
    pub timezone: Option<String>,
    pub news_code: Option<String>,
}

impl BotConfig {
    /// Timezone passed to the weather API. Falls back to the country's
    /// capital-city zone when not set explicitly.
    pub fn weather_timezone(&self) -> &str {
        if let Some(tz) = &self.timezone {
            return tz;
        }
        match self.country.as_str() {
            "PH" => "Asia/Manila",
            "VN" => "Asia/Ho_Chi_Minh",
            "ID" => "Asia/Jakarta",
            "MY" => "Asia/Kuala_Lumpur",
            _ => "Asia/Shanghai",
        }
    }

    /// Country code passed to the news API. NewsData.io uses "vi" for
    /// Vietnam; the other supported countries match their lowercased
    /// ISO code.
    pub fn news_code(&self) -> String {
        if let Some(code) = &self.news_code {
            return code.clone();
        }
        match self.country.as_str() {
            "VN" => "vi".to_string(),
            other => other.to_lowercase(),
        }
    }
}

/// A DingTalk group chat this app can post to.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GroupConfig {
    pub name: String,
    pub open_conversation_id: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WeatherProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NewsProviderConfig {
    #[serde(default = "NewsProviderConfig::default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "NewsProviderConfig::default_language")]
    pub language: String,
}

impl NewsProviderConfig {
    fn default_base_url() -> String {
        "https://newsdata.io".to_string()
    }

    fn default_language() -> String {
        "zh".to_string()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DingTalkConfig {
    #[serde(default = "DingTalkConfig::default_base_url")]
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub robot_code: Option<String>,
}

impl DingTalkConfig {
    fn default_base_url() -> String {
        "https://api.dingtalk.com".to_string()
    }

    /// Robot code defaults to the client id, matching the platform's
    /// single-robot app setup.
    pub fn robot_code(&self) -> &str {
        self.robot_code.as_deref().unwrap_or(&self.client_id)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub weather: Option<WeatherProviderConfig>,
    pub exchange: Option<ExchangeProviderConfig>,
    pub news: Option<NewsProviderConfig>,
    pub dingtalk: Option<DingTalkConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            weather: Some(WeatherProviderConfig {
                base_url: "https://api.open-meteo.com".to_string(),
            }),
            exchange: Some(ExchangeProviderConfig {
                base_url: "http://op.juhe.cn".to_string(),
                api_key: String::new(),
            }),
            news: None,
            dingtalk: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "MonitorConfig::default_change_threshold")]
    pub change_threshold: f64,
    #[serde(default = "MonitorConfig::default_rate_min")]
    pub rate_min: f64,
    #[serde(default = "MonitorConfig::default_rate_max")]
    pub rate_max: f64,
    pub history_path: Option<String>,
}

impl MonitorConfig {
    fn default_change_threshold() -> f64 {
        DEFAULT_CHANGE_THRESHOLD
    }

    fn default_rate_min() -> f64 {
        DEFAULT_RATE_MIN
    }

    fn default_rate_max() -> f64 {
        DEFAULT_RATE_MAX
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            change_threshold: Self::default_change_threshold(),
            rate_min: Self::default_rate_min(),
            rate_max: Self::default_rate_max(),
            history_path: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub bots: Vec<BotConfig>,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "codito", "seabrief")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    /// Where accepted exchange rates are persisted between runs.
    pub fn history_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.monitor.history_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("in", "codito", "seabrief")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().join("exchange_history.json"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// The subset of configured groups a bot posts to, matched by name.
    pub fn groups_for(&self, bot: &BotConfig) -> Vec<&GroupConfig> {
        self.groups
            .iter()
            .filter(|group| bot.groups.contains(&group.name))
            .collect()
    }
}
