//! Weather forecast abstractions and qualitative mappings

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};

/// One day of forecast data, already mapped to display-friendly fields.
#[derive(Debug, Clone)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub weather_code: u8,
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub precipitation_mm: f64,
    pub windspeed_kmh: f64,
}

impl DailyForecast {
    /// Short `MM/DD` form used in the briefing table.
    pub fn date_short(&self) -> String {
        format!("{:02}/{:02}", self.date.month(), self.date.day())
    }

    pub fn weekday(&self) -> &'static str {
        match self.date.weekday() {
            chrono::Weekday::Mon => "Mon",
            chrono::Weekday::Tue => "Tue",
            chrono::Weekday::Wed => "Wed",
            chrono::Weekday::Thu => "Thu",
            chrono::Weekday::Fri => "Fri",
            chrono::Weekday::Sat => "Sat",
            chrono::Weekday::Sun => "Sun",
        }
    }

    pub fn weather(&self) -> &'static str {
        weather_description(self.weather_code)
    }

    pub fn wind(&self) -> WindLevel {
        WindLevel::from_kmh(self.windspeed_kmh)
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        timezone: &str,
    ) -> Result<Vec<DailyForecast>>;
}

/// WMO weather interpretation codes, as reported by Open-Meteo.
pub fn weather_description(code: u8) -> &'static str {
    match code {
        0 => "☀️ Clear",
        1 | 2 => "🌤️ Partly cloudy",
        3 => "☁️ Overcast",
        45 => "🌫️ Fog",
        48 => "🌫️ Rime fog",
        51 | 61 | 80 => "🌧️ Light rain",
        53 | 63 | 81 => "🌧️ Moderate rain",
        55 | 65 => "🌧️ Heavy rain",
        56 | 57 | 66 | 67 => "🌧️ Freezing rain",
        71 | 85 => "🌨️ Light snow",
        73 | 86 => "🌨️ Moderate snow",
        75 => "🌨️ Heavy snow",
        77 => "🌨️ Snow grains",
        82 => "⛈️ Rain showers",
        95 => "⛈️ Thunderstorm",
        96 | 99 => "⛈️ Thunderstorm with hail",
        _ => "🌡️ Unknown",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindLevel {
    pub icon: &'static str,
    pub label: &'static str,
}

impl WindLevel {
    pub fn from_kmh(speed: f64) -> Self {
        let (icon, label) = match speed {
            s if s < 5.0 => ("🍃", "Calm"),
            s if s < 20.0 => ("🌿", "Light breeze"),
            s if s < 40.0 => ("🍃", "Gentle breeze"),
            s if s < 60.0 => ("🌾", "Moderate wind"),
            s if s < 80.0 => ("💨", "Strong wind"),
            _ => ("🌪️", "Gale"),
        };
        Self { icon, label }
    }
}

/// Wind above 60 km/h or daily rain above 30 mm triggers a warning line.
pub fn extreme_weather_alerts(forecast: &[DailyForecast]) -> Vec<String> {
    let mut alerts = Vec::new();

    for day in forecast {
        if day.windspeed_kmh > 60.0 {
            alerts.push(format!(
                "⚠️ **{} {}**: wind speeds up to {:.1} km/h, secure loose objects",
                day.date_short(),
                day.weekday(),
                day.windspeed_kmh
            ));
        }
        if day.precipitation_mm > 30.0 {
            alerts.push(format!(
                "⚠️ **{} {}**: {:.1} mm of rain expected, flooding possible",
                day.date_short(),
                day.weekday(),
                day.precipitation_mm
            ));
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forecast_day(date: &str, wind: f64, rain: f64) -> DailyForecast {
        DailyForecast {
            date: date.parse().unwrap(),
            weather_code: 0,
            temp_max: Some(31.0),
            temp_min: Some(24.0),
            precipitation_mm: rain,
            windspeed_kmh: wind,
        }
    }

    #[test]
    fn test_wind_level_boundaries() {
        assert_eq!(WindLevel::from_kmh(0.0).label, "Calm");
        assert_eq!(WindLevel::from_kmh(5.0).label, "Light breeze");
        assert_eq!(WindLevel::from_kmh(39.9).label, "Gentle breeze");
        assert_eq!(WindLevel::from_kmh(75.0).label, "Strong wind");
        assert_eq!(WindLevel::from_kmh(120.0).label, "Gale");
    }

    #[test]
    fn test_extreme_weather_alerts() {
        let forecast = vec![
            forecast_day("2025-06-02", 10.0, 2.0),
            forecast_day("2025-06-03", 65.0, 2.0),
            forecast_day("2025-06-04", 10.0, 45.0),
        ];

        let alerts = extreme_weather_alerts(&forecast);
        assert_eq!(alerts.len(), 2);
        assert!(alerts[0].contains("65.0 km/h"));
        assert!(alerts[1].contains("45.0 mm"));
    }

    #[test]
    fn test_date_short_and_weekday() {
        let day = forecast_day("2025-06-02", 0.0, 0.0);
        assert_eq!(day.date_short(), "06/02");
        assert_eq!(day.weekday(), "Mon");
    }

    #[test]
    fn test_weather_description_unknown_code() {
        assert_eq!(weather_description(42), "🌡️ Unknown");
    }
}
