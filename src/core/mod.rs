//! Core business logic abstractions

pub mod exchange;
pub mod log;
pub mod news;
pub mod notify;
pub mod weather;

// Re-export main types for cleaner imports
pub use exchange::{RateProvider, RateQuote};
pub use news::{NewsHeadline, NewsProvider};
pub use notify::{AlertSink, Notifier};
pub use weather::{DailyForecast, WeatherProvider};
