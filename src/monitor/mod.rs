//! Exchange-rate monitoring: validation, single-slot history, alerting.

pub mod history;
pub mod validator;

pub use history::{JsonFileStore, MemoryStore, RateHistoryStore, RatePoint};
pub use validator::{CheckOutcome, RateValidator, ValidationResult};
