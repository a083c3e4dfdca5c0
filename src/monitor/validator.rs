//! Exchange-rate validation against bounds and the last accepted value.

use crate::core::notify::AlertSink;
use crate::monitor::history::{RateHistoryStore, RatePoint};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

pub const DEFAULT_CHANGE_THRESHOLD: f64 = 5.0;
pub const DEFAULT_RATE_MIN: f64 = 0.01;
pub const DEFAULT_RATE_MAX: f64 = 10000.0;

/// Outcome of one `validate` call. `reason` is always populated;
/// `change_percent` only when a prior value existed and the volatility check
/// ran.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub accepted: bool,
    pub reason: String,
    pub change_percent: Option<f64>,
}

impl ValidationResult {
    fn accept(change_percent: Option<f64>) -> Self {
        Self {
            accepted: true,
            reason: "ok".to_string(),
            change_percent,
        }
    }

    fn reject(reason: String, change_percent: Option<f64>) -> Self {
        Self {
            accepted: false,
            reason,
            change_percent,
        }
    }
}

/// Result of the composed `check_and_record` flow.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub result: ValidationResult,
    pub alert_sent: bool,
}

/// Decides whether a freshly observed rate is trustworthy, and maintains the
/// single last-accepted slot per currency pair used for that decision.
pub struct RateValidator<S: RateHistoryStore> {
    change_threshold: f64,
    rate_min: f64,
    rate_max: f64,
    store: S,
}

impl<S: RateHistoryStore> RateValidator<S> {
    pub fn new(store: S) -> Self {
        Self::with_limits(
            store,
            DEFAULT_CHANGE_THRESHOLD,
            DEFAULT_RATE_MIN,
            DEFAULT_RATE_MAX,
        )
    }

    pub fn with_limits(store: S, change_threshold: f64, rate_min: f64, rate_max: f64) -> Self {
        Self {
            change_threshold,
            rate_min,
            rate_max,
            store,
        }
    }

    fn pair_key(from: &str, to: &str) -> String {
        format!("{from}_{to}")
    }

    /// Last accepted observation for the pair. A store read failure is
    /// treated as empty history, so validation proceeds without the
    /// volatility check rather than blocking the run.
    pub fn last_point(&self, from: &str, to: &str) -> Option<RatePoint> {
        let history = match self.store.load() {
            Ok(history) => history,
            Err(e) => {
                warn!("Failed to load rate history, treating as empty: {e:#}");
                return None;
            }
        };
        history.get(&Self::pair_key(from, to)).cloned()
    }

    /// Checks a new observation without persisting anything. Callers invoke
    /// `record` after an accepted result.
    pub fn validate(
        &self,
        rate: Option<f64>,
        from: &str,
        to: &str,
        check_volatility: bool,
    ) -> ValidationResult {
        let Some(rate) = rate else {
            return ValidationResult::reject("rate value is empty".to_string(), None);
        };

        if rate <= 0.0 {
            return ValidationResult::reject(
                format!("invalid rate value: {rate} (should be positive)"),
                None,
            );
        }

        if rate < self.rate_min || rate > self.rate_max {
            return ValidationResult::reject(
                format!(
                    "rate value out of range: {rate} (expected between {} and {})",
                    self.rate_min, self.rate_max
                ),
                None,
            );
        }

        let mut change_percent = None;
        if check_volatility {
            if let Some(last) = self.last_point(from, to) {
                if last.rate > 0.0 {
                    let change = (rate - last.rate) / last.rate * 100.0;
                    change_percent = Some(change);
                    if change.abs() > self.change_threshold {
                        return ValidationResult::reject(
                            format!(
                                "rate moved {change:+.2}% (from {} to {rate}, threshold {}%)",
                                last.rate, self.change_threshold
                            ),
                            change_percent,
                        );
                    }
                }
            }
        }

        ValidationResult::accept(change_percent)
    }

    /// Overwrites the pair slot with a fresh observation. Unconditional:
    /// callers are expected to validate first. A write failure is logged and
    /// swallowed; the in-memory decision already returned stands, the value
    /// simply will not be available for the next run's comparison.
    pub fn record(&self, rate: f64, from: &str, to: &str, source_update_time: &str) {
        let key = Self::pair_key(from, to);

        let mut history = match self.store.load() {
            Ok(history) => history,
            Err(e) => {
                warn!("Failed to load rate history before record: {e:#}");
                Default::default()
            }
        };

        history.insert(
            key.clone(),
            RatePoint {
                rate,
                observed_at: Utc::now().to_rfc3339(),
                source_update_time: source_update_time.to_string(),
            },
        );

        match self.store.save(&history) {
            Ok(()) => info!("Recorded rate: {key} = {rate}"),
            Err(e) => warn!("Failed to save rate history: {e:#}"),
        }
    }

    /// Full flow: validate, then record on accept or alert on reject. A sink
    /// failure is logged here and never masks the validation outcome;
    /// `alert_sent` is true only when the sink ran successfully.
    pub async fn check_and_record(
        &self,
        rate: Option<f64>,
        from: &str,
        to: &str,
        source_update_time: &str,
        sink: Option<&dyn AlertSink>,
    ) -> CheckOutcome {
        let result = self.validate(rate, from, to, true);
        let mut alert_sent = false;

        if result.accepted {
            // rate is present whenever validation accepted
            if let Some(rate) = rate {
                self.record(rate, from, to, source_update_time);
                if let Some(change) = result.change_percent {
                    info!("Rate accepted: {rate} (change {change:+.2}%)");
                }
            }
        } else {
            error!("Rate validation failed: {}", result.reason);
            if let Some(sink) = sink {
                match sink
                    .send_alert(&result.reason, rate.unwrap_or_default(), result.change_percent)
                    .await
                {
                    Ok(()) => alert_sent = true,
                    Err(e) => error!("Failed to send rate alert: {e:#}"),
                }
            }
        }

        CheckOutcome { result, alert_sent }
    }

    /// Drops entries strictly older than `max_age`. Entries whose stored
    /// timestamp cannot be parsed are retained.
    pub fn prune(&self, max_age: Duration) {
        let history = match self.store.load() {
            Ok(history) => history,
            Err(e) => {
                warn!("Failed to load rate history for pruning: {e:#}");
                return;
            }
        };

        let cutoff = Utc::now() - max_age;
        let before = history.len();
        let kept: std::collections::HashMap<_, _> = history
            .into_iter()
            .filter(|(key, point)| {
                match DateTime::parse_from_rfc3339(&point.observed_at) {
                    Ok(observed_at) => {
                        let stale = observed_at.with_timezone(&Utc) < cutoff;
                        if stale {
                            debug!("Pruning stale rate record: {key}");
                        }
                        !stale
                    }
                    // Keep records we cannot date rather than guessing
                    Err(_) => true,
                }
            })
            .collect();

        let removed = before - kept.len();
        if removed > 0 {
            if let Err(e) = self.store.save(&kept) {
                warn!("Failed to save pruned rate history: {e:#}");
                return;
            }
            info!("Pruned {removed} stale rate record(s)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::history::MemoryStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn validator() -> RateValidator<MemoryStore> {
        RateValidator::new(MemoryStore::new())
    }

    struct RecordingSink {
        calls: Mutex<Vec<(String, f64, Option<f64>)>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new(fail: bool) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail,
            }
        }

        fn calls(&self) -> Vec<(String, f64, Option<f64>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl crate::core::notify::AlertSink for RecordingSink {
        async fn send_alert(
            &self,
            reason: &str,
            current_rate: f64,
            change_percent: Option<f64>,
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((reason.to_string(), current_rate, change_percent));
            if self.fail {
                anyhow::bail!("sink down");
            }
            Ok(())
        }
    }

    #[test]
    fn test_missing_rate_is_rejected() {
        let result = validator().validate(None, "CNY", "PHP", true);
        assert!(!result.accepted);
        assert_eq!(result.reason, "rate value is empty");
        assert!(result.change_percent.is_none());
    }

    #[test]
    fn test_non_positive_rates_are_rejected() {
        for rate in [0.0, -1.0, -7.85] {
            let result = validator().validate(Some(rate), "CNY", "PHP", true);
            assert!(!result.accepted, "{rate} should be rejected");
            assert!(result.reason.contains("positive"));
            assert!(result.change_percent.is_none());
        }
    }

    #[test]
    fn test_out_of_range_rates_are_rejected() {
        let v = validator();

        let result = v.validate(Some(0.005), "CNY", "PHP", true);
        assert!(!result.accepted);
        assert!(result.reason.contains("0.005"));
        assert!(result.reason.contains("0.01") && result.reason.contains("10000"));

        let result = v.validate(Some(20000.0), "CNY", "PHP", true);
        assert!(!result.accepted);
        assert!(result.change_percent.is_none());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let v = validator();
        assert!(v.validate(Some(0.01), "CNY", "PHP", true).accepted);
        assert!(v.validate(Some(10000.0), "CNY", "PHP", true).accepted);
    }

    #[test]
    fn test_first_observation_accepted_without_change() {
        let result = validator().validate(Some(7.85), "CNY", "PHP", true);
        assert!(result.accepted);
        assert!(result.change_percent.is_none());
    }

    #[test]
    fn test_volatility_rejection_reports_signed_change() {
        let v = validator();
        v.record(8.0, "CNY", "PHP", "");

        // -10% move, well past the 5% threshold
        let result = v.validate(Some(7.2), "CNY", "PHP", true);
        assert!(!result.accepted);
        let change = result.change_percent.unwrap();
        assert!((change - (-10.0)).abs() < 1e-9);
        assert!(result.reason.contains("-10.00%"));
        assert!(result.reason.contains('8') && result.reason.contains("7.2"));
        assert!(result.reason.contains('5'));
    }

    #[test]
    fn test_change_within_threshold_is_accepted() {
        let v = validator();
        v.record(8.0, "CNY", "PHP", "");

        let result = v.validate(Some(8.2), "CNY", "PHP", true);
        assert!(result.accepted);
        let change = result.change_percent.unwrap();
        assert!((change - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_volatility_check_can_be_disabled() {
        let v = validator();
        v.record(8.0, "CNY", "PHP", "");

        let result = v.validate(Some(16.0), "CNY", "PHP", false);
        assert!(result.accepted);
        assert!(result.change_percent.is_none());
    }

    #[test]
    fn test_pairs_are_independent() {
        let v = validator();
        v.record(8.0, "CNY", "PHP", "");

        // Same value would be a 100%+ move on CNY_PHP
        let result = v.validate(Some(16.0), "CNY", "VND", true);
        assert!(result.accepted);
        assert!(result.change_percent.is_none());
    }

    #[test]
    fn test_record_is_idempotent() {
        let store = MemoryStore::new();
        let v = RateValidator::new(store);
        v.record(7.85, "CNY", "PHP", "2025-06-02 16:30:00");
        let first = v.last_point("CNY", "PHP").unwrap();

        v.record(7.85, "CNY", "PHP", "2025-06-02 16:30:00");
        let second = v.last_point("CNY", "PHP").unwrap();

        assert_eq!(first.rate, second.rate);
        assert_eq!(first.source_update_time, second.source_update_time);
    }

    #[test]
    fn test_concrete_cny_php_scenario() {
        let v = validator();

        // No prior value: accepted, no change computed
        let result = v.validate(Some(7.85), "CNY", "PHP", true);
        assert!(result.accepted);
        assert!(result.change_percent.is_none());
        v.record(7.85, "CNY", "PHP", "");

        // +8.28% move: rejected
        let result = v.validate(Some(8.5), "CNY", "PHP", true);
        assert!(!result.accepted);
        assert!((result.change_percent.unwrap() - 8.28).abs() < 0.01);

        // +1.91% move against the still-recorded 7.85: accepted
        let result = v.validate(Some(8.0), "CNY", "PHP", true);
        assert!(result.accepted);
        assert!((result.change_percent.unwrap() - 1.91).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_check_and_record_persists_on_accept() {
        let v = validator();
        let sink = RecordingSink::new(false);

        let outcome = v
            .check_and_record(Some(7.85), "CNY", "PHP", "16:30", Some(&sink))
            .await;

        assert!(outcome.result.accepted);
        assert!(!outcome.alert_sent);
        assert!(sink.calls().is_empty());
        assert_eq!(v.last_point("CNY", "PHP").unwrap().rate, 7.85);
    }

    #[tokio::test]
    async fn test_check_and_record_alerts_on_reject() {
        let v = validator();
        v.record(7.85, "CNY", "PHP", "");
        let sink = RecordingSink::new(false);

        let outcome = v
            .check_and_record(Some(8.5), "CNY", "PHP", "", Some(&sink))
            .await;

        assert!(!outcome.result.accepted);
        assert!(outcome.alert_sent);

        let calls = sink.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, 8.5);
        assert!((calls[0].2.unwrap() - 8.28).abs() < 0.01);

        // Rejection must not overwrite the last accepted slot
        assert_eq!(v.last_point("CNY", "PHP").unwrap().rate, 7.85);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_mask_result() {
        let v = validator();
        let sink = RecordingSink::new(true);

        let outcome = v
            .check_and_record(None, "CNY", "PHP", "", Some(&sink))
            .await;

        assert!(!outcome.result.accepted);
        assert_eq!(outcome.result.reason, "rate value is empty");
        assert!(!outcome.alert_sent);
        assert_eq!(sink.calls().len(), 1);
    }

    #[test]
    fn test_prune_removes_only_stale_entries() {
        let store = MemoryStore::new();
        let mut history = HashMap::new();
        history.insert(
            "CNY_PHP".to_string(),
            RatePoint {
                rate: 7.85,
                observed_at: (Utc::now() - Duration::days(45)).to_rfc3339(),
                source_update_time: String::new(),
            },
        );
        history.insert(
            "CNY_VND".to_string(),
            RatePoint {
                rate: 3650.0,
                observed_at: Utc::now().to_rfc3339(),
                source_update_time: String::new(),
            },
        );
        history.insert(
            "CNY_IDR".to_string(),
            RatePoint {
                rate: 2280.0,
                observed_at: "not a timestamp".to_string(),
                source_update_time: String::new(),
            },
        );
        store.save(&history).unwrap();

        let v = RateValidator::new(store);
        v.prune(Duration::days(30));

        assert!(v.last_point("CNY", "PHP").is_none());
        assert!(v.last_point("CNY", "VND").is_some());
        // Unparsable timestamps are retained, not deleted
        assert!(v.last_point("CNY", "IDR").is_some());
    }
}
