//! Messaging abstractions

use anyhow::Result;
use async_trait::async_trait;

/// Sends a markdown message to a single group chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_markdown(&self, conversation_id: &str, title: &str, text: &str) -> Result<()>;
}

/// Receives rate-anomaly alerts. The monitor calls this when validation
/// rejects a rate; failures are logged by the monitor and never change the
/// validation outcome.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_alert(
        &self,
        reason: &str,
        current_rate: f64,
        change_percent: Option<f64>,
    ) -> Result<()>;
}
