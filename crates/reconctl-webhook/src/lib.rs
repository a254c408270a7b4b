//! The `Notifier` collaborator (spec §6): fire-and-forget POST of the
//! completion summary. The core only ever calls [`Notifier::notify`] — it
//! never treats a delivery failure as a Run failure, per spec §6: "failures
//! logged, do not affect exit code."

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("webhook returned non-success status {0}")]
    Status(reqwest::StatusCode),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, summary_json: &serde_json::Value) -> Result<(), NotifyError>;
}

/// Posts the summary JSON to a fixed URL with a bounded timeout. Built once
/// per Run; holds its own `reqwest::Client` so connection pooling doesn't
/// interfere with the `Stage` fan-out's own HTTP clients (`js_analyze`).
pub struct HttpNotifier {
    url: String,
    client: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { url: url.into(), client }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, summary_json: &serde_json::Value) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(summary_json).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status()));
        }
        Ok(())
    }
}

/// Calls `notifier.notify`, logging (never propagating) any failure — the
/// shape every call site in the engine uses so the policy can't be
/// accidentally bypassed by a `?`.
pub async fn notify_best_effort(notifier: &dyn Notifier, summary_json: &serde_json::Value) {
    if let Err(err) = notifier.notify(summary_json).await {
        tracing::warn!(error = %err, "webhook notification failed");
    }
}
