//! Webhook notifications for uploaded snapshots.
//!
//! Messages are posted as `{"text": "..."}`, which Slack, Mattermost and most
//! chat incoming-webhooks accept as-is.

use serde::Serialize;
use tracing::info;

use crate::utils::errors::{BackupError, Result};

pub const DEFAULT_MESSAGE: &str = "New backup snapshot uploaded";

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    client: reqwest::Client,
    webhook_url: String,
    message: String,
    host: String,
}

impl Notifier {
    pub fn new(webhook_url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
            message: message.into(),
            host: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown-host".to_string()),
        }
    }

    /// Text announcing a finished upload.
    pub fn snapshot_message(&self, object_name: &str) -> String {
        format!("{}: {} (from {})", self.message, object_name, self.host)
    }

    /// Post `text` to the webhook.
    pub async fn post_message(&self, text: &str) -> Result<()> {
        let failed = |reason: String| BackupError::Notification {
            endpoint: self.webhook_url.clone(),
            reason,
        };

        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&WebhookPayload { text })
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(failed(format!("HTTP {}: {}", status, body)));
        }

        info!("Notification sent to {}", self.webhook_url);
        Ok(())
    }

    /// Announce an uploaded snapshot.
    pub async fn notify_snapshot(&self, object_name: &str) -> Result<()> {
        self.post_message(&self.snapshot_message(object_name)).await
    }
}
