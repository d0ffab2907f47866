use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use super::NotificationSink;

/// Posts `{recipient, subject, text}` as JSON to a webhook (Slack-compatible
/// `text` field).
pub struct WebhookSink {
    url: String,
    client: Client,
    timeout: Duration,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait::async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let payload = serde_json::json!({
            "recipient": recipient,
            "subject": subject,
            "text": format!("*{subject}*\n{body}"),
        });

        self.client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .context("webhook post")?
            .error_for_status()
            .context("webhook non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
