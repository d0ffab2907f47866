use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;

use super::NotificationSink;
use crate::store::{ModuleStore, MESSAGES};

/// "Email" as used inside the lab app: a message record in the shared
/// messages collection, landing unread in the recipient's inbox.
pub struct InboxSink {
    store: Arc<dyn ModuleStore>,
    sender: String,
}

impl InboxSink {
    pub fn new(store: Arc<dyn ModuleStore>, sender: impl Into<String>) -> Self {
        Self {
            store,
            sender: sender.into(),
        }
    }
}

#[async_trait::async_trait]
impl NotificationSink for InboxSink {
    async fn deliver(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let msg = serde_json::json!({
            "sender": self.sender,
            "recipient": recipient,
            "subject": subject,
            "body": body,
            "folder": "inbox",
            "read": false,
            "date": Utc::now(),
        });
        self.store
            .save(MESSAGES, msg)
            .await
            .context("saving inbox message")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "inbox"
    }
}
