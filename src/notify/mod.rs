pub mod compose;
pub mod email;
pub mod inbox;
pub mod throttle;
pub mod webhook;

use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::config::NotifyCfg;
use crate::store::ModuleStore;

pub use throttle::{DigestThrottle, LastEmailLog, NotificationKind};

/// Delivery capability for run notifications.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Fans one notification out to every configured sink. Each sink is tried;
/// the call succeeds when at least one sink delivered.
pub struct NotifierMux {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl NotifierMux {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    /// Inbox always; SMTP and webhook when configured.
    pub fn from_config(cfg: &NotifyCfg, store: Arc<dyn ModuleStore>) -> Self {
        let mut sinks: Vec<Arc<dyn NotificationSink>> =
            vec![Arc::new(inbox::InboxSink::new(store, cfg.sender.clone()))];

        if cfg.smtp {
            match email::EmailSender::from_env() {
                Ok(Some(s)) => sinks.push(Arc::new(s)),
                Ok(None) => tracing::warn!("SMTP enabled but SMTP_HOST unset; skipping"),
                Err(e) => tracing::warn!(error = ?e, "SMTP sink disabled"),
            }
        }
        if let Some(url) = cfg.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
            sinks.push(Arc::new(webhook::WebhookSink::new(url.to_string())));
        }
        Self::new(sinks)
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }
}

#[async_trait::async_trait]
impl NotificationSink for NotifierMux {
    async fn deliver(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let mut failed = Vec::new();
        let mut delivered = 0usize;
        for s in &self.sinks {
            match s.deliver(recipient, subject, body).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(error = ?e, sink = s.name(), "notification sink failed");
                    failed.push(s.name());
                }
            }
        }
        if delivered > 0 {
            Ok(())
        } else if failed.is_empty() {
            Err(anyhow!("no notification sinks configured"))
        } else {
            Err(anyhow!("all sinks failed: {}", failed.join(", ")))
        }
    }

    fn name(&self) -> &'static str {
        "mux"
    }
}
