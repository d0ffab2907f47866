// src/notify/throttle.rs
use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewArticles,
    Digest,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewArticles => "new_articles",
            NotificationKind::Digest => "digest",
        }
    }
}

/// When each recipient last got an email of either kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastEmailLog {
    last_sent: HashMap<String, DateTime<Utc>>,
}

impl LastEmailLog {
    pub fn last_sent(&self, recipient: &str) -> Option<DateTime<Utc>> {
        self.last_sent.get(recipient).copied()
    }

    pub fn record(&mut self, recipient: &str, now: DateTime<Utc>) {
        self.last_sent.insert(recipient.to_string(), now);
    }
}

/// Gate for run notifications.
/// - Any new article: send now, regardless of the last email.
/// - Nothing new: digest only once the interval since the last email has
///   elapsed (first digest always passes).
/// - State is updated explicitly via `LastEmailLog::record` after a send.
#[derive(Debug, Clone)]
pub struct DigestThrottle {
    interval: ChronoDuration,
}

impl Default for DigestThrottle {
    fn default() -> Self {
        Self::daily()
    }
}

impl DigestThrottle {
    /// `interval_secs` < 0 is treated as 0 (digest every run).
    pub fn new(interval_secs: i64) -> Self {
        Self {
            interval: ChronoDuration::try_seconds(interval_secs.max(0))
                .unwrap_or(ChronoDuration::MAX),
        }
    }

    pub fn daily() -> Self {
        Self::new(24 * 3600)
    }

    /// Decide what to send for one run. Does NOT mutate state.
    pub fn decide(
        &self,
        log: &LastEmailLog,
        recipient: &str,
        total_new: usize,
        now: DateTime<Utc>,
    ) -> Option<NotificationKind> {
        if total_new > 0 {
            return Some(NotificationKind::NewArticles);
        }
        match log.last_sent(recipient) {
            None => Some(NotificationKind::Digest),
            Some(ts) if now.signed_duration_since(ts) >= self.interval => {
                Some(NotificationKind::Digest)
            }
            Some(_) => None,
        }
    }
}
