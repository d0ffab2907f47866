//! Standing literature queries ("watches") kept in the module store.

use std::fmt;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{ModuleStore, WATCH_ITEMS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchType {
    Author,
    Keyword,
    Orcid,
}

impl fmt::Display for WatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatchType::Author => "author",
            WatchType::Keyword => "keyword",
            WatchType::Orcid => "orcid",
        };
        f.write_str(s)
    }
}

/// Identity is the exact `(type, value)` pair; no case folding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchItem {
    #[serde(rename = "type")]
    pub kind: WatchType,
    pub value: String,
}

impl WatchItem {
    pub fn new(kind: WatchType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// `type-value`, the key novelty snapshots are stored under.
    pub fn key(&self) -> String {
        format!("{}-{}", self.kind, self.value)
    }
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredWatch {
    pub id: String,
    #[serde(flatten)]
    pub item: WatchItem,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added(StoredWatch),
    Duplicate(StoredWatch),
}

/// Every parseable watch record. Store failures and malformed rows yield
/// fewer (possibly zero) watches, never an error.
pub async fn load_watches(store: &dyn ModuleStore) -> Vec<StoredWatch> {
    let rows = match store.fetch(WATCH_ITEMS).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = ?e, "watch list unavailable; treating as empty");
            return Vec::new();
        }
    };
    rows.into_iter()
        .filter_map(|r| match serde_json::from_value::<StoredWatch>(r) {
            Ok(w) if !w.item.value.trim().is_empty() => Some(w),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed watch record");
                None
            }
        })
        .collect()
}

/// Active watches in stored order, duplicates collapsed.
pub async fn active_watches(store: &dyn ModuleStore) -> Vec<WatchItem> {
    let mut out: Vec<WatchItem> = Vec::new();
    for w in load_watches(store).await {
        if w.active && !out.contains(&w.item) {
            out.push(w.item);
        }
    }
    out
}

pub async fn add_watch(store: &dyn ModuleStore, item: WatchItem) -> Result<AddOutcome> {
    if item.value.trim().is_empty() {
        return Err(anyhow!("watch value must not be empty"));
    }
    if let Some(existing) = load_watches(store)
        .await
        .into_iter()
        .find(|w| w.item == item)
    {
        return Ok(AddOutcome::Duplicate(existing));
    }

    let rec = serde_json::json!({
        "type": item.kind,
        "value": item.value,
        "active": true,
        "createdAt": Utc::now(),
    });
    let saved = store.save(WATCH_ITEMS, rec).await.context("saving watch")?;
    let stored: StoredWatch = serde_json::from_value(saved).context("decoding saved watch")?;
    Ok(AddOutcome::Added(stored))
}

pub async fn remove_watch(store: &dyn ModuleStore, id: &str) -> Result<()> {
    store.delete(WATCH_ITEMS, id).await.context("deleting watch")
}

/// Pause or resume a watch. Returns `false` when no watch has that id.
pub async fn set_active(store: &dyn ModuleStore, id: &str, active: bool) -> Result<bool> {
    let Some(mut w) = load_watches(store).await.into_iter().find(|w| w.id == id) else {
        return Ok(false);
    };
    w.active = active;
    store
        .save(WATCH_ITEMS, serde_json::to_value(&w)?)
        .await
        .context("updating watch")?;
    Ok(true)
}
