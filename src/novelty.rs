//! # Novelty tracking
//! Per watch, the identity keys seen on that watch's most recent run.
//!
//! A snapshot is replaced wholesale on every run; it is "what the last run
//! saw", not a cumulative history. Keys come from
//! [`crate::ingest::merge::identity_key`], so casing or punctuation changes in
//! a title never make an article look new.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ingest::merge::identity_key;
use crate::ingest::types::Article;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoveltyTracker {
    snapshots: HashMap<String, HashSet<String>>,
}

impl NoveltyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// New when the watch has no snapshot yet, or the article's key is not
    /// in it. Articles without any identity cannot be recognized and count
    /// as new.
    pub fn is_new(&self, article: &Article, watch_key: &str) -> bool {
        let Some(seen) = self.snapshots.get(watch_key) else {
            return true;
        };
        match identity_key(article) {
            Some(k) => !seen.contains(&k),
            None => true,
        }
    }

    /// Replace the snapshot for `watch_key` with this run's articles.
    pub fn record_snapshot(&mut self, articles: &[Article], watch_key: &str) {
        let keys = articles.iter().filter_map(identity_key).collect();
        self.snapshots.insert(watch_key.to_string(), keys);
    }

    /// Classify against the previous snapshot, then overwrite it.
    pub fn classify_and_record(&mut self, articles: &[Article], watch_key: &str) -> Vec<Article> {
        let fresh = articles
            .iter()
            .filter(|a| self.is_new(a, watch_key))
            .cloned()
            .collect();
        self.record_snapshot(articles, watch_key);
        fresh
    }

    pub fn has_snapshot(&self, watch_key: &str) -> bool {
        self.snapshots.contains_key(watch_key)
    }

    pub fn snapshot_len(&self, watch_key: &str) -> usize {
        self.snapshots.get(watch_key).map_or(0, HashSet::len)
    }
}
