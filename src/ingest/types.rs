// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::watchlist::WatchItem;

/// Normalized bibliographic record produced by every source adapter.
///
/// `sources` / `source_urls` are only present on records that were merged
/// from more than one adapter; they are index-aligned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub authors: String,
    #[serde(default)]
    pub doi: String,
    pub source: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_urls: Option<Vec<String>>,
}

impl Article {
    /// Contributing source names, first-seen order. Unmerged records report
    /// their single origin.
    pub fn source_names(&self) -> Vec<&str> {
        match &self.sources {
            Some(v) => v.iter().map(String::as_str).collect(),
            None => vec![self.source.as_str()],
        }
    }

    pub fn has_pdf(&self) -> bool {
        self.pdf_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

/// Adapter seam for one bibliographic source.
///
/// `fetch` may fail; callers go through [`crate::ingest::search_source`], which
/// turns failures and timeouts into an empty list.
#[async_trait::async_trait]
pub trait LiteratureSource: Send + Sync {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<Article>>;

    fn name(&self) -> &'static str;

    /// Translate a watch into this source's query syntax.
    fn query_for(&self, watch: &WatchItem) -> String {
        watch.value.trim().to_string()
    }
}
