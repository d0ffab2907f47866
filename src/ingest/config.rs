// src/ingest/config.rs
//! Which adapters run in which mode.
//!
//! Background watches default to PubMed + arXiv; interactive search adds
//! CrossRef. Both lists are plain configuration.

use serde::{Deserialize, Serialize};

use crate::ingest::providers::{arxiv, crossref, pubmed};

pub const KNOWN_SOURCES: [&str; 3] = [pubmed::NAME, arxiv::NAME, crossref::NAME];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSelection {
    #[serde(default = "default_watch_sources")]
    pub watch: Vec<String>,
    #[serde(default = "default_search_sources")]
    pub search: Vec<String>,
}

impl Default for SourceSelection {
    fn default() -> Self {
        Self {
            watch: default_watch_sources(),
            search: default_search_sources(),
        }
    }
}

fn default_watch_sources() -> Vec<String> {
    vec![pubmed::NAME.to_string(), arxiv::NAME.to_string()]
}

fn default_search_sources() -> Vec<String> {
    KNOWN_SOURCES.iter().map(|s| s.to_string()).collect()
}

impl SourceSelection {
    /// Canonicalize both lists in place.
    pub fn cleaned(self) -> Self {
        Self {
            watch: clean_list(self.watch),
            search: clean_list(self.search),
        }
    }
}

/// Map a user-supplied name onto a known adapter name (case-insensitive).
pub fn canonical_source(name: &str) -> Option<&'static str> {
    let n = name.trim();
    KNOWN_SOURCES
        .iter()
        .copied()
        .find(|k| k.eq_ignore_ascii_case(n))
}

/// Canonicalize, drop unknown names, dedupe; keeps first-seen order.
pub fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        match canonical_source(&it) {
            Some(c) => {
                if !out.iter().any(|o| o == c) {
                    out.push(c.to_string());
                }
            }
            None => {
                if !it.trim().is_empty() {
                    tracing::warn!(source = %it.trim(), "unknown source name ignored");
                }
            }
        }
    }
    out
}
