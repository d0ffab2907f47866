// src/ingest/merge.rs
//! Cross-source merge/dedupe.
//!
//! Identity is the trimmed, lowercased DOI when present, otherwise the
//! normalized title (lowercase, punctuation stripped, whitespace collapsed).
//! Titles are only ever compared for exact equality after normalization.

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::ingest::types::Article;

/// Lowercase, drop punctuation, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    static RE_PUNCT: OnceCell<Regex> = OnceCell::new();
    let re = RE_PUNCT.get_or_init(|| Regex::new(r"[^\p{L}\p{N}\s]").unwrap());
    let lower = title.to_lowercase();
    let stripped = re.replace_all(&lower, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Identity key used for merging and for novelty tracking. `None` when the
/// record has neither a DOI nor a usable title.
pub fn identity_key(article: &Article) -> Option<String> {
    let doi = article.doi.trim();
    if !doi.is_empty() {
        return Some(format!("doi:{}", doi.to_lowercase()));
    }
    let title = normalize_title(&article.title);
    if title.is_empty() {
        None
    } else {
        Some(format!("title:{title}"))
    }
}

/// Merge concatenated adapter output into one list, first-seen order.
pub fn merge_articles(articles: Vec<Article>) -> Vec<Article> {
    let mut order: Vec<String> = Vec::with_capacity(articles.len());
    let mut by_key: HashMap<String, Article> = HashMap::with_capacity(articles.len());

    for art in articles {
        let Some(key) = identity_key(&art) else {
            continue;
        };
        match by_key.get_mut(&key) {
            None => {
                order.push(key.clone());
                by_key.insert(key, art);
            }
            Some(existing) => absorb(existing, art),
        }
    }

    order
        .into_iter()
        .filter_map(|k| by_key.remove(&k))
        .collect()
}

/// Fold a later duplicate into the first-seen record. Identity fields of the
/// existing record are never overwritten.
fn absorb(existing: &mut Article, incoming: Article) {
    let already_listed = existing
        .source_names()
        .iter()
        .any(|s| *s == incoming.source);
    if already_listed {
        return;
    }

    if existing.sources.is_none() {
        existing.sources = Some(vec![existing.source.clone()]);
        existing.source_urls = Some(vec![existing.source_url.clone()]);
    }
    if let (Some(names), Some(urls)) = (existing.sources.as_mut(), existing.source_urls.as_mut()) {
        names.push(incoming.source.clone());
        urls.push(incoming.source_url.clone());
    }

    if !existing.has_pdf() && incoming.has_pdf() {
        existing.pdf_url = incoming.pdf_url;
    }
    if incoming.abstract_text.chars().count() > existing.abstract_text.chars().count() {
        existing.abstract_text = incoming.abstract_text;
    }
}
