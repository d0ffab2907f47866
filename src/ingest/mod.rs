// src/ingest/mod.rs
pub mod config;
pub mod merge;
pub mod providers;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;

use crate::ingest::providers::{arxiv::ArxivSource, crossref::CrossRefSource, pubmed::PubMedSource};
use crate::ingest::types::{Article, LiteratureSource};
use crate::watchlist::WatchItem;

/// Maximum abstract length kept on an `Article` (characters, no ellipsis).
pub const ABSTRACT_MAX_CHARS: usize = 300;

/// Number of authors listed before the "et al." marker.
pub const AUTHORS_LISTED: usize = 3;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "autowatch_source_errors_total",
            "Adapter fetch/parse errors and timeouts."
        );
        describe_counter!(
            "autowatch_source_articles_total",
            "Articles returned by adapters before merge."
        );
        describe_histogram!(
            "autowatch_source_fetch_ms",
            "Adapter round-trip time in milliseconds."
        );
    });
}

/// Normalize text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize and cap an abstract at [`ABSTRACT_MAX_CHARS`].
pub fn truncate_abstract(s: &str) -> String {
    let clean = normalize_text(s);
    if clean.chars().count() > ABSTRACT_MAX_CHARS {
        clean.chars().take(ABSTRACT_MAX_CHARS).collect()
    } else {
        clean
    }
}

/// "A, B, C et al.": first three names, marker only when more exist.
pub fn format_authors<S: AsRef<str>>(names: &[S]) -> String {
    let names: Vec<&str> = names
        .iter()
        .map(|n| n.as_ref().trim())
        .filter(|n| !n.is_empty())
        .collect();
    let mut out = names
        .iter()
        .take(AUTHORS_LISTED)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");
    if names.len() > AUTHORS_LISTED {
        out.push_str(" et al.");
    }
    out
}

/// First four-digit run in `s`, or empty.
pub fn extract_year(s: &str) -> String {
    static RE_YEAR: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE_YEAR.get_or_init(|| regex::Regex::new(r"\b(\d{4})\b").unwrap());
    re.captures(s)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Run one adapter, bounded by `timeout`. Never fails: errors and timeouts
/// are logged and yield an empty list.
pub async fn search_source(
    source: &dyn LiteratureSource,
    query: &str,
    limit: usize,
    timeout: Duration,
) -> Vec<Article> {
    ensure_metrics_described();
    let t0 = std::time::Instant::now();
    let res = tokio::time::timeout(timeout, source.fetch(query, limit)).await;
    histogram!("autowatch_source_fetch_ms", "source" => source.name())
        .record(t0.elapsed().as_secs_f64() * 1_000.0);

    match res {
        Ok(Ok(mut v)) => {
            v.truncate(limit);
            counter!("autowatch_source_articles_total", "source" => source.name())
                .increment(v.len() as u64);
            v
        }
        Ok(Err(e)) => {
            tracing::warn!(error = ?e, source = source.name(), "source error");
            counter!("autowatch_source_errors_total", "source" => source.name()).increment(1);
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(
                source = source.name(),
                timeout_ms = timeout.as_millis() as u64,
                "source timed out"
            );
            counter!("autowatch_source_errors_total", "source" => source.name()).increment(1);
            Vec::new()
        }
    }
}

/// Query every source concurrently, wait for all of them, then merge.
pub async fn search_all(
    sources: &[Arc<dyn LiteratureSource>],
    query: &str,
    limit: usize,
    timeout: Duration,
) -> Vec<Article> {
    let calls = sources
        .iter()
        .map(|s| search_source(s.as_ref(), query, limit, timeout));
    let results = futures::future::join_all(calls).await;
    merge::merge_articles(results.into_iter().flatten().collect())
}

/// Like [`search_all`], but each source shapes its own query from the watch.
pub async fn search_watch(
    sources: &[Arc<dyn LiteratureSource>],
    watch: &WatchItem,
    limit: usize,
    timeout: Duration,
) -> Vec<Article> {
    let queries: Vec<String> = sources.iter().map(|s| s.query_for(watch)).collect();
    let calls = sources
        .iter()
        .zip(queries.iter())
        .map(|(s, q)| search_source(s.as_ref(), q, limit, timeout));
    let results = futures::future::join_all(calls).await;
    merge::merge_articles(results.into_iter().flatten().collect())
}

/// Instantiate HTTP adapters for the given (already validated) source names.
pub fn build_sources(
    names: &[String],
    cfg: &crate::config::SourcesCfg,
) -> Vec<Arc<dyn LiteratureSource>> {
    let client = reqwest::Client::builder()
        .user_agent(cfg.user_agent())
        .build()
        .unwrap_or_default();

    names
        .iter()
        .filter_map(|n| -> Option<Arc<dyn LiteratureSource>> {
            match n.as_str() {
                providers::pubmed::NAME => Some(Arc::new(PubMedSource::with_client(
                    client.clone(),
                    cfg.pubmed_api_key.clone(),
                ))),
                providers::arxiv::NAME => Some(Arc::new(ArxivSource::with_client(client.clone()))),
                providers::crossref::NAME => Some(Arc::new(CrossRefSource::with_client(
                    client.clone(),
                    cfg.contact_email.clone(),
                ))),
                other => {
                    tracing::warn!(source = other, "unknown source skipped");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_strips_tags_and_entities() {
        let s = "  <i>KRAS</i>&nbsp;&amp;\n  EGFR ";
        assert_eq!(normalize_text(s), "KRAS & EGFR");
    }

    #[test]
    fn abstract_is_capped_without_ellipsis() {
        let long = "x".repeat(400);
        let out = truncate_abstract(&long);
        assert_eq!(out.chars().count(), ABSTRACT_MAX_CHARS);
        assert!(!out.ends_with("..."));
        assert_eq!(truncate_abstract("short one"), "short one");
    }

    #[test]
    fn authors_listed_up_to_three() {
        assert_eq!(format_authors(&["A", "B"]), "A, B");
        assert_eq!(format_authors(&["A", "B", "C"]), "A, B, C");
        assert_eq!(format_authors(&["A", "B", "C", "D"]), "A, B, C et al.");
        assert_eq!(format_authors::<&str>(&[]), "");
    }

    #[test]
    fn year_from_dates() {
        assert_eq!(extract_year("2023 Mar-Apr"), "2023");
        assert_eq!(extract_year("2024-09-08T00:00:00Z"), "2024");
        assert_eq!(extract_year("Spring"), "");
    }

    struct Failing;

    #[async_trait::async_trait]
    impl LiteratureSource for Failing {
        async fn fetch(&self, _q: &str, _l: usize) -> anyhow::Result<Vec<Article>> {
            anyhow::bail!("boom")
        }
        fn name(&self) -> &'static str {
            "Failing"
        }
    }

    struct Slow;

    #[async_trait::async_trait]
    impl LiteratureSource for Slow {
        async fn fetch(&self, _q: &str, _l: usize) -> anyhow::Result<Vec<Article>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![])
        }
        fn name(&self) -> &'static str {
            "Slow"
        }
    }

    #[tokio::test]
    async fn failing_source_yields_empty() {
        let out = search_source(&Failing, "q", 5, Duration::from_secs(1)).await;
        assert!(out.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_times_out_empty() {
        let out = search_source(&Slow, "q", 5, Duration::from_millis(50)).await;
        assert!(out.is_empty());
    }
}
