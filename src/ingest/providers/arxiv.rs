//! arXiv adapter (Atom feed from `export.arxiv.org/api/query`).
//!
//! Every arXiv record has a PDF, derived from its identifier.

use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::debug;

use super::{path_ends_with, ElementPath};
use crate::ingest::types::{Article, LiteratureSource};
use crate::ingest::{extract_year, format_authors, normalize_text, truncate_abstract};
use crate::watchlist::{WatchItem, WatchType};

pub const NAME: &str = "arXiv";

const API_URL: &str = "https://export.arxiv.org/api/query";

const FIELD_PREFIXES: [&str; 9] = [
    "all:", "ti:", "au:", "abs:", "co:", "jr:", "cat:", "rn:", "id:",
];

pub struct ArxivSource {
    client: reqwest::Client,
}

impl ArxivSource {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ArxivSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LiteratureSource for ArxivSource {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<Article>> {
        let search_query = build_search_query(query);
        let body = self
            .client
            .get(API_URL)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", &limit.to_string()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .context("arxiv get()")?
            .error_for_status()
            .context("arxiv non-2xx")?
            .text()
            .await
            .context("arxiv .text()")?;

        let out = parse_atom_feed(&body)?;
        debug!(n = out.len(), "arXiv feed entries");
        Ok(out)
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn query_for(&self, watch: &WatchItem) -> String {
        let v = watch.value.trim().replace('"', "");
        match watch.kind {
            WatchType::Author => format!("au:\"{v}\""),
            WatchType::Keyword | WatchType::Orcid => quoted_all(&v),
        }
    }
}

fn quoted_all(q: &str) -> String {
    if q.contains(char::is_whitespace) {
        format!("all:\"{q}\"")
    } else {
        format!("all:{q}")
    }
}

/// Free text becomes an `all:` query; queries already using arXiv field
/// prefixes pass through.
pub fn build_search_query(query: &str) -> String {
    let q = query.trim();
    let lower = q.to_ascii_lowercase();
    if FIELD_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        q.to_string()
    } else {
        quoted_all(&q.replace('"', ""))
    }
}

/// `https://arxiv.org/abs/2401.01234v2` -> `2401.01234v2`
pub fn arxiv_id_from_url(url: &str) -> Option<String> {
    let u = url.trim();
    let i = u.rfind("/abs/")?;
    let id = u[i + "/abs/".len()..].trim_matches('/').trim();
    (!id.is_empty()).then(|| id.to_string())
}

pub fn abs_url(id: &str) -> String {
    format!("https://arxiv.org/abs/{id}")
}

pub fn pdf_url(id: &str) -> String {
    format!("https://arxiv.org/pdf/{id}")
}

fn year_from_timestamp(ts: &str) -> String {
    OffsetDateTime::parse(ts.trim(), &Rfc3339)
        .map(|dt| dt.year().to_string())
        .unwrap_or_else(|_| extract_year(ts))
}

#[derive(Default)]
struct Entry {
    id: String,
    title: String,
    summary: String,
    published: String,
    doi: String,
    authors: Vec<String>,
    author_name: String,
}

impl Entry {
    fn into_article(self) -> Option<Article> {
        let arxiv_id = arxiv_id_from_url(&self.id)?;
        let title = normalize_text(&self.title);
        // arXiv reports query errors as a feed entry titled "Error".
        if title.is_empty() || title.eq_ignore_ascii_case("error") {
            return None;
        }
        let page = abs_url(&arxiv_id);
        Some(Article {
            title,
            abstract_text: truncate_abstract(&self.summary),
            year: year_from_timestamp(&self.published),
            authors: format_authors(&self.authors),
            doi: self.doi.trim().to_string(),
            source: NAME.to_string(),
            source_url: page.clone(),
            url: page,
            pdf_url: Some(pdf_url(&arxiv_id)),
            sources: None,
            source_urls: None,
        })
    }
}

/// Parse an arXiv Atom response. Namespaced children (`arxiv:doi`) are
/// matched by local name.
pub fn parse_atom_feed(xml: &str) -> Result<Vec<Article>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut path: ElementPath = Vec::new();
    let mut out = Vec::new();
    let mut current: Option<Entry> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.local_name().as_ref().to_vec();
                if name.as_slice() == b"entry" {
                    current = Some(Entry::default());
                }
                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                if let Some(entry) = current.as_mut() {
                    let text = e.unescape().context("arxiv xml text")?;
                    if path_ends_with(&path, &[b"entry", b"id"]) {
                        entry.id.push_str(&text);
                    } else if path_ends_with(&path, &[b"entry", b"title"]) {
                        entry.title.push_str(&text);
                    } else if path_ends_with(&path, &[b"entry", b"summary"]) {
                        entry.summary.push_str(&text);
                    } else if path_ends_with(&path, &[b"entry", b"published"]) {
                        entry.published.push_str(&text);
                    } else if path_ends_with(&path, &[b"entry", b"doi"]) {
                        entry.doi.push_str(&text);
                    } else if path_ends_with(&path, &[b"author", b"name"]) {
                        entry.author_name.push_str(&text);
                    }
                }
            }
            Ok(Event::End(_)) => {
                let name = path.pop().unwrap_or_default();
                match name.as_slice() {
                    b"author" => {
                        if let Some(entry) = current.as_mut() {
                            let n = normalize_text(&entry.author_name);
                            if !n.is_empty() {
                                entry.authors.push(n);
                            }
                            entry.author_name.clear();
                        }
                    }
                    b"entry" => {
                        if let Some(a) = current.take().and_then(Entry::into_article) {
                            out.push(a);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "arxiv xml error at {}: {e}",
                    reader.buffer_position()
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_and_urls() {
        assert_eq!(
            arxiv_id_from_url("http://arxiv.org/abs/2401.01234v2").as_deref(),
            Some("2401.01234v2")
        );
        assert_eq!(
            arxiv_id_from_url("http://arxiv.org/abs/cond-mat/0102536v1").as_deref(),
            Some("cond-mat/0102536v1")
        );
        assert!(arxiv_id_from_url("http://arxiv.org/api/errors#x").is_none());
        assert_eq!(pdf_url("2401.01234v2"), "https://arxiv.org/pdf/2401.01234v2");
    }

    #[test]
    fn query_building() {
        assert_eq!(build_search_query("radium"), "all:radium");
        assert_eq!(build_search_query("radium decay"), "all:\"radium decay\"");
        assert_eq!(build_search_query("au:Curie"), "au:Curie");

        let src = ArxivSource::new();
        let w = WatchItem::new(WatchType::Author, "M. Curie");
        assert_eq!(src.query_for(&w), "au:\"M. Curie\"");
    }

    #[test]
    fn error_entry_is_skipped() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry><id>http://arxiv.org/api/errors#incorrect_id_format</id><title>Error</title>
          <summary>incorrect id format</summary></entry></feed>"#;
        assert!(parse_atom_feed(xml).unwrap().is_empty());
    }

    #[test]
    fn year_prefers_rfc3339() {
        assert_eq!(year_from_timestamp("2024-09-08T00:00:00Z"), "2024");
        assert_eq!(year_from_timestamp("garbage 1999"), "1999");
    }
}
