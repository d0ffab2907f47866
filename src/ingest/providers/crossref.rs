//! CrossRef works search adapter.
//!
//! API: https://api.crossref.org/works?query=...
//! Polite pool: pass a contact address via `mailto`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::ingest::types::{Article, LiteratureSource};
use crate::ingest::{format_authors, normalize_text, truncate_abstract};

pub const NAME: &str = "CrossRef";

const WORKS_URL: &str = "https://api.crossref.org/works";

pub struct CrossRefSource {
    client: reqwest::Client,
    mailto: Option<String>,
}

impl CrossRefSource {
    pub fn new(mailto: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), mailto)
    }

    pub fn with_client(client: reqwest::Client, mailto: Option<String>) -> Self {
        Self { client, mailto }
    }
}

#[derive(Debug, Deserialize)]
struct WorksResponse {
    message: WorksMessage,
}

#[derive(Debug, Default, Deserialize)]
struct WorksMessage {
    #[serde(default)]
    items: Vec<Work>,
}

#[derive(Debug, Default, Deserialize)]
struct Work {
    #[serde(rename = "DOI", default)]
    doi: Option<String>,
    #[serde(default)]
    title: Vec<String>,
    #[serde(rename = "abstract", default)]
    abstract_text: Option<String>,
    #[serde(default)]
    author: Vec<WorkAuthor>,
    #[serde(default)]
    published: Option<DateParts>,
    #[serde(default)]
    issued: Option<DateParts>,
    #[serde(rename = "URL", default)]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkAuthor {
    #[serde(default)]
    given: Option<String>,
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DateParts {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i64>>>,
}

impl DateParts {
    fn year(&self) -> Option<i64> {
        self.date_parts.first()?.first().copied().flatten()
    }
}

impl WorkAuthor {
    fn display(&self) -> String {
        let given = self.given.as_deref().unwrap_or("").trim();
        let family = self.family.as_deref().unwrap_or("").trim();
        match (given.is_empty(), family.is_empty()) {
            (false, false) => format!("{given} {family}"),
            (true, false) => family.to_string(),
            (false, true) => given.to_string(),
            (true, true) => self.name.as_deref().unwrap_or("").trim().to_string(),
        }
    }
}

fn work_to_article(work: Work) -> Article {
    let doi = work.doi.as_deref().unwrap_or("").trim().to_string();
    let title = work
        .title
        .first()
        .map(|t| normalize_text(t))
        .unwrap_or_default();
    let names: Vec<String> = work.author.iter().map(WorkAuthor::display).collect();
    let year = work
        .published
        .as_ref()
        .and_then(DateParts::year)
        .or_else(|| work.issued.as_ref().and_then(DateParts::year))
        .filter(|y| (1000..=9999).contains(y))
        .map(|y| y.to_string())
        .unwrap_or_default();

    let resolver = (!doi.is_empty()).then(|| format!("https://doi.org/{doi}"));
    let url = resolver
        .clone()
        .or_else(|| work.url.clone())
        .unwrap_or_default();

    Article {
        title,
        abstract_text: work
            .abstract_text
            .as_deref()
            .map(truncate_abstract)
            .unwrap_or_default(),
        year,
        authors: format_authors(&names),
        doi,
        source: NAME.to_string(),
        source_url: url.clone(),
        url,
        pdf_url: resolver,
        sources: None,
        source_urls: None,
    }
}

/// Parse a `/works` search response.
pub fn parse_works_json(body: &str) -> Result<Vec<Article>> {
    let resp: WorksResponse = serde_json::from_str(body).context("parsing crossref json")?;
    Ok(resp.message.items.into_iter().map(work_to_article).collect())
}

#[async_trait]
impl LiteratureSource for CrossRefSource {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<Article>> {
        let mut params = vec![
            ("query", query.trim().to_string()),
            ("rows", limit.to_string()),
            (
                "select",
                "DOI,title,abstract,author,published,issued,URL".to_string(),
            ),
        ];
        if let Some(m) = &self.mailto {
            params.push(("mailto", m.clone()));
        }

        let body = self
            .client
            .get(WORKS_URL)
            .query(&params)
            .send()
            .await
            .context("crossref get()")?
            .error_for_status()
            .context("crossref non-2xx")?
            .text()
            .await
            .context("crossref .text()")?;

        let out = parse_works_json(&body)?;
        debug!(n = out.len(), "CrossRef works");
        Ok(out)
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
