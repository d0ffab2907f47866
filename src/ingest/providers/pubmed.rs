//! PubMed E-utilities adapter.
//!
//! Two calls per query:
//!   esearch: https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi (JSON id list)
//!   efetch:  https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi (XML records)

use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{path_contains, path_ends_with, ElementPath};
use crate::ingest::types::{Article, LiteratureSource};
use crate::ingest::{extract_year, format_authors, normalize_text, truncate_abstract};
use crate::watchlist::{WatchItem, WatchType};

pub const NAME: &str = "PubMed";

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

pub struct PubMedSource {
    client: reqwest::Client,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

impl PubMedSource {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_key)
    }

    pub fn with_client(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    fn key_param(&self, params: &mut Vec<(&'static str, String)>) {
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
    }

    #[instrument(skip(self))]
    async fn esearch(&self, query: &str, max: usize) -> Result<Vec<String>> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("term", query.to_string()),
            ("retmax", max.to_string()),
            ("retmode", "json".to_string()),
            ("sort", "pub_date".to_string()),
        ];
        self.key_param(&mut params);

        let body = self
            .client
            .get(ESEARCH_URL)
            .query(&params)
            .send()
            .await
            .context("pubmed esearch get()")?
            .error_for_status()
            .context("pubmed esearch non-2xx")?
            .text()
            .await
            .context("pubmed esearch .text()")?;

        let ids = parse_esearch_json(&body)?;
        debug!(n = ids.len(), "PubMed esearch returned PMIDs");
        Ok(ids)
    }

    #[instrument(skip(self, pmids), fields(n = pmids.len()))]
    async fn efetch(&self, pmids: &[String]) -> Result<String> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("id", pmids.join(",")),
            ("rettype", "abstract".to_string()),
            ("retmode", "xml".to_string()),
        ];
        self.key_param(&mut params);

        self.client
            .get(EFETCH_URL)
            .query(&params)
            .send()
            .await
            .context("pubmed efetch get()")?
            .error_for_status()
            .context("pubmed efetch non-2xx")?
            .text()
            .await
            .context("pubmed efetch .text()")
    }
}

#[async_trait]
impl LiteratureSource for PubMedSource {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<Article>> {
        let pmids = self.esearch(query, limit).await?;
        if pmids.is_empty() {
            return Ok(Vec::new());
        }
        let xml = self.efetch(&pmids).await?;
        parse_efetch_xml(&xml)
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn query_for(&self, watch: &WatchItem) -> String {
        let v = watch.value.trim();
        match watch.kind {
            WatchType::Author => format!("{v}[Author]"),
            WatchType::Orcid => format!("{v}[auid]"),
            WatchType::Keyword => v.to_string(),
        }
    }
}

/// Extract the PMID list from an esearch JSON body.
pub fn parse_esearch_json(body: &str) -> Result<Vec<String>> {
    let resp: ESearchResponse = serde_json::from_str(body).context("parsing esearch json")?;
    Ok(resp
        .esearchresult
        .idlist
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

#[derive(Default)]
struct Draft {
    pmid: String,
    title: String,
    abstract_text: String,
    abstract_done: bool,
    year: String,
    medline_date: String,
    doi: String,
    eloc_doi: String,
    authors: Vec<String>,
    last: String,
    fore: String,
    collective: String,
}

impl Draft {
    fn finish_author(&mut self) {
        let name = if !self.collective.trim().is_empty() {
            normalize_text(&self.collective)
        } else if self.fore.trim().is_empty() {
            normalize_text(&self.last)
        } else {
            normalize_text(&format!("{} {}", self.fore, self.last))
        };
        if !name.is_empty() {
            self.authors.push(name);
        }
        self.last.clear();
        self.fore.clear();
        self.collective.clear();
    }

    fn into_article(self) -> Option<Article> {
        let pmid = self.pmid.trim().to_string();
        let title = normalize_text(&self.title);
        if pmid.is_empty() && title.is_empty() {
            return None;
        }

        let doi = if !self.doi.trim().is_empty() {
            self.doi.trim().to_string()
        } else if !self.eloc_doi.trim().is_empty() {
            self.eloc_doi.trim().to_string()
        } else if !pmid.is_empty() {
            format!("PMID:{pmid}")
        } else {
            String::new()
        };
        let year = if self.year.trim().is_empty() {
            extract_year(&self.medline_date)
        } else {
            self.year.trim().to_string()
        };
        let url = if pmid.is_empty() {
            String::new()
        } else {
            format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/")
        };

        Some(Article {
            title,
            abstract_text: truncate_abstract(&self.abstract_text),
            year,
            authors: format_authors(&self.authors),
            doi,
            source: NAME.to_string(),
            source_url: url.clone(),
            url,
            pdf_url: None,
            sources: None,
            source_urls: None,
        })
    }
}

fn attr_is(e: &BytesStart<'_>, key: &[u8], value: &str) -> bool {
    e.attributes().flatten().any(|a| {
        a.key.as_ref() == key
            && a.unescape_value()
                .map(|v| v.eq_ignore_ascii_case(value))
                .unwrap_or(false)
    })
}

/// Parse an efetch (`rettype=abstract`, `retmode=xml`) document.
pub fn parse_efetch_xml(xml: &str) -> Result<Vec<Article>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut path: ElementPath = Vec::new();
    let mut out = Vec::new();

    let mut current: Option<Draft> = None;
    let mut id_is_doi = false;
    let mut eloc_is_doi = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.local_name().as_ref().to_vec();
                match name.as_slice() {
                    b"PubmedArticle" => current = Some(Draft::default()),
                    b"ArticleId" => id_is_doi = attr_is(e, b"IdType", "doi"),
                    b"ELocationID" => eloc_is_doi = attr_is(e, b"EIdType", "doi"),
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let Some(d) = current.as_mut() else {
                    buf.clear();
                    continue;
                };
                let text = e.unescape().context("pubmed xml text")?;
                absorb_text(d, &path, &text, id_is_doi, eloc_is_doi);
            }
            Ok(Event::CData(ref e)) => {
                if let Some(d) = current.as_mut() {
                    let text = String::from_utf8_lossy(e.as_ref()).to_string();
                    absorb_text(d, &path, &text, id_is_doi, eloc_is_doi);
                }
            }
            Ok(Event::End(_)) => {
                let name = path.pop().unwrap_or_default();
                match name.as_slice() {
                    b"Author" => {
                        if let Some(d) = current.as_mut() {
                            d.finish_author();
                        }
                    }
                    b"AbstractText" => {
                        if let Some(d) = current.as_mut() {
                            if !d.abstract_text.trim().is_empty() {
                                d.abstract_done = true;
                            }
                        }
                    }
                    b"ArticleId" => id_is_doi = false,
                    b"ELocationID" => eloc_is_doi = false,
                    b"PubmedArticle" => {
                        if let Some(a) = current.take().and_then(Draft::into_article) {
                            out.push(a);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "pubmed xml error at {}: {e}",
                    reader.buffer_position()
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

fn absorb_text(d: &mut Draft, path: &ElementPath, text: &str, id_is_doi: bool, eloc_is_doi: bool) {
    if path_ends_with(path, &[b"MedlineCitation", b"PMID"]) && d.pmid.is_empty() {
        d.pmid = text.trim().to_string();
    } else if path_contains(path, b"ArticleTitle") {
        d.title.push_str(text);
    } else if path_contains(path, b"AbstractText") {
        if !d.abstract_done {
            d.abstract_text.push_str(text);
        }
    } else if path_ends_with(path, &[b"PubDate", b"Year"]) && d.year.is_empty() {
        d.year = text.trim().to_string();
    } else if path_ends_with(path, &[b"PubDate", b"MedlineDate"]) {
        d.medline_date.push_str(text);
    } else if path_ends_with(path, &[b"PubmedData", b"ArticleIdList", b"ArticleId"]) && id_is_doi {
        d.doi.push_str(text);
    } else if path_ends_with(path, &[b"Article", b"ELocationID"]) && eloc_is_doi {
        d.eloc_doi.push_str(text);
    } else if path_ends_with(path, &[b"Author", b"LastName"]) {
        d.last.push_str(text);
    } else if path_ends_with(path, &[b"Author", b"ForeName"]) {
        d.fore.push_str(text);
    } else if path_ends_with(path, &[b"Author", b"CollectiveName"]) {
        d.collective.push_str(text);
    }
}
