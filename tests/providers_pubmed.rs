// tests/providers_pubmed.rs
//
// PubMed efetch parsing against a captured-style fixture.

use lab_autowatch::ingest::providers::pubmed::{parse_efetch_xml, parse_esearch_json, NAME};

const EFETCH: &str = include_str!("fixtures/pubmed_efetch.xml");

#[test]
fn efetch_fixture_yields_three_articles_in_order() {
    let out = parse_efetch_xml(EFETCH).expect("parse efetch");
    assert_eq!(out.len(), 3);
    assert!(out.iter().all(|a| a.source == NAME));
    assert_eq!(out[0].title, "Radium isotopes in groundwater & soil.");
    assert_eq!(out[1].title, "Polonium chemistry revisited.");
}

#[test]
fn first_record_fields() {
    let a = &parse_efetch_xml(EFETCH).unwrap()[0];
    // cited PMIDs in CommentsCorrections must not replace the article's own
    assert_eq!(a.url, "https://pubmed.ncbi.nlm.nih.gov/38012345/");
    assert_eq!(a.source_url, a.url);
    assert_eq!(a.doi, "10.1000/radium.2023.1");
    assert_eq!(a.year, "2023");
    assert_eq!(a.authors, "Marie Curie, Pierre Curie, Henri Becquerel et al.");
    assert_eq!(a.abstract_text, "Radium is a naturally occurring radioactive element.");
    assert!(a.pdf_url.is_none());
}

#[test]
fn elocation_doi_and_medline_date_fallbacks() {
    let a = &parse_efetch_xml(EFETCH).unwrap()[1];
    assert_eq!(a.doi, "10.1000/polonium.7");
    assert_eq!(a.year, "2022");
    assert_eq!(a.authors, "Radiochemistry Consortium");
    assert_eq!(a.abstract_text, "");
}

#[test]
fn record_without_doi_gets_pmid_placeholder() {
    let a = &parse_efetch_xml(EFETCH).unwrap()[2];
    assert_eq!(a.doi, "PMID:38100000");
    assert_eq!(a.year, "2024");
    assert_eq!(a.authors, "");
}

#[test]
fn malformed_xml_is_an_error() {
    assert!(parse_efetch_xml("<PubmedArticleSet><PubmedArticle></Oops>").is_err());
}

#[test]
fn esearch_body_without_idlist_is_empty() {
    let ids = parse_esearch_json(r#"{"esearchresult":{"count":"0","retmax":"0"}}"#).unwrap();
    assert!(ids.is_empty());
    assert!(parse_esearch_json("not json").is_err());
}
